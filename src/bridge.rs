//! Bridging a container to a foreign (non-native) backing implementation.
//!
//! The original dispatches every container operation through a selector that
//! may land on either the built-in hash-table implementation or a
//! "bridged"/"toll-free-bridged" foreign class supplying its own method
//! table. Rust has no runtime method dispatch to hijack, so the same idea is
//! expressed as a two-variant enum: native operations call straight into
//! [`crate::engine::HashEngine`], foreign ones go through a boxed trait
//! object. Callers of [`crate::dictionary::Dictionary`] and friends never see
//! the distinction.

use crate::callbacks::ElementOps;
use crate::engine::{FindResult, HashEngine, Shape};
use crate::options::EngineOptions;

/// The operations a foreign backing store must provide to stand in for the
/// native engine. Mirrors the subset of `HashEngine` methods the façades
/// actually call.
pub trait ForeignContainer<K: ElementOps, V: ElementOps>: Send + Sync {
	fn add(&mut self, key: K, value: Option<V>) -> bool;
	fn set(&mut self, key: K, value: Option<V>);
	fn replace(&mut self, key: K, value: Option<V>) -> bool;
	fn remove(&mut self, key: &K) -> u32;
	fn remove_all(&mut self);
	fn find(&self, key: &K) -> Option<(K, Option<V>, u32)>;
	fn count(&self) -> usize;
	fn make_immutable(&mut self);
	fn is_immutable(&self) -> bool;
	fn apply(&self, f: &mut dyn FnMut(&K, Option<&V>, u32));
}

/// A container's backing store: the fast native engine, or a bridged
/// foreign implementation.
pub enum Container<K: ElementOps, V: ElementOps> {
	Native(HashEngine<K, V>),
	Foreign(Box<dyn ForeignContainer<K, V>>),
}

impl<K: ElementOps, V: ElementOps> Container<K, V> {
	pub fn native(shape: Shape, options: EngineOptions) -> Self {
		Container::Native(HashEngine::new(shape, options))
	}

	pub fn foreign(backing: Box<dyn ForeignContainer<K, V>>) -> Self {
		Container::Foreign(backing)
	}

	pub fn add(&mut self, key: K, value: Option<V>) -> bool {
		match self {
			Container::Native(e) => e.add(key, value),
			Container::Foreign(f) => f.add(key, value),
		}
	}

	pub fn set(&mut self, key: K, value: Option<V>) {
		match self {
			Container::Native(e) => e.set(key, value),
			Container::Foreign(f) => f.set(key, value),
		}
	}

	pub fn replace(&mut self, key: K, value: Option<V>) -> bool {
		match self {
			Container::Native(e) => e.replace(key, value),
			Container::Foreign(f) => f.replace(key, value),
		}
	}

	pub fn remove(&mut self, key: &K) -> u32 {
		match self {
			Container::Native(e) => e.remove(key),
			Container::Foreign(f) => f.remove(key),
		}
	}

	pub fn remove_all(&mut self) {
		match self {
			Container::Native(e) => e.remove_all(),
			Container::Foreign(f) => f.remove_all(),
		}
	}

	pub fn count(&self) -> usize {
		match self {
			Container::Native(e) => e.count(),
			Container::Foreign(f) => f.count(),
		}
	}

	pub fn is_immutable(&self) -> bool {
		match self {
			Container::Native(e) => e.is_immutable(),
			Container::Foreign(f) => f.is_immutable(),
		}
	}

	pub fn make_immutable(&mut self) {
		match self {
			Container::Native(e) => e.make_immutable(),
			Container::Foreign(f) => f.make_immutable(),
		}
	}

	pub fn apply(&self, mut f: impl FnMut(&K, Option<&V>, u32)) {
		match self {
			Container::Native(e) => e.apply(f),
			Container::Foreign(foreign) => foreign.apply(&mut f),
		}
	}

	/// Native-only accessor for operations with no foreign-side analogue
	/// yet (count-of-value, typed `find`, bulk copy). Bridged containers
	/// panic, same as the original treats a selector a foreign class
	/// declined to implement.
	pub fn native_engine(&self) -> &HashEngine<K, V> {
		match self {
			Container::Native(e) => e,
			Container::Foreign(_) => panic!("operation is not supported on a bridged container"),
		}
	}

	pub fn native_engine_mut(&mut self) -> &mut HashEngine<K, V> {
		match self {
			Container::Native(e) => e,
			Container::Foreign(_) => panic!("operation is not supported on a bridged container"),
		}
	}

	pub fn find(&self, key: &K) -> Option<ForeignOrNativeFind<'_, K, V>> {
		match self {
			Container::Native(e) => e.find(key).map(ForeignOrNativeFind::Native),
			Container::Foreign(f) => f.find(key).map(ForeignOrNativeFind::Foreign),
		}
	}
}

/// [`Container::find`]'s result: either a borrowed native hit or an owned
/// foreign one, since a foreign backing store has no internal storage this
/// crate can borrow from.
pub enum ForeignOrNativeFind<'a, K, V> {
	Native(FindResult<'a, K, V>),
	Foreign((K, Option<V>, u32)),
}

impl<'a, K, V> ForeignOrNativeFind<'a, K, V> {
	pub fn count(&self) -> u32 {
		match self {
			ForeignOrNativeFind::Native(r) => r.count,
			ForeignOrNativeFind::Foreign((_, _, c)) => *c,
		}
	}

	pub fn value(&self) -> Option<&V> {
		match self {
			ForeignOrNativeFind::Native(r) => r.value,
			ForeignOrNativeFind::Foreign((_, v, _)) => v.as_ref(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	/// A trivial foreign backing store (a plain `HashMap`) used to exercise
	/// the bridge path in isolation from the native engine.
	struct MapBacked(HashMap<i32, i32>);

	impl ForeignContainer<i32, i32> for MapBacked {
		fn add(&mut self, key: i32, value: Option<i32>) -> bool {
			if self.0.contains_key(&key) {
				false
			} else {
				self.0.insert(key, value.unwrap_or_default());
				true
			}
		}
		fn set(&mut self, key: i32, value: Option<i32>) {
			self.0.insert(key, value.unwrap_or_default());
		}
		fn replace(&mut self, key: i32, value: Option<i32>) -> bool {
			if self.0.contains_key(&key) {
				self.0.insert(key, value.unwrap_or_default());
				true
			} else {
				false
			}
		}
		fn remove(&mut self, key: &i32) -> u32 {
			if self.0.remove(key).is_some() {
				1
			} else {
				0
			}
		}
		fn remove_all(&mut self) {
			self.0.clear();
		}
		fn find(&self, key: &i32) -> Option<(i32, Option<i32>, u32)> {
			self.0.get(key).map(|v| (*key, Some(*v), 1))
		}
		fn count(&self) -> usize {
			self.0.len()
		}
		fn make_immutable(&mut self) {}
		fn is_immutable(&self) -> bool {
			false
		}
		fn apply(&self, f: &mut dyn FnMut(&i32, Option<&i32>, u32)) {
			for (k, v) in self.0.iter() {
				f(k, Some(v), 1);
			}
		}
	}

	#[test]
	fn foreign_backing_store_answers_through_the_same_api() {
		let mut c: Container<i32, i32> = Container::foreign(Box::new(MapBacked(HashMap::new())));
		assert!(c.add(1, Some(10)));
		assert!(!c.add(1, Some(99)));
		assert_eq!(c.count(), 1);
		let found = c.find(&1).unwrap();
		assert_eq!(found.value(), Some(&10));
	}

	#[test]
	fn native_backing_store_works_identically() {
		let mut c: Container<i32, i32> = Container::native(Shape::DICTIONARY, EngineOptions::new());
		assert!(c.add(1, Some(10)));
		assert_eq!(c.count(), 1);
		assert_eq!(c.find(&1).unwrap().value(), Some(&10));
	}
}
