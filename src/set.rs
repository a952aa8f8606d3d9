//! `Set<K>`: the deduplicating shape over the shared hash engine.

use crate::bridge::Container;
use crate::callbacks::{DynCallbacks, ElementOps};
use crate::engine::Shape;
use crate::options::EngineOptions;
use std::sync::Arc;

/// A collection holding at most one instance equal to any given key.
pub struct Set<K: ElementOps> {
	backing: Container<K, ()>,
}

impl<K: ElementOps> Set<K> {
	pub fn new() -> Self {
		Self::with_options(EngineOptions::new())
	}

	pub fn with_options(options: EngineOptions) -> Self {
		Self { backing: Container::native(Shape::SET, options) }
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self::with_options(EngineOptions::new().capacity(capacity))
	}

	pub fn with_callbacks(mut self, callbacks: Arc<DynCallbacks<K>>) -> Self {
		self.backing = match self.backing {
			Container::Native(e) => Container::Native(e.with_key_callbacks(callbacks)),
			other => other,
		};
		self
	}

	/// Create-immutable: builds an already-frozen set straight from an
	/// array of keys, deduplicating exactly as repeated `add` calls would.
	pub fn from_array(keys: Vec<K>) -> Self {
		Self::from_array_with_callbacks(keys, None)
	}

	pub fn from_array_with_callbacks(keys: Vec<K>, callbacks: Option<Arc<DynCallbacks<K>>>) -> Self {
		Self {
			backing: Container::Native(crate::engine::HashEngine::from_arrays(
				Shape::SET,
				keys,
				Vec::new(),
				callbacks,
				None,
			)),
		}
	}

	/// Create-mutable-copy: a fresh, still-mutable set seeded with every
	/// element of `self`, sized for at least `capacity_hint` elements.
	pub fn mutable_copy(&self, capacity_hint: usize) -> Self {
		Self { backing: Container::Native(self.backing.native_engine().mutable_copy(capacity_hint)) }
	}

	pub fn len(&self) -> usize {
		self.backing.count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_immutable(&self) -> bool {
		self.backing.is_immutable()
	}

	/// Absent → insert. Present → no-op.
	pub fn add(&mut self, key: K) -> bool {
		self.backing.add(key, None)
	}

	/// Present → replace the stored instance (matters when equal members
	/// can differ in identity/observable non-equated state).
	pub fn set(&mut self, key: K) {
		self.backing.set(key, None)
	}

	pub fn replace(&mut self, key: K) -> bool {
		self.backing.replace(key, None)
	}

	pub fn remove(&mut self, key: &K) -> bool {
		self.backing.remove(key) > 0
	}

	pub fn remove_all(&mut self) {
		self.backing.remove_all()
	}

	pub fn contains(&self, key: &K) -> bool {
		self.backing.find(key).is_some()
	}

	pub fn for_each(&self, mut f: impl FnMut(&K)) {
		self.backing.apply(|k, _, _| f(k))
	}

	pub fn make_immutable(&mut self) {
		self.backing.make_immutable()
	}

	pub fn copy(&self) -> Self {
		Self { backing: Container::Native(self.backing.native_engine().copy()) }
	}

	pub fn elements(&self) -> Vec<K> {
		let mut keys = Vec::with_capacity(self.len());
		let mut values = Vec::new();
		self.backing.native_engine().get_elements(&mut keys, &mut values);
		keys
	}
}

impl<K: ElementOps> Default for Set<K> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn growth_to_a_hundred_distinct_integer_keys() {
		let mut s: Set<i32> = Set::new();
		for i in 0..100 {
			assert!(s.add(i));
		}
		assert_eq!(s.len(), 100);
		for i in 0..100 {
			assert!(s.contains(&i));
		}
	}

	#[test]
	fn duplicate_add_is_a_no_op() {
		let mut s: Set<i32> = Set::new();
		assert!(s.add(1));
		assert!(!s.add(1));
		assert_eq!(s.len(), 1);
	}

	#[test]
	fn remove_then_add_again_succeeds() {
		let mut s: Set<i32> = Set::new();
		s.add(1);
		assert!(s.remove(&1));
		assert!(!s.contains(&1));
		assert!(s.add(1));
	}

	#[test]
	fn from_array_deduplicates_and_freezes() {
		let s = Set::from_array(vec![1, 2, 2, 3]);
		assert!(s.is_immutable());
		assert_eq!(s.len(), 3);
		assert!(s.contains(&2));
	}

	#[test]
	fn mutable_copy_of_a_frozen_set_accepts_new_elements() {
		let mut s: Set<i32> = Set::new();
		s.add(1);
		s.make_immutable();
		let mut copy = s.mutable_copy(0);
		assert!(copy.add(2));
		assert_eq!(copy.len(), 2);
		assert_eq!(s.len(), 1);
	}
}
