//! `Bag<K>`: the multiset shape over the shared hash engine.

use crate::bridge::Container;
use crate::callbacks::{DynCallbacks, ElementOps};
use crate::engine::Shape;
use crate::options::EngineOptions;
use std::sync::Arc;

/// A multiset: each key may be present with a multiplicity greater than
/// one.
pub struct Bag<K: ElementOps> {
	backing: Container<K, ()>,
}

impl<K: ElementOps> Bag<K> {
	pub fn new() -> Self {
		Self::with_options(EngineOptions::new())
	}

	pub fn with_options(options: EngineOptions) -> Self {
		Self { backing: Container::native(Shape::BAG, options) }
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

	/// Create-immutable: builds an already-frozen bag straight from an
	/// array of keys, with repeated keys accumulating multiplicity exactly
	/// as repeated `add` calls would.
	pub fn from_array(keys: Vec<K>) -> Self {
		Self::from_array_with_callbacks(keys, None)
	}

	pub fn from_array_with_callbacks(keys: Vec<K>, callbacks: Option<Arc<DynCallbacks<K>>>) -> Self {
		Self {
			backing: Container::Native(crate::engine::HashEngine::from_arrays(
				Shape::BAG,
				keys,
				Vec::new(),
				callbacks,
				None,
			)),
		}
	}

	/// Create-mutable-copy: a fresh, still-mutable bag seeded with every
	/// element of `self` (repeated per multiplicity), sized for at least
	/// `capacity_hint` elements.
	pub fn mutable_copy(&self, capacity_hint: usize) -> Self {
		Self { backing: Container::Native(self.backing.native_engine().mutable_copy(capacity_hint)) }
	}

	/// Sum of multiplicities over all distinct keys.
	pub fn len(&self) -> usize {
		self.backing.count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_immutable(&self) -> bool {
		self.backing.is_immutable()
	}

	/// Absent → insert at multiplicity 1. Present → increment multiplicity.
	pub fn add(&mut self, key: K) -> bool {
		self.backing.add(key, None)
	}

	/// Absent → insert at multiplicity 1. Present → replace the stored
	/// instance without touching multiplicity (unlike `add`, which
	/// increments).
	pub fn set(&mut self, key: K) {
		self.backing.set(key, None)
	}

	/// Present → replace the stored instance in place, releasing and
	/// re-retaining even when the incoming key equates to the one already
	/// stored: the original always swaps on `Replace` rather than
	/// special-casing equal-but-distinct instances (see DESIGN.md).
	pub fn replace(&mut self, key: K) -> bool {
		self.backing.replace(key, None)
	}

	/// Decrements the multiplicity by one, evicting the key entirely once
	/// it reaches zero. Returns the multiplicity observed before removal.
	pub fn remove(&mut self, key: &K) -> u32 {
		self.backing.remove(key)
	}

	pub fn remove_all(&mut self) {
		self.backing.remove_all()
	}

	pub fn count_of(&self, key: &K) -> u32 {
		self.backing.find(key).map(|r| r.count()).unwrap_or(0)
	}

	pub fn contains(&self, key: &K) -> bool {
		self.count_of(key) > 0
	}

	/// Visits each distinct key once per unit of multiplicity, matching the
	/// original's own `apply` behavior rather than visiting once with a
	/// reported count (see DESIGN.md).
	pub fn for_each(&self, mut f: impl FnMut(&K)) {
		self.backing.apply(|k, _, _| f(k))
	}

	pub fn make_immutable(&mut self) {
		self.backing.make_immutable()
	}

	pub fn copy(&self) -> Self {
		Self { backing: Container::Native(self.backing.native_engine().copy()) }
	}

	/// All elements, with each key repeated per its multiplicity.
	pub fn elements(&self) -> Vec<K> {
		let mut keys = Vec::with_capacity(self.len());
		let mut values = Vec::new();
		self.backing.native_engine().get_elements(&mut keys, &mut values);
		keys
	}
}

impl<K: ElementOps> Default for Bag<K> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn count_of_value_tracks_repeated_adds() {
		let mut b: Bag<String> = Bag::new();
		b.add("apple".to_string());
		b.add("apple".to_string());
		b.add("pear".to_string());
		assert_eq!(b.count_of(&"apple".to_string()), 2);
		assert_eq!(b.count_of(&"pear".to_string()), 1);
		assert_eq!(b.len(), 3);
	}

	#[test]
	fn set_overwrites_without_changing_multiplicity() {
		let mut b: Bag<i32> = Bag::new();
		b.add(1);
		b.add(1);
		b.set(1);
		assert_eq!(b.count_of(&1), 2);
		b.set(2);
		assert_eq!(b.count_of(&2), 1);
	}

	#[test]
	fn remove_decrements_until_eviction() {
		let mut b: Bag<i32> = Bag::new();
		b.add(1);
		b.add(1);
		assert_eq!(b.remove(&1), 2);
		assert!(b.contains(&1));
		assert_eq!(b.remove(&1), 1);
		assert!(!b.contains(&1));
	}

	#[test]
	fn for_each_visits_once_per_multiplicity() {
		let mut b: Bag<i32> = Bag::new();
		b.add(9);
		b.add(9);
		b.add(9);
		let mut seen = 0;
		b.for_each(|_| seen += 1);
		assert_eq!(seen, 3);
	}

	#[test]
	fn from_array_accumulates_multiplicity_and_freezes() {
		let b = Bag::from_array(vec![1, 1, 2]);
		assert!(b.is_immutable());
		assert_eq!(b.count_of(&1), 2);
		assert_eq!(b.count_of(&2), 1);
	}

	#[test]
	fn mutable_copy_of_a_frozen_bag_accepts_new_elements() {
		let mut b: Bag<i32> = Bag::new();
		b.add(1);
		b.make_immutable();
		let mut copy = b.mutable_copy(0);
		assert!(copy.add(2));
		assert_eq!(copy.len(), 2);
		assert_eq!(b.len(), 1);
	}
}
