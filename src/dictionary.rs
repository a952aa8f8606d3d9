//! `Dictionary<K, V>`: the keyed-value shape over the shared hash engine.

use crate::bridge::{Container, ForeignContainer};
use crate::callbacks::{DynCallbacks, ElementOps};
use crate::engine::Shape;
use crate::options::EngineOptions;
use std::sync::Arc;

/// An associative container: each key maps to exactly one value.
pub struct Dictionary<K: ElementOps, V: ElementOps> {
	backing: Container<K, V>,
}

impl<K: ElementOps, V: ElementOps> Dictionary<K, V> {
	pub fn new() -> Self {
		Self::with_options(EngineOptions::new())
	}

	pub fn with_options(options: EngineOptions) -> Self {
		Self { backing: Container::native(Shape::DICTIONARY, options) }
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self::with_options(EngineOptions::new().capacity(capacity))
	}

	pub fn bridged(backing: Box<dyn ForeignContainer<K, V>>) -> Self {
		Self { backing: Container::foreign(backing) }
	}

	/// Create-immutable: builds an already-frozen dictionary straight from
	/// parallel key/value arrays, rather than inserting one pair at a time.
	pub fn from_arrays(keys: Vec<K>, values: Vec<V>) -> Self {
		Self::from_arrays_with_callbacks(keys, values, None, None)
	}

	/// As [`from_arrays`](Self::from_arrays), but also installs the given
	/// callback tables before the elements are inserted, so lookups during
	/// construction use the same equality/hash the dictionary will use
	/// afterward.
	pub fn from_arrays_with_callbacks(
		keys: Vec<K>,
		values: Vec<V>,
		key_callbacks: Option<Arc<DynCallbacks<K>>>,
		value_callbacks: Option<Arc<DynCallbacks<V>>>,
	) -> Self {
		Self {
			backing: Container::Native(crate::engine::HashEngine::from_arrays(
				Shape::DICTIONARY,
				keys,
				values,
				key_callbacks,
				value_callbacks,
			)),
		}
	}

	/// Create-mutable-copy: a fresh, still-mutable dictionary seeded with
	/// every entry of `self`, sized for at least `capacity_hint` elements —
	/// distinct from [`copy`](Self::copy), which freezes the result.
	pub fn mutable_copy(&self, capacity_hint: usize) -> Self {
		Self { backing: Container::Native(self.backing.native_engine().mutable_copy(capacity_hint)) }
	}

	pub fn with_key_callbacks(mut self, callbacks: Arc<DynCallbacks<K>>) -> Self {
		self.backing = match self.backing {
			Container::Native(e) => Container::Native(e.with_key_callbacks(callbacks)),
			other => other,
		};
		self
	}

	pub fn with_value_callbacks(mut self, callbacks: Arc<DynCallbacks<V>>) -> Self {
		self.backing = match self.backing {
			Container::Native(e) => Container::Native(e.with_value_callbacks(callbacks)),
			other => other,
		};
		self
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

	/// Absent → insert `(key, value)`. Present → no-op, value untouched.
	pub fn add(&mut self, key: K, value: V) -> bool {
		self.backing.add(key, Some(value))
	}

	/// Absent → insert. Present → overwrite the value.
	pub fn set(&mut self, key: K, value: V) {
		self.backing.set(key, Some(value))
	}

	/// Absent → no-op. Present → overwrite the value.
	pub fn replace(&mut self, key: K, value: V) -> bool {
		self.backing.replace(key, Some(value))
	}

	pub fn remove(&mut self, key: &K) -> bool {
		self.backing.remove(key) > 0
	}

	pub fn remove_all(&mut self) {
		self.backing.remove_all()
	}

	pub fn get(&self, key: &K) -> Option<&V> {
		self.backing.find(key).and_then(|r| r.value())
	}

	pub fn contains_key(&self, key: &K) -> bool {
		self.backing.find(key).is_some()
	}

	/// Linear scan counting keys whose value equates to `value`
	/// (dictionary-only, native-backed; a hash engine instance).
	pub fn count_of_value(&self, value: &V) -> usize {
		self.backing.native_engine().count_of_value(value)
	}

	pub fn for_each(&self, f: impl FnMut(&K, Option<&V>, u32)) {
		self.backing.apply(f)
	}

	pub fn make_immutable(&mut self) {
		self.backing.make_immutable()
	}

	/// An immutable deep structural copy.
	pub fn copy(&self) -> Self {
		Self { backing: Container::Native(self.backing.native_engine().copy()) }
	}

	pub fn keys(&self) -> Vec<K> {
		let mut keys = Vec::with_capacity(self.len());
		let mut values = Vec::new();
		match &self.backing {
			Container::Native(e) => e.get_elements(&mut keys, &mut values),
			Container::Foreign(_) => self.backing.apply(|k, _, _| keys.push(k.clone())),
		}
		keys
	}

	/// Get-values: every stored value, in the same enumeration order as
	/// [`keys`](Self::keys).
	pub fn values(&self) -> Vec<V> {
		let mut keys = Vec::new();
		let mut values = Vec::with_capacity(self.len());
		self.backing.native_engine().get_elements(&mut keys, &mut values);
		values
	}

	/// Get-keys-and-values: both parallel arrays in one pass.
	pub fn keys_and_values(&self) -> (Vec<K>, Vec<V>) {
		let mut keys = Vec::with_capacity(self.len());
		let mut values = Vec::with_capacity(self.len());
		self.backing.native_engine().get_elements(&mut keys, &mut values);
		(keys, values)
	}

	/// Count-of-key: 1 if `key` is present, 0 otherwise (a dictionary has
	/// no multiplicity; present here only to match the set/bag shapes'
	/// same-named operation).
	pub fn count_of_key(&self, key: &K) -> u32 {
		self.backing.find(key).map(|r| r.count()).unwrap_or(0)
	}
}

impl<K: ElementOps, V: ElementOps> Default for Dictionary<K, V> {
	fn default() -> Self {
		Self::new()
	}
}
