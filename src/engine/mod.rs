//! The hash engine: one open-addressed table backing all three container
//! shapes.
//!
//! Bucket layout is three parallel `Vec`s (`states`, `keys`, `values`) plus
//! a `counts` array, mirroring the original's parallel-array bucket model;
//! unlike the original's void-pointer slots, `keys`/`values` are
//! `Option<K>`/`Option<V>` so bucket occupancy and the stored value agree
//! by construction instead of by a separate flags word.

use std::fmt;

use crate::callbacks::{DynCallbacks, ElementOps};
use crate::options::{next_capacity, EngineOptions, ProbeFamily};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BucketState {
	Empty,
	Deleted,
	Occupied,
}

/// Which shape an engine instance is wearing. Chosen at creation time and
/// fixed for the instance's lifetime (a hash engine instance "shape switches").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
	/// Dictionary: a second, independent value per key.
	pub has_values: bool,
	/// Bag: per-bucket multiplicity greater than one is allowed.
	pub has_counts: bool,
}

impl Shape {
	pub const DICTIONARY: Shape = Shape { has_values: true, has_counts: false };
	pub const SET: Shape = Shape { has_values: false, has_counts: false };
	pub const BAG: Shape = Shape { has_values: false, has_counts: true };
}

/// The result of a successful [`HashEngine::find`].
pub struct FindResult<'a, K, V> {
	pub key: &'a K,
	pub value: Option<&'a V>,
	pub count: u32,
}

/// One open-addressed hash table, parameterized by shape flags rather than
/// by type
pub struct HashEngine<K: ElementOps, V: ElementOps = ()> {
	shape: Shape,
	probe_family: ProbeFamily,
	load_factor: f64,
	states: Vec<BucketState>,
	keys: Vec<Option<K>>,
	values: Vec<Option<V>>,
	counts: Vec<u32>,
	occupied: usize,
	count: usize,
	immutable: bool,
	key_callbacks: Option<std::sync::Arc<DynCallbacks<K>>>,
	value_callbacks: Option<std::sync::Arc<DynCallbacks<V>>>,
}

impl<K: ElementOps, V: ElementOps> fmt::Debug for HashEngine<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HashEngine")
			.field("capacity", &self.states.len())
			.field("count", &self.count)
			.field("immutable", &self.immutable)
			.finish()
	}
}

impl<K: ElementOps, V: ElementOps> HashEngine<K, V> {
	pub fn new(shape: Shape, options: EngineOptions) -> Self {
		let capacity = options.initial_capacity();
		Self {
			shape,
			probe_family: options.probe_family,
			load_factor: options.load_factor,
			states: vec![BucketState::Empty; capacity],
			keys: (0..capacity).map(|_| None).collect(),
			values: (0..capacity).map(|_| None).collect(),
			counts: vec![0; capacity],
			occupied: 0,
			count: 0,
			immutable: false,
			key_callbacks: None,
			value_callbacks: None,
		}
	}

	pub fn with_key_callbacks(mut self, callbacks: std::sync::Arc<DynCallbacks<K>>) -> Self {
		self.key_callbacks = Some(callbacks);
		self
	}

	pub fn with_value_callbacks(mut self, callbacks: std::sync::Arc<DynCallbacks<V>>) -> Self {
		self.value_callbacks = Some(callbacks);
		self
	}

	fn key_equals(&self, a: &K, b: &K) -> bool {
		match &self.key_callbacks {
			Some(cb) => (cb.equals)(a, b),
			None => a.equals(b),
		}
	}

	fn key_hash(&self, k: &K) -> u64 {
		match &self.key_callbacks {
			Some(cb) => (cb.hash_value)(k),
			None => k.hash_value(),
		}
	}

	fn value_equals(&self, a: &V, b: &V) -> bool {
		match &self.value_callbacks {
			Some(cb) => (cb.equals)(a, b),
			None => a.equals(b),
		}
	}

	pub fn shape(&self) -> Shape {
		self.shape
	}

	/// Which of the key callback table's slots were left absent in favor
	/// of `K`'s own [`ElementOps`], or `None` when no key callback table is
	/// installed at all (the fully-standard fast path).
	pub fn key_special_bits(&self) -> Option<crate::callbacks::SpecialBits> {
		self.key_callbacks.as_ref().map(|cb| cb.special_bits)
	}

	/// As [`key_special_bits`](Self::key_special_bits), for the value
	/// callback table.
	pub fn value_special_bits(&self) -> Option<crate::callbacks::SpecialBits> {
		self.value_callbacks.as_ref().map(|cb| cb.special_bits)
	}

	pub fn capacity(&self) -> usize {
		self.states.len()
	}

	/// Sum of `count` over occupied buckets — the externally visible
	/// element count.
	pub fn count(&self) -> usize {
		self.count
	}

	pub fn is_immutable(&self) -> bool {
		self.immutable
	}

	fn probe_step(&self, hash: u64) -> usize {
		let capacity = self.states.len();
		match self.probe_family {
			ProbeFamily::Linear | ProbeFamily::Exponential => 1,
			ProbeFamily::Double => {
				let folded = hash.wrapping_mul(0x9E3779B97F4A7C15) >> 32;
				(((folded as usize) | 1) % capacity.max(1)).max(1)
			}
		}
	}

	fn probe_start(&self, hash: u64) -> usize {
		(hash as usize) % self.states.len().max(1)
	}

	/// For an occupied bucket, `hash(key) mod capacity` identifies the
	/// start of the chain that reaches it; lookup stops at the first empty
	/// slot, skipping tombstones.
	fn find_index(&self, key: &K) -> Option<usize> {
		let hash = self.key_hash(key);
		let step = self.probe_step(hash);
		let mut idx = self.probe_start(hash);
		for _ in 0..self.states.len() {
			match self.states[idx] {
				BucketState::Empty => return None,
				BucketState::Occupied if self.key_equals(self.keys[idx].as_ref().unwrap(), key) => {
					return Some(idx)
				}
				_ => {}
			}
			idx = (idx + step) % self.states.len();
		}
		None
	}

	/// Returns `(index, already_present)`: the bucket `key` is or should be
	/// stored at, preferring the first tombstone seen along the chain when
	/// the key isn't already present.
	fn probe_for_insert(&self, key: &K) -> (usize, bool) {
		let hash = self.key_hash(key);
		let step = self.probe_step(hash);
		let mut idx = self.probe_start(hash);
		let mut first_tombstone = None;
		for _ in 0..self.states.len() {
			match self.states[idx] {
				BucketState::Empty => return (first_tombstone.unwrap_or(idx), false),
				BucketState::Deleted => {
					if first_tombstone.is_none() {
						first_tombstone = Some(idx);
					}
				}
				BucketState::Occupied if self.key_equals(self.keys[idx].as_ref().unwrap(), key) => {
					return (idx, true)
				}
				BucketState::Occupied => {}
			}
			idx = (idx + step) % self.states.len();
		}
		unreachable!("probe exhausted the table without finding an empty bucket — load factor invariant violated")
	}

	fn should_grow(&self) -> bool {
		(self.occupied + 1) as f64 > self.states.len() as f64 * self.load_factor
	}

	fn rehash(&mut self) {
		let new_capacity = next_capacity(self.states.len());
		log::trace!(target: "engine", "rehashing {} -> {} buckets", self.states.len(), new_capacity);
		let old_states = std::mem::replace(&mut self.states, vec![BucketState::Empty; new_capacity]);
		let old_keys = std::mem::replace(&mut self.keys, (0..new_capacity).map(|_| None).collect());
		let old_values = std::mem::replace(&mut self.values, (0..new_capacity).map(|_| None).collect());
		let old_counts = std::mem::replace(&mut self.counts, vec![0; new_capacity]);
		self.occupied = 0;

		for (i, state) in old_states.into_iter().enumerate() {
			if state != BucketState::Occupied {
				continue;
			}
			let key = old_keys[i].clone().expect("occupied bucket has a key");
			let (idx, _) = self.probe_for_insert(&key);
			self.states[idx] = BucketState::Occupied;
			self.keys[idx] = Some(key);
			self.values[idx] = old_values[i].clone();
			self.counts[idx] = old_counts[i];
			self.occupied += 1;
		}
	}

	fn ensure_room_for_insert(&mut self) {
		if self.should_grow() {
			self.rehash();
		}
	}

	fn warn_immutable(&self, op: &str) {
		log::warn!(target: "engine", "{} on an immutable table ignored", op);
	}

	/// Add: absent → insert; present in dictionary/set → no-op; present in
	/// bag → increment count. Returns whether a new key was introduced.
	pub fn add(&mut self, key: K, value: Option<V>) -> bool {
		if self.immutable {
			self.warn_immutable("add");
			return false;
		}
		self.ensure_room_for_insert();
		let (idx, present) = self.probe_for_insert(&key);
		if present {
			if self.shape.has_counts {
				self.counts[idx] += 1;
				self.count += 1;
			}
			return false;
		}
		self.states[idx] = BucketState::Occupied;
		self.keys[idx] = Some(key);
		self.values[idx] = value;
		self.counts[idx] = 1;
		self.occupied += 1;
		self.count += 1;
		true
	}

	/// Set: absent → insert; present → replace the value (dictionary) or
	/// the key object (set/bag)
	pub fn set(&mut self, key: K, value: Option<V>) {
		if self.immutable {
			self.warn_immutable("set");
			return;
		}
		self.ensure_room_for_insert();
		let (idx, present) = self.probe_for_insert(&key);
		if present {
			if self.shape.has_values {
				self.values[idx] = value; // drops the outgoing value first
			} else {
				self.keys[idx] = Some(key); // drops the outgoing key first
			}
			return;
		}
		self.states[idx] = BucketState::Occupied;
		self.keys[idx] = Some(key);
		self.values[idx] = value;
		self.counts[idx] = 1;
		self.occupied += 1;
		self.count += 1;
	}

	/// Replace: absent → no-op; present → as Set's present-case.
	pub fn replace(&mut self, key: K, value: Option<V>) -> bool {
		if self.immutable {
			self.warn_immutable("replace");
			return false;
		}
		match self.find_index(&key) {
			None => false,
			Some(idx) => {
				if self.shape.has_values {
					self.values[idx] = value;
				} else {
					self.keys[idx] = Some(key);
				}
				true
			}
		}
	}

	/// Remove(key): absent → no-op, returns 0. Set/dictionary evict; bag
	/// decrements, evicting only once count reaches 0. Returns the prior
	/// count.
	pub fn remove(&mut self, key: &K) -> u32 {
		if self.immutable {
			self.warn_immutable("remove");
			return 0;
		}
		let Some(idx) = self.find_index(key) else {
			return 0;
		};
		let prior = self.counts[idx];
		if self.shape.has_counts && prior > 1 {
			self.counts[idx] -= 1;
			self.count -= 1;
			return prior;
		}
		self.states[idx] = BucketState::Deleted;
		self.keys[idx] = None;
		self.values[idx] = None;
		self.counts[idx] = 0;
		self.occupied -= 1;
		self.count -= 1;
		prior
	}

	/// Remove-all: release every element and mark every bucket empty.
	pub fn remove_all(&mut self) {
		if self.immutable {
			self.warn_immutable("remove_all");
			return;
		}
		for state in self.states.iter_mut() {
			*state = BucketState::Empty;
		}
		for k in self.keys.iter_mut() {
			*k = None;
		}
		for v in self.values.iter_mut() {
			*v = None;
		}
		for c in self.counts.iter_mut() {
			*c = 0;
		}
		self.occupied = 0;
		self.count = 0;
	}

	pub fn find(&self, key: &K) -> Option<FindResult<'_, K, V>> {
		let idx = self.find_index(key)?;
		Some(FindResult {
			key: self.keys[idx].as_ref().unwrap(),
			value: self.values[idx].as_ref(),
			count: self.counts[idx],
		})
	}

	pub fn contains(&self, key: &K) -> bool {
		self.find_index(key).is_some()
	}

	pub fn count_of_key(&self, key: &K) -> u32 {
		self.find_index(key).map(|idx| self.counts[idx]).unwrap_or(0)
	}

	/// Count-of-value (dictionary only): linear scan counting buckets whose
	/// value equates to `value`.
	pub fn count_of_value(&self, value: &V) -> usize {
		assert!(self.shape.has_values, "count_of_value is dictionary-only");
		self.states
			.iter()
			.enumerate()
			.filter(|(i, s)| **s == BucketState::Occupied && self.value_equals(self.values[*i].as_ref().unwrap(), value))
			.count()
	}

	/// Apply: enumerates occupied buckets in implementation-defined order,
	/// once per multiplicity for a bag, matching the original's own
	/// callback-enumeration behavior (see DESIGN.md).
	pub fn apply(&self, mut f: impl FnMut(&K, Option<&V>, u32)) {
		for (i, state) in self.states.iter().enumerate() {
			if *state != BucketState::Occupied {
				continue;
			}
			let key = self.keys[i].as_ref().unwrap();
			let value = self.values[i].as_ref();
			let repeats = if self.shape.has_counts { self.counts[i] } else { 1 };
			for _ in 0..repeats {
				f(key, value, self.counts[i]);
			}
		}
	}

	/// Bulk-copies keys (and values, if this is a dictionary) into
	/// caller-provided buffers.
	pub fn get_elements(&self, out_keys: &mut Vec<K>, out_values: &mut Vec<V>) {
		for (i, state) in self.states.iter().enumerate() {
			if *state != BucketState::Occupied {
				continue;
			}
			let repeats = if self.shape.has_counts { self.counts[i] } else { 1 };
			for _ in 0..repeats {
				out_keys.push(self.keys[i].clone().unwrap());
				if self.shape.has_values {
					out_values.push(self.values[i].clone().unwrap());
				}
			}
		}
	}

	/// One-way transition; thereafter all mutating operations log and
	/// no-op instead of changing any observable state.
	pub fn make_immutable(&mut self) {
		self.immutable = true;
	}

	/// Produces an immutable deep structural copy: elements are retained
	/// (cloned) through into fresh storage, never aliasing the source's
	/// buckets.
	pub fn copy(&self) -> Self {
		let mut copy = Self {
			shape: self.shape,
			probe_family: self.probe_family,
			load_factor: self.load_factor,
			states: self.states.clone(),
			keys: self.keys.clone(),
			values: self.values.clone(),
			counts: self.counts.clone(),
			occupied: self.occupied,
			count: self.count,
			immutable: false,
			key_callbacks: self.key_callbacks.clone(),
			value_callbacks: self.value_callbacks.clone(),
		};
		copy.make_immutable();
		copy
	}

	/// A mutable copy: a fresh, non-immutable table sized for at least
	/// `capacity_hint` elements, seeded with every element of `self`
	/// (repeated per multiplicity for a bag), rather than an immutable
	/// snapshot (see [`copy`](Self::copy)).
	pub fn mutable_copy(&self, capacity_hint: usize) -> Self {
		let mut fresh = Self::new(
			self.shape,
			EngineOptions::new()
				.capacity(capacity_hint.max(self.count))
				.probe_family(self.probe_family),
		);
		fresh.key_callbacks = self.key_callbacks.clone();
		fresh.value_callbacks = self.value_callbacks.clone();
		self.apply(|k, v, _| {
			fresh.add(k.clone(), v.cloned());
		});
		fresh
	}

	/// Builds an already-immutable table directly from parallel key/value
	/// arrays plus optional callback tables, matching a create-immutable
	/// constructor that takes the elements up front instead of inserting
	/// them one at a time.
	pub fn from_arrays(
		shape: Shape,
		keys: Vec<K>,
		values: Vec<V>,
		key_callbacks: Option<std::sync::Arc<DynCallbacks<K>>>,
		value_callbacks: Option<std::sync::Arc<DynCallbacks<V>>>,
	) -> Self {
		if shape.has_values {
			assert_eq!(keys.len(), values.len(), "keys and values arrays must be the same length");
		}
		let mut engine = Self::new(shape, EngineOptions::new().capacity(keys.len().max(1)));
		if let Some(cb) = key_callbacks {
			engine = engine.with_key_callbacks(cb);
		}
		if let Some(cb) = value_callbacks {
			engine = engine.with_value_callbacks(cb);
		}
		let mut values = values.into_iter();
		for key in keys.into_iter() {
			engine.add(key, values.next());
		}
		engine.make_immutable();
		engine
	}
}
