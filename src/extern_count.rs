//! The external refcount bank: an escape valve for objects whose strong
//! count would overflow the header's inline field.
//!
//! The original leans on this table as a primary mechanism because its
//! inline refcount field is narrow (as little as 7 bits on some platforms).
//! [`crate::header::ObjectHeader`] widens the inline field to 32 bits, so
//! this bank is relegated to a rare-overflow path: sharded behind a lock,
//! touched only once in ~4 billion retains on a single object.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::registry::TypeId;

const SHARD_COUNT: usize = 8;

/// Identifies an object by its header address for the purposes of the
/// overflow table; the table never dereferences this.
pub type ObjectKey = usize;

struct Shard {
	counts: Mutex<HashMap<ObjectKey, u64>>,
}

impl Shard {
	fn new() -> Self {
		Self { counts: Mutex::new(HashMap::new()) }
	}
}

/// Sharded overflow table mapping object identity to an out-of-line extra
/// count, added on top of [`crate::header::CUSTOM_REFCOUNT_SENTINEL`] once
/// an object's inline field has saturated.
pub struct ExternCountTable {
	shards: [Shard; SHARD_COUNT],
	overflow_events: AtomicUsize,
}

fn shard_index(key: ObjectKey) -> usize {
	// Address bits below the smallest plausible allocation alignment carry
	// no entropy; fold from a mid byte instead.
	(key >> 4) % SHARD_COUNT
}

impl ExternCountTable {
	pub fn new() -> Self {
		Self {
			shards: [
				Shard::new(),
				Shard::new(),
				Shard::new(),
				Shard::new(),
				Shard::new(),
				Shard::new(),
				Shard::new(),
				Shard::new(),
			],
			overflow_events: AtomicUsize::new(0),
		}
	}

	/// Records that `key` (a type at `type_id`, for diagnostics only) has
	/// overflowed its inline refcount field and now needs `extra`
	/// additional strong references tracked out of line.
	pub fn record_overflow(&self, key: ObjectKey, type_id: TypeId, extra: u64) {
		self.overflow_events.fetch_add(1, Ordering::Relaxed);
		log::warn!(target: "extern_count", "type {:?} object overflowed its inline refcount; tracking {} extra externally", type_id, extra);
		let shard = &self.shards[shard_index(key)];
		*shard.counts.lock().entry(key).or_insert(0) += extra;
	}

	pub fn increment(&self, key: ObjectKey) -> u64 {
		let shard = &self.shards[shard_index(key)];
		let mut guard = shard.counts.lock();
		let entry = guard.entry(key).or_insert(0);
		*entry += 1;
		*entry
	}

	/// Decrements the external count, returning the remainder. A caller
	/// observing 0 should fold back to the header's inline field instead of
	/// continuing to consult this table.
	pub fn decrement(&self, key: ObjectKey) -> u64 {
		let shard = &self.shards[shard_index(key)];
		let mut guard = shard.counts.lock();
		match guard.get_mut(&key) {
			Some(count) if *count > 0 => {
				*count -= 1;
				let remaining = *count;
				if remaining == 0 {
					guard.remove(&key);
				}
				remaining
			}
			_ => 0,
		}
	}

	pub fn extra_count(&self, key: ObjectKey) -> u64 {
		let shard = &self.shards[shard_index(key)];
		shard.counts.lock().get(&key).copied().unwrap_or(0)
	}

	pub fn overflow_event_count(&self) -> usize {
		self.overflow_events.load(Ordering::Relaxed)
	}
}

impl Default for ExternCountTable {
	fn default() -> Self {
		Self::new()
	}
}

/// Process-wide overflow table, consulted only by the rare-path retain
/// logic that detects inline saturation.
pub static EXTERN_COUNTS: std::sync::LazyLock<ExternCountTable> =
	std::sync::LazyLock::new(ExternCountTable::new);

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::TypeId;

	#[test]
	fn increments_and_decrements_round_trip() {
		let table = ExternCountTable::new();
		let key = 0x1000;
		assert_eq!(table.increment(key), 1);
		assert_eq!(table.increment(key), 2);
		assert_eq!(table.decrement(key), 1);
		assert_eq!(table.decrement(key), 0);
		assert_eq!(table.extra_count(key), 0);
	}

	#[test]
	fn decrementing_an_absent_key_is_a_no_op() {
		let table = ExternCountTable::new();
		assert_eq!(table.decrement(0xdead), 0);
	}

	#[test]
	fn distinct_keys_land_in_independent_slots() {
		let table = ExternCountTable::new();
		table.increment(0x10);
        table.increment(0x20);
		assert_eq!(table.extra_count(0x10), 1);
		assert_eq!(table.extra_count(0x20), 1);
	}

	#[test]
	fn record_overflow_seeds_the_extra_count_and_logs_once() {
		let table = ExternCountTable::new();
		let before = table.overflow_event_count();
		table.record_overflow(0x30, TypeId(9), 5);
		assert_eq!(table.extra_count(0x30), 5);
		assert_eq!(table.overflow_event_count(), before + 1);
	}

	#[test]
	fn stress_many_keys_across_all_shards() {
		let table = ExternCountTable::new();
		for key in 0..1000usize {
			table.increment(key * 16);
		}
		for key in 0..1000usize {
			assert_eq!(table.extra_count(key * 16), 1);
		}
	}
}
