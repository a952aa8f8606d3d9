//! The packed per-object header word and the lock-free retain/release
//! protocol built on top of it.
//!
//! The whole header — type-id, flags, and refcount — lives in one
//! `AtomicU64` so a single compare-and-swap covers the deallocating bit and
//! the refcount together. This replaces the original two-word isa/info
//! layout: there is no separate isa/bridge word because bridging is
//! handled at the Rust type level by [`crate::bridge::Container`]'s enum
//! tag instead.

use std::sync::atomic::{AtomicU64, Ordering};
use crate::extern_count::EXTERN_COUNTS;
use crate::registry::TypeId;

const TYPE_ID_BITS: u32 = 12;
const TYPE_ID_MASK: u64 = (1 << TYPE_ID_BITS) - 1;

const CUSTOM_REFCOUNT_BIT: u64 = 1 << 12;
const DEFAULT_ALLOCATOR_BIT: u64 = 1 << 13;
const IMMUTABLE_BIT: u64 = 1 << 14;
const KVO_AUXILIARY_BIT: u64 = 1 << 15;
const DEALLOCATING_BIT: u64 = 1 << 16;
/// Set once the inline field has hit [`INLINE_REFCOUNT_CEILING`] and further
/// retains are tracked in [`crate::extern_count::EXTERN_COUNTS`] instead.
const EXTERNAL_COUNT_BIT: u64 = 1 << 17;

const REFCOUNT_SHIFT: u32 = 32;

/// Sentinel refcount field value reserved for types with a custom refcount
/// hook ("bogus-object"): the inline field must read exactly this, any
/// other value with the custom-refcount bit set is a corrupted header.
pub const CUSTOM_REFCOUNT_SENTINEL: u32 = 0xFFFF_FFFF;

/// The inline field's last usable value before retains delegate to the
/// external overflow bank rather than wrapping. One below
/// [`CUSTOM_REFCOUNT_SENTINEL`] so the two never collide.
pub const INLINE_REFCOUNT_CEILING: u32 = u32::MAX - 1;

/// Failure returned by [`ObjectHeader::retain`]/[`try_retain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainError {
	/// The custom-refcount bit is set but the inline field isn't the
	/// reserved sentinel: the header is internally inconsistent.
	BogusObject,
	/// The object has already observed refcount 0 and is tearing down.
	Deallocating,
}

/// The packed per-object metadata word.
pub struct ObjectHeader(AtomicU64);

fn pack(type_id: TypeId, flags: u64, refcount: u32) -> u64 {
	debug_assert!(type_id.as_u32() as u64 <= TYPE_ID_MASK, "type-id overflows its 12 bits");
	(type_id.as_u32() as u64) | flags | ((refcount as u64) << REFCOUNT_SHIFT)
}

impl ObjectHeader {
	/// A freshly created instance at refcount 1, non-immutable, using the
	/// default (process) allocator.
	pub fn new(type_id: TypeId, custom_refcount: bool) -> Self {
		let mut flags = DEFAULT_ALLOCATOR_BIT;
		let refcount = if custom_refcount {
			flags |= CUSTOM_REFCOUNT_BIT;
			CUSTOM_REFCOUNT_SENTINEL
		} else {
			1
		};
		Self(AtomicU64::new(pack(type_id, flags, refcount)))
	}

	/// A constant (static) instance: stored refcount 0, retain/release on
	/// it are no-ops forever.
	pub fn new_constant(type_id: TypeId) -> Self {
		Self(AtomicU64::new(pack(type_id, DEFAULT_ALLOCATOR_BIT, 0)))
	}

	fn load(&self) -> u64 {
		self.0.load(Ordering::Acquire)
	}

	pub fn type_id(&self) -> TypeId {
		TypeId((self.load() & TYPE_ID_MASK) as u32)
	}

	pub fn is_custom_refcount(&self) -> bool {
		self.load() & CUSTOM_REFCOUNT_BIT != 0
	}

	pub fn is_immutable(&self) -> bool {
		self.load() & IMMUTABLE_BIT != 0
	}

	pub fn is_deallocating(&self) -> bool {
		self.load() & DEALLOCATING_BIT != 0
	}

	pub fn is_kvo_auxiliary(&self) -> bool {
		self.load() & KVO_AUXILIARY_BIT != 0
	}

	fn inline_refcount(word: u64) -> u32 {
		(word >> REFCOUNT_SHIFT) as u32
	}

	/// Identifies this header to the external overflow bank. The bank never
	/// dereferences this; it only uses it as a map key.
	fn extern_key(&self) -> usize {
		self as *const Self as usize
	}

	/// The stored refcount, folding in whatever the external overflow bank
	/// is tracking once the inline field has saturated. Types with a custom
	/// refcount hook should consult their own hook instead; this returns
	/// the raw (sentinel) inline field in that case.
	pub fn refcount(&self) -> u32 {
		let word = self.load();
		let inline = Self::inline_refcount(word);
		if word & EXTERNAL_COUNT_BIT != 0 {
			let extra = EXTERN_COUNTS.extra_count(self.extern_key());
			inline.saturating_add(extra.min(u32::MAX as u64) as u32)
		} else {
			inline
		}
	}

	/// One-way mutable → immutable transition. Not idempotent-checked by
	/// design: callers (the "make immutable" façade operation) are
	/// responsible for calling this at most once.
	pub fn make_immutable(&self) {
		self.0.fetch_or(IMMUTABLE_BIT, Ordering::AcqRel);
	}

	pub fn set_kvo_auxiliary(&self, on: bool) {
		if on {
			self.0.fetch_or(KVO_AUXILIARY_BIT, Ordering::AcqRel);
		} else {
			self.0.fetch_and(!KVO_AUXILIARY_BIT, Ordering::AcqRel);
		}
	}

	/// Increments the refcount. Undefined (may resurrect a freed object)
	/// if called on a header observed deallocating; use [`try_retain`] in
	/// that situation.
	///
	/// [`try_retain`]: ObjectHeader::try_retain
	pub fn retain(&self) -> Result<(), RetainError> {
		self.retain_checking_deallocating(false)
	}

	/// Like [`retain`](Self::retain), but fails with
	/// [`RetainError::Deallocating`] instead of racing a teardown, so a
	/// weak reference can never resurrect an object mid-finalization.
	pub fn try_retain(&self) -> Result<(), RetainError> {
		self.retain_checking_deallocating(true)
	}

	fn retain_checking_deallocating(&self, check_deallocating: bool) -> Result<(), RetainError> {
		loop {
			let word = self.load();
			if check_deallocating && word & DEALLOCATING_BIT != 0 {
				return Err(RetainError::Deallocating);
			}
			if Self::inline_refcount(word) == 0 && word & CUSTOM_REFCOUNT_BIT == 0 {
				// Constant instance: no-op
				return Ok(());
			}
			if word & CUSTOM_REFCOUNT_BIT != 0 && Self::inline_refcount(word) != CUSTOM_REFCOUNT_SENTINEL {
				return Err(RetainError::BogusObject);
			}
			if word & EXTERNAL_COUNT_BIT != 0 {
				// Already overflowed: every further retain is tracked
				// entirely in the external bank, inline field pinned at
				// the ceiling.
				EXTERN_COUNTS.increment(self.extern_key());
				return Ok(());
			}
			let count = Self::inline_refcount(word);
			if count == INLINE_REFCOUNT_CEILING {
				let new_word = word | EXTERNAL_COUNT_BIT;
				if self
					.0
					.compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
					.is_ok()
				{
					EXTERN_COUNTS.record_overflow(self.extern_key(), self.type_id(), 1);
					return Ok(());
				}
				continue;
			}
			let new_count = count + 1;
			let new_word = (word & !(0xFFFF_FFFFu64 << REFCOUNT_SHIFT)) | ((new_count as u64) << REFCOUNT_SHIFT);
			if self
				.0
				.compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
				.is_ok()
			{
				return Ok(());
			}
		}
	}

	/// Decrements the refcount, returning `true` exactly once: on the
	/// thread that observed the 1→0 transition and must run teardown.
	///
	/// Constants (stored refcount 0) always return `false`.
	pub fn release_returning_should_deallocate(&self) -> bool {
		loop {
			let word = self.load();
			let count = Self::inline_refcount(word);
			if count == 0 {
				return false; // constant instance
			}
			if word & EXTERNAL_COUNT_BIT != 0 {
				// The decrement itself is this release; the inline field
				// (pinned at the ceiling) isn't touched unless the
				// external bank just drained to empty.
				if EXTERN_COUNTS.decrement(self.extern_key()) > 0 {
					return false;
				}
				let new_word = word & !EXTERNAL_COUNT_BIT;
				if self
					.0
					.compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
					.is_ok()
				{
					return false;
				}
				continue;
			}
			if count == 1 {
				let new_word = (word & !(0xFFFF_FFFFu64 << REFCOUNT_SHIFT)) | DEALLOCATING_BIT;
				if self
					.0
					.compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
					.is_ok()
				{
					return true;
				}
				continue;
			}
			let new_count = count - 1;
			let new_word = (word & !(0xFFFF_FFFFu64 << REFCOUNT_SHIFT)) | ((new_count as u64) << REFCOUNT_SHIFT);
			if self
				.0
				.compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
				.is_ok()
			{
				return false;
			}
		}
	}

	/// Called once teardown has started: if a finalizer resurrected the
	/// object (pushed the refcount above 0 again), clear the deallocating
	/// bit and return `true` so release can be retried from the top.
	pub fn clear_deallocating_if_resurrected(&self) -> bool {
		let word = self.load();
		debug_assert!(word & DEALLOCATING_BIT != 0, "not in the deallocating state");
		if Self::inline_refcount(word) > 0 {
			self.0.fetch_and(!DEALLOCATING_BIT, Ordering::AcqRel);
			true
		} else {
			false
		}
	}

	/// Used by a finalizer that wants to resurrect the object: bumps the
	/// refcount while still in the deallocating state.
	pub fn resurrect(&self) {
		loop {
			let word = self.load();
			debug_assert!(word & DEALLOCATING_BIT != 0);
			let count = Self::inline_refcount(word);
			let new_word = (word & !(0xFFFF_FFFFu64 << REFCOUNT_SHIFT)) | ((count.wrapping_add(1) as u64) << REFCOUNT_SHIFT);
			if self
				.0
				.compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
				.is_ok()
			{
				return;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::TypeId;

	fn tid() -> TypeId {
		TypeId(7)
	}

	#[test]
	fn starts_at_refcount_one() {
		let h = ObjectHeader::new(tid(), false);
		assert_eq!(h.refcount(), 1);
		assert!(!h.is_deallocating());
	}

	#[test]
	fn retain_then_release_is_a_no_op_on_the_count() {
		let h = ObjectHeader::new(tid(), false);
		h.retain().unwrap();
		assert_eq!(h.refcount(), 2);
		assert!(!h.release_returning_should_deallocate());
		assert_eq!(h.refcount(), 1);
	}

	#[test]
	fn last_release_reports_should_deallocate_exactly_once() {
		let h = ObjectHeader::new(tid(), false);
		h.retain().unwrap();
		assert!(!h.release_returning_should_deallocate());
		assert!(h.release_returning_should_deallocate());
		assert!(h.is_deallocating());
	}

	#[test]
	fn constant_instances_are_immune_to_release() {
		let h = ObjectHeader::new_constant(tid());
		assert_eq!(h.refcount(), 0);
		assert!(!h.release_returning_should_deallocate());
		h.retain().unwrap();
		assert_eq!(h.refcount(), 0);
	}

	#[test]
	fn try_retain_fails_once_deallocating() {
		let h = ObjectHeader::new(tid(), false);
		assert!(h.release_returning_should_deallocate());
		assert_eq!(h.try_retain(), Err(RetainError::Deallocating));
	}

	#[test]
	fn bogus_custom_refcount_is_rejected() {
		let h = ObjectHeader::new(tid(), true);
		// Corrupt the inline field directly to simulate an inconsistency.
		h.0.store(tid().as_u32() as u64 | CUSTOM_REFCOUNT_BIT | (3u64 << REFCOUNT_SHIFT), Ordering::SeqCst);
		assert_eq!(h.retain(), Err(RetainError::BogusObject));
	}

	#[test]
	fn resurrection_clears_the_deallocating_bit() {
		let h = ObjectHeader::new(tid(), false);
		assert!(h.release_returning_should_deallocate());
		h.resurrect();
		assert!(h.clear_deallocating_if_resurrected());
		assert!(!h.is_deallocating());
		assert_eq!(h.refcount(), 1);
	}

	#[test]
	fn make_immutable_is_one_way() {
		let h = ObjectHeader::new(tid(), false);
		assert!(!h.is_immutable());
		h.make_immutable();
		assert!(h.is_immutable());
	}

	#[test]
	fn retain_at_the_inline_ceiling_delegates_to_the_external_bank() {
		let h = ObjectHeader::new(tid(), false);
		h.0.store(tid().as_u32() as u64 | DEFAULT_ALLOCATOR_BIT | ((INLINE_REFCOUNT_CEILING as u64) << REFCOUNT_SHIFT), Ordering::SeqCst);
		assert_eq!(h.refcount(), INLINE_REFCOUNT_CEILING);

		h.retain().unwrap();
		assert!(h.load() & EXTERNAL_COUNT_BIT != 0);
		assert_eq!(h.refcount(), INLINE_REFCOUNT_CEILING + 1);

		h.retain().unwrap();
		assert_eq!(h.refcount(), INLINE_REFCOUNT_CEILING + 2);

		assert!(!h.release_returning_should_deallocate());
		assert_eq!(h.refcount(), INLINE_REFCOUNT_CEILING + 1);

		assert!(!h.release_returning_should_deallocate());
		assert!(h.load() & EXTERNAL_COUNT_BIT == 0);
		assert_eq!(h.refcount(), INLINE_REFCOUNT_CEILING);
	}
}
