//! Per-element behavior: a fast monomorphized trait path plus a slow
//! per-instance vtable path.
//!
//! The original's retain/release callback slots are folded into ordinary
//! Rust ownership: the engine stores an owned `K`/`V` (obtained via
//! `Clone`, which *is* the retain for a [`crate::object::Handle`] element),
//! and eviction-then-write falls out of plain assignment — `place =
//! new_value` drops the old value in `place` before moving the new one in,
//! for free, satisfying "release outgoing element before writing the new
//! one" without a manual callback. `ElementOps` therefore only needs to
//! supply equate/hash/describe.

use twox_hash::XxHash64;

/// The statically-dispatched fast path: the "standard-callback" element
/// behavior, monomorphized per element type instead of indirected through
/// function pointers. Implement this for any type used as a key or value;
/// [`impl_element_ops_by_value`] provides it for the common primitive/owned
/// types, and [`crate::object::Handle<T>`] provides it for runtime-managed
/// ("strong") elements.
pub trait ElementOps: Clone {
	fn equals(&self, other: &Self) -> bool;
	fn hash_value(&self) -> u64;
	fn describe(&self) -> String;
}

/// Implements [`ElementOps`] for a value type via its own `PartialEq` and
/// `Hash`, matching the original's type-generic default (equate/hash by
/// value identity).
#[macro_export]
macro_rules! impl_element_ops_by_value {
	($($t:ty),+ $(,)?) => {
		$(
			impl $crate::callbacks::ElementOps for $t {
				fn equals(&self, other: &Self) -> bool { self == other }
				fn hash_value(&self) -> u64 {
					use std::hash::{Hash, Hasher};
					let mut hasher = $crate::callbacks::default_hasher();
					self.hash(&mut hasher);
					hasher.finish()
				}
				fn describe(&self) -> String { format!("{:?}", self) }
			}
		)+
	};
}

pub fn default_hasher() -> XxHash64 {
	XxHash64::with_seed(0)
}

impl_element_ops_by_value!(
	(),
	bool,
	char,
	i8, i16, i32, i64, i128, isize,
	u8, u16, u32, u64, u128, usize,
	String,
	Vec<u8>,
);

bitflags::bitflags! {
	/// Which of a [`DynCallbacks`] table's slots were left absent (falling
	/// back to the element's own [`ElementOps`] impl) rather than supplied
	/// explicitly, recording fast-path selection and null-suppression the
	/// way the original's per-slot "special bits" did.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct SpecialBits: u8 {
		const EQUALS_DEFAULTED     = 1 << 0;
		const HASH_VALUE_DEFAULTED = 1 << 1;
		const DESCRIBE_DEFAULTED   = 1 << 2;
	}
}

/// The slow path: a per-instance callback table of user-supplied functions,
/// used when the standard fast path isn't what the caller wants (e.g.
/// value equality that ignores part of the type, or a hash/equality pair
/// that must match some external contract).
///
/// Mirrors the original's "twelve function pointers plus opaque context"
/// layout, minus the retain/release slots (see module docs).
pub struct DynCallbacks<T> {
	pub equals: Box<dyn Fn(&T, &T) -> bool + Send + Sync>,
	pub hash_value: Box<dyn Fn(&T) -> u64 + Send + Sync>,
	pub describe: Box<dyn Fn(&T) -> String + Send + Sync>,
	/// Which slots above were filled by [`new_partial`](Self::new_partial)
	/// falling back to [`ElementOps`] rather than a caller-supplied
	/// function. Always empty for a table built with [`new`](Self::new).
	pub special_bits: SpecialBits,
}

impl<T> DynCallbacks<T> {
	pub fn new(
		equals: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
		hash_value: impl Fn(&T) -> u64 + Send + Sync + 'static,
		describe: impl Fn(&T) -> String + Send + Sync + 'static,
	) -> Self {
		Self {
			equals: Box::new(equals),
			hash_value: Box::new(hash_value),
			describe: Box::new(describe),
			special_bits: SpecialBits::empty(),
		}
	}
}

impl<T: ElementOps + 'static> DynCallbacks<T> {
	/// Builds a callback table from up to three overrides, where any
	/// omitted slot falls back to `T`'s own [`ElementOps`] implementation.
	/// `special_bits` records which slots were left absent this way, so a
	/// caller can later tell a genuinely custom table from one that's
	/// mostly standard behavior with one slot overridden.
	pub fn new_partial(
		equals: Option<Box<dyn Fn(&T, &T) -> bool + Send + Sync>>,
		hash_value: Option<Box<dyn Fn(&T) -> u64 + Send + Sync>>,
		describe: Option<Box<dyn Fn(&T) -> String + Send + Sync>>,
	) -> Self {
		let mut special_bits = SpecialBits::empty();
		let equals = equals.unwrap_or_else(|| {
			special_bits |= SpecialBits::EQUALS_DEFAULTED;
			Box::new(|a: &T, b: &T| a.equals(b))
		});
		let hash_value = hash_value.unwrap_or_else(|| {
			special_bits |= SpecialBits::HASH_VALUE_DEFAULTED;
			Box::new(|a: &T| a.hash_value())
		});
		let describe = describe.unwrap_or_else(|| {
			special_bits |= SpecialBits::DESCRIBE_DEFAULTED;
			Box::new(|a: &T| a.describe())
		});
		Self { equals, hash_value, describe, special_bits }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn value_impl_hashes_and_equates_by_value() {
		assert!(ElementOps::equals(&5i32, &5));
		assert!(!ElementOps::equals(&5i32, &6));
		assert_eq!(ElementOps::hash_value(&5i32), ElementOps::hash_value(&5i32));
	}

	#[test]
	fn dyn_callbacks_override_equality() {
		// Case-insensitive string equality, a case the value impl can't
		// express.
		let cb: DynCallbacks<String> = DynCallbacks::new(
			|a, b| a.to_lowercase() == b.to_lowercase(),
			|a| {
				let mut h = default_hasher();
				a.to_lowercase().hash(&mut h);
				h.finish()
			},
			|a| a.clone(),
		);
		assert!((cb.equals)(&"Foo".to_string(), &"foo".to_string()));
		assert_eq!((cb.hash_value)(&"Foo".to_string()), (cb.hash_value)(&"foo".to_string()));
	}

	#[test]
	fn new_partial_records_which_slots_fell_back_to_element_ops() {
		let cb: DynCallbacks<i32> = DynCallbacks::new_partial(
			Some(Box::new(|a: &i32, b: &i32| a == b)),
			None,
			None,
		);
		assert_eq!(
			cb.special_bits,
			SpecialBits::HASH_VALUE_DEFAULTED | SpecialBits::DESCRIBE_DEFAULTED
		);
		assert!((cb.equals)(&5, &5));
		assert_eq!((cb.hash_value)(&5), ElementOps::hash_value(&5));
		assert_eq!((cb.describe)(&5), ElementOps::describe(&5));
	}

	#[test]
	fn new_leaves_special_bits_empty() {
		let cb: DynCallbacks<i32> = DynCallbacks::new(|a, b| a == b, |a| *a as u64, |a| a.to_string());
		assert!(cb.special_bits.is_empty());
	}
}
