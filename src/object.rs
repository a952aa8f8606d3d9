//! [`Handle`]: the object-runtime-managed smart pointer.
//!
//! Grounded on `rust-objc`'s `Retained<T>` (strong reference, `Clone` =
//! retain, `Drop` = release, `Deref` to `&T`), rewired onto this crate's own
//! [`crate::header::ObjectHeader`] instead of the Objective-C runtime. Any
//! [`crate::registry::RuntimeType`] can be wrapped: container façades use it
//! for their own lifecycle (object header backs every container, per
//! a hash engine instance), and callers may use it for element types that want
//! runtime-managed (`ElementOps`-"strong") semantics.

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::header::ObjectHeader;
use crate::registry::{self, RuntimeType, TypeId};

struct Managed<T> {
	header: ObjectHeader,
	value: T,
}

/// A strong, retain-counted reference to a `T`.
///
/// Unlike `Arc<T>`, there is no `get_mut` via uniqueness check baked into
/// the pointer itself — callers needing exclusive mutable access go through
/// the container façade's own `&mut self` methods before ever wrapping the
/// value in a `Handle`, or via [`Handle::get_mut`] which mirrors
/// `Arc::get_mut`'s "only if uniquely referenced" contract.
pub struct Handle<T: RuntimeType> {
	ptr: NonNull<Managed<T>>,
}

unsafe impl<T: RuntimeType + Sync + Send> Send for Handle<T> {}
unsafe impl<T: RuntimeType + Sync + Send> Sync for Handle<T> {}

impl<T: RuntimeType> Handle<T> {
	pub fn new(value: T) -> Self {
		let type_id = registry::type_id::<T>();
		let boxed = Box::new(Managed {
			header: ObjectHeader::new(type_id, false),
			value,
		});
		log::trace!(target: "object", "created {:?} instance", type_id);
		Self {
			ptr: NonNull::new(Box::into_raw(boxed)).expect("Box::into_raw is never null"),
		}
	}

	fn header(&self) -> &ObjectHeader {
		unsafe { &self.ptr.as_ref().header }
	}

	pub fn type_id(&self) -> TypeId {
		self.header().type_id()
	}

	pub fn retain_count(&self) -> u32 {
		self.header().refcount()
	}

	pub fn is_immutable(&self) -> bool {
		self.header().is_immutable()
	}

	pub fn make_immutable(&self) {
		self.header().make_immutable();
	}

	/// Attempts a retain that fails instead of racing a concurrent
	/// teardown; mirrors `Clone` but surfaces the deallocating case rather
	/// than asserting on it.
	pub fn try_clone(&self) -> Option<Self> {
		self.header().try_retain().ok()?;
		Some(Self { ptr: self.ptr })
	}

	/// Returns a mutable reference if this is the only `Handle` to the
	/// value (refcount observed as 1) and it has not been frozen.
	pub fn get_mut(&mut self) -> Option<&mut T> {
		if self.retain_count() == 1 && !self.is_immutable() {
			Some(unsafe { &mut self.ptr.as_mut().value })
		} else {
			None
		}
	}
}

impl<T: RuntimeType> Clone for Handle<T> {
	fn clone(&self) -> Self {
		self.header()
			.retain()
			.expect("retain on a bogus-object header");
		Self { ptr: self.ptr }
	}
}

impl<T: RuntimeType> Deref for Handle<T> {
	type Target = T;

	fn deref(&self) -> &T {
		unsafe { &self.ptr.as_ref().value }
	}
}

impl<T: RuntimeType> Drop for Handle<T> {
	fn drop(&mut self) {
		let header = self.header();
		if !header.release_returning_should_deallocate() {
			return;
		}
		let descriptor = registry::descriptor(header.type_id());
		let value_ptr = unsafe { &mut (*self.ptr.as_ptr()).value as *mut T as *mut () };
		if descriptor.flags.contains(crate::registry::TypeFlags::RESOURCEFUL) {
			(descriptor.reclaim)(value_ptr);
		}
		(descriptor.finalize)(value_ptr);
		if header.clear_deallocating_if_resurrected() {
			log::trace!(target: "object", "{:?} resurrected during finalize; retry", header.type_id());
			// The object lives again; this `Handle` still owns one strong
			// reference to it (the one that triggered teardown), so simply
			// stop here instead of freeing the storage.
			return;
		}
		log::trace!(target: "object", "deallocating {:?} instance", header.type_id());
		unsafe {
			drop(Box::from_raw(self.ptr.as_ptr()));
		}
	}
}

impl<T: RuntimeType + fmt::Debug> fmt::Debug for Handle<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&**self, f)
	}
}

impl<T: RuntimeType + PartialEq> PartialEq for Handle<T> {
	fn eq(&self, other: &Self) -> bool {
		**self == **other
	}
}
impl<T: RuntimeType + Eq> Eq for Handle<T> {}

impl<T: RuntimeType + std::hash::Hash> std::hash::Hash for Handle<T> {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		(**self).hash(state)
	}
}

/// `Handle<T>` is the "strong element" case of `ElementOps`: `Clone` is the
/// retain, `Drop` is the release, and equate/hash/describe delegate to the
/// wrapped value — the object runtime backs the element's lifecycle instead
/// of a value-identity default.
impl<T: RuntimeType + PartialEq + std::hash::Hash> crate::callbacks::ElementOps for Handle<T> {
	fn equals(&self, other: &Self) -> bool {
		**self == **other
	}
	fn hash_value(&self) -> u64 {
		use std::hash::Hasher;
		let mut hasher = crate::callbacks::default_hasher();
		(**self).hash(&mut hasher);
		hasher.finish()
	}
	fn describe(&self) -> String {
		RuntimeType::describe(&**self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::Cell;
	use std::rc::Rc;

	struct Counted(Rc<Cell<u32>>);
	impl RuntimeType for Counted {
		const NAME: &'static str = "Counted";
		fn finalize(&mut self) {
			self.0.set(self.0.get() + 1);
		}
	}

	#[test]
	fn retain_then_release_leaves_the_count_unchanged() {
		let h = Handle::new(Counted(Rc::new(Cell::new(0))));
		assert_eq!(h.retain_count(), 1);
		let h2 = h.clone();
		assert_eq!(h.retain_count(), 2);
		drop(h2);
        assert_eq!(h.retain_count(), 1);
	}

	#[test]
	fn final_release_runs_finalize_exactly_once() {
		let finalized = Rc::new(Cell::new(0));
		let h = Handle::new(Counted(finalized.clone()));
		let h2 = h.clone();
		drop(h);
		assert_eq!(finalized.get(), 0);
		drop(h2);
		assert_eq!(finalized.get(), 1);
	}

	#[test]
	fn get_mut_requires_unique_ownership() {
		let mut h = Handle::new(Counted(Rc::new(Cell::new(0))));
		assert!(h.get_mut().is_some());
		let h2 = h.clone();
		assert!(h.get_mut().is_none());
		drop(h2);
		assert!(h.get_mut().is_some());
	}

	#[test]
	fn get_mut_refuses_once_frozen() {
		let mut h = Handle::new(Counted(Rc::new(Cell::new(0))));
		h.make_immutable();
		assert!(h.get_mut().is_none());
	}
}
