//! Type descriptors and the process-wide type registry.
//!
//! Every managed object ([`crate::object::Handle`]) carries a dense,
//! non-zero type-id in its header. The registry hands those ids out, keeps
//! the per-type operation set (init/finalize/reclaim/describe/equate/hash)
//! that [`crate::object`] consults on retain/release, and is guarded by a
//! single lock used only at registration: lookups read an append-only,
//! leaked snapshot so they never block a concurrent registration (mirrors
//! "an old table is leaked if reallocated so that concurrent
//! readers stay valid" index-growth discipline, generalized from an mmap
//! index to a `Vec<TypeDescriptor>` snapshot).

use std::fmt;
use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};
use parking_lot::Mutex;

bitflags::bitflags! {
	/// Feature bits carried by a type's version word.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct TypeFlags: u8 {
		/// Instances of this type are allocated under a tracing (scanning)
		/// allocator; `create_instance` may skip zero-filling.
		const TRACING_AWARE   = 0b001;
		/// The type manages its own refcount field rather than the header's.
		const CUSTOM_REFCOUNT = 0b010;
		/// The type owns external resources that must be released on the
		/// 1→0 transition, strictly before the deallocating bit is set.
		const RESOURCEFUL     = 0b100;
	}
}

/// Dense, non-zero identifier for a registered type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub(crate) u32);

/// Sentinel meaning "not a type" — never returned by registration.
pub const NOT_A_TYPE: TypeId = TypeId(0);
/// The generic root type; every operation on it aborts.
pub const ANY_TYPE: TypeId = TypeId(1);

impl fmt::Debug for TypeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TypeId({})", self.0)
	}
}

impl fmt::Display for TypeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

impl TypeId {
	pub fn as_u32(self) -> u32 {
		self.0
	}
}

/// A registered class: a name, a feature-flag word, and the operations the
/// object runtime invokes on instances of it.
pub struct TypeDescriptor {
	pub name: &'static str,
	pub flags: TypeFlags,
	pub(crate) finalize: fn(*mut ()),
	pub(crate) reclaim: fn(*mut ()),
	pub(crate) describe: fn(*const ()) -> String,
}

fn abort_finalize(_: *mut ()) {
	panic!("finalize invoked on the generic any-type root");
}
fn abort_reclaim(_: *mut ()) {
	panic!("reclaim invoked on the generic any-type root");
}
fn abort_describe(_: *const ()) -> String {
	panic!("describe invoked on the generic any-type root");
}

/// Types that can be wrapped in a [`crate::object::Handle`] and whose
/// lifecycle the object runtime manages.
///
/// Default method bodies are no-ops: a type opts into tracing-awareness,
/// custom finalization, or last-reference reclaim only by overriding the
/// corresponding flag/method.
pub trait RuntimeType: Sized + 'static {
	/// Display name used in diagnostics; need not be unique per
	/// monomorphization.
	const NAME: &'static str;
	const TRACING_AWARE: bool = false;
	const RESOURCEFUL: bool = false;

	/// Runs once, strictly before the deallocating bit is observable by
	/// other threads, when refcount transitions from 1 to 0.
	fn finalize(&mut self) {}

	/// Runs once, strictly before `finalize`, only if `RESOURCEFUL`.
	fn reclaim(&mut self) {}

	fn describe(&self) -> String {
		format!("<{}>", Self::NAME)
	}
}

/// Process-wide registry. Registration is append-only and guarded by
/// `write_lock`; lookups are unsynchronized reads of the current snapshot
/// pointer.
pub struct TypeRegistry {
	write_lock: Mutex<()>,
	snapshot: AtomicPtr<Vec<TypeDescriptor>>,
	next_id: AtomicU32,
}

static REGISTRY: TypeRegistry = TypeRegistry::new();

impl TypeRegistry {
	const fn new() -> Self {
		Self {
			write_lock: Mutex::new(()),
			snapshot: AtomicPtr::new(std::ptr::null_mut()),
			next_id: AtomicU32::new(2), // 0 and 1 are reserved
		}
	}

	fn bootstrap() -> *mut Vec<TypeDescriptor> {
		let sentinels = vec![
			TypeDescriptor {
				name: "NotAType",
				flags: TypeFlags::empty(),
				finalize: abort_finalize,
				reclaim: abort_reclaim,
				describe: abort_describe,
			},
			TypeDescriptor {
				name: "AnyType",
				flags: TypeFlags::empty(),
				finalize: abort_finalize,
				reclaim: abort_reclaim,
				describe: abort_describe,
			},
		];
		Box::into_raw(Box::new(sentinels))
	}

	fn current(&self) -> &'static Vec<TypeDescriptor> {
		loop {
			let ptr = self.snapshot.load(Ordering::Acquire);
			if let Some(v) = unsafe { ptr.as_ref() } {
				return v;
			}
			// First reader (or a race of first readers) installs the
			// bootstrap snapshot.
			let fresh = Self::bootstrap();
			if self
				.snapshot
				.compare_exchange(std::ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire)
				.is_err()
			{
				// Someone beat us to it; don't leak our own attempt twice.
				unsafe { drop(Box::from_raw(fresh)) };
			}
		}
	}

	/// Registers a new type descriptor, returning its dense id.
	///
	/// Intended to be called once per concrete `T` via [`type_id`]'s
	/// per-monomorphization memoization, never directly in a hot path.
	fn register(&self, desc: TypeDescriptor) -> TypeId {
		let _guard = self.write_lock.lock();
		let current = self.current();
		let mut next = Vec::with_capacity(current.len() + 1);
		// `TypeDescriptor` isn't `Clone` (function pointers are, but let's
		// keep this honest): rebuild by copying fields, which are all Copy
		// or `&'static str`.
		for d in current.iter() {
			next.push(TypeDescriptor {
				name: d.name,
				flags: d.flags,
				finalize: d.finalize,
				reclaim: d.reclaim,
				describe: d.describe,
			});
		}
		let id = TypeId(self.next_id.fetch_add(1, Ordering::Relaxed));
		next.push(desc);
		let leaked = Box::into_raw(Box::new(next));
		// The old snapshot is intentionally leaked: concurrent readers may
		// still hold a `&'static` reference to it.
		self.snapshot.store(leaked, Ordering::Release);
		log::trace!(target: "registry", "registered type {:?} as {:?}", id, self.descriptor(id).name);
		id
	}

	pub fn descriptor(&self, id: TypeId) -> &'static TypeDescriptor {
		let table = self.current();
		table
			.get(id.0 as usize)
			.unwrap_or_else(|| panic!("type {:?} is not registered", id))
	}

	pub fn name_of(&self, id: TypeId) -> &'static str {
		self.descriptor(id).name
	}
}

/// Returns the dense type-id for `T`, registering it on first use.
///
/// Each monomorphization of this function owns its own `static`, so the
/// memoization is naturally per-`T` without a keyed lookup on the hot path.
pub fn type_id<T: RuntimeType>() -> TypeId {
	static CELL: std::sync::OnceLock<TypeId> = std::sync::OnceLock::new();
	*CELL.get_or_init(|| {
		REGISTRY.register(TypeDescriptor {
			name: T::NAME,
			flags: {
				let mut f = TypeFlags::empty();
				if T::TRACING_AWARE {
					f |= TypeFlags::TRACING_AWARE;
				}
				if T::RESOURCEFUL {
					f |= TypeFlags::RESOURCEFUL;
				}
				f
			},
			finalize: |p| unsafe { (*(p as *mut T)).finalize() },
			reclaim: |p| unsafe { (*(p as *mut T)).reclaim() },
			describe: |p| unsafe { (*(p as *const T)).describe() },
		})
	})
}

pub fn descriptor(id: TypeId) -> &'static TypeDescriptor {
	REGISTRY.descriptor(id)
}

pub fn name_of(id: TypeId) -> &'static str {
	REGISTRY.name_of(id)
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Foo;
	impl RuntimeType for Foo {
		const NAME: &'static str = "Foo";
	}

	struct Bar;
	impl RuntimeType for Bar {
		const NAME: &'static str = "Bar";
		const RESOURCEFUL: bool = true;
	}

	#[test]
	fn distinct_types_get_distinct_dense_ids() {
		let foo = type_id::<Foo>();
		let bar = type_id::<Bar>();
		assert_ne!(foo, bar);
		assert!(foo.as_u32() >= 2);
		assert!(bar.as_u32() >= 2);
	}

	#[test]
	fn repeated_lookup_is_stable() {
		let a = type_id::<Foo>();
		let b = type_id::<Foo>();
		assert_eq!(a, b);
	}

	#[test]
	fn reserved_ids_are_distinct_from_registered_ones() {
		let foo = type_id::<Foo>();
		assert_ne!(foo, NOT_A_TYPE);
		assert_ne!(foo, ANY_TYPE);
	}

	#[test]
	fn flags_round_trip_through_the_descriptor() {
		let bar = type_id::<Bar>();
		assert!(descriptor(bar).flags.contains(TypeFlags::RESOURCEFUL));
	}
}
