/// Error type for the recoverable subset of the kernel's failure modes.
///
/// Most invariant violations (invalid argument, type mismatch, bogus-object,
/// uninitialized runtime) are not represented here: they halt the process via
/// `assert!`/`panic!` at the point of detection, per the fail-fast design in
/// a hash engine instance This enum only covers outcomes a caller can recover from.
#[derive(Debug, derive_more::Display, derive_more::From)]
pub enum Error {
	/// Allocation failed while creating a new instance.
	#[display(fmt = "allocation failed")]
	AllocationFailed,

	/// The given type-id has no registered descriptor.
	#[display(fmt = "type {} is not registered", _0)]
	TypeNotRegistered(crate::registry::TypeId),

	/// A foreign (bridged) class was requested but none is registered for
	/// the type-id.
	#[display(fmt = "no foreign class registered for type {}", _0)]
	#[from(ignore)]
	NoForeignClass(crate::registry::TypeId),
}

impl std::error::Error for Error {}
