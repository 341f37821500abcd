//! Registry trait for self-registering implementations.
//!
//! Every pluggable collaborator implementation (storage backend, chain RPC,
//! block explorer) exposes a `Registry` struct implementing this trait so the
//! service binary can wire it by configuration name.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example "memory" for `storage.implementations.memory`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
