//! Hotfix core
//!
//! Shared building blocks of the hotfix engine: the value model handed between the
//! interpreter and the host, type signatures, the read-only symbol registry, per-type
//! method tables and the redirector that retargets their entries at runtime.

#[macro_use]
pub mod macros;

pub mod error;
pub mod method;
pub mod redirect;
pub mod span;
pub mod symbols;
pub mod ty;
pub mod value;

// Re-export commonly used items for convenience
pub use tracing;

pub use error::{Error, ErrorKind};
pub use method::{EntryAddr, MethodSlot, TypeDescriptor, TypeDescriptorBuilder};
pub use redirect::PatchHandle;
pub use span::Span;
pub use symbols::{Exports, SymbolTable};
pub use ty::{FloatTy, IntTy, Signature, Ty};
pub use value::{
    Args, Callable, Function, HostValue, NativeFunction, StructSchema, StructValue, TypeToken,
    Value,
};

pub type Result<T> = error::Result<T>;
