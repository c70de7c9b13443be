//! Declaring bindings to native code
//!
//! A [`Scope`] resolves symbolic type names against its own registry, its
//! parents and the native base type table, opens the libraries it declares,
//! attaches functions and global variables found in them and computes the
//! memory layout of structs and unions.
//!
//! The dynamic linker, the invoker that performs native calls and the base
//! type table are behind traits ([`LibraryLoader`], [`InvokerBuilder`] and
//! [`BaseTypes`]) so a scope can be set up against other implementations.

pub mod attach;
pub mod decl;
pub mod layout;
pub mod library;
pub mod memory;
mod scope;
pub use scope::*;
pub mod types;

pub use attach::{
    AttachError, FunctionBinding, FunctionDecl, InvokerBuilder, VariableBinding, VariableDecl,
};
pub use decl::{DeclArg, DeclError, Declaration, Declared};
pub use layout::{LayoutError, LayoutSpec, StructClass, StructLayout};
pub use library::{LibraryError, LibraryLoader, LibraryName, LibrarySet};
pub use memory::{MemoryError, StructRef, Value};
pub use types::{BaseTypes, Convention, TypeDescriptor, TypeError, TypeRef};
