//! Native type descriptors, the per-scope type registry and the resolver

mod base_table;
pub use base_table::*;
mod descriptor;
pub use descriptor::*;
mod enums;
pub use enums::*;
mod registry;
pub use registry::*;
mod resolve;
pub use resolve::*;
mod type_error;
pub use type_error::*;
mod type_prim;
pub use type_prim::*;
mod type_ref;
pub use type_ref::*;
