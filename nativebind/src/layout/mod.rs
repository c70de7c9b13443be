//! Struct and union layout

mod builder;
pub use builder::*;
mod spec;
pub use spec::*;
mod struct_class;
pub use struct_class::*;

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Layout of `{0}` is already computed")]
    AlreadyComputed(String),
    #[error("Size already set")]
    SizeAlreadySet,
    #[error("`{0}` has no layout and cannot be embedded")]
    Incomplete(String),
    #[error("Invalid layout: {0}")]
    Argument(String),
    #[error("Size of field `{0}` overflows")]
    Overflow(String),
    #[error("Cannot resolve type of field `{0}`")]
    FieldType(String),
}
