//! Binding declared functions and variables to native symbols

mod function;
pub use function::*;
mod invoker;
pub use invoker::*;
mod variable;
pub use variable::*;

#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("Cannot resolve the types of `{0}`")]
    Type(String),
    #[error("Cannot attach function `{0}`")]
    Function(String),
    #[error("Cannot attach variable `{0}`")]
    Variable(String),
    #[error("Symbol `{name}` not found in [{}]", .libraries.join(", "))]
    NotFound { name: String, libraries: Vec<String> },
    #[error("No invoker builder is configured to attach functions")]
    NoInvokerBuilder,
}
