use std::collections::BTreeMap;
use std::sync::Arc;

use error_stack::{report, Result};

use crate::library::{Address, NativeLibrary};
use crate::memory::Value;
use crate::types::{Convention, TypeDescriptor};

/// Resolved signature of a native function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub params: Vec<TypeDescriptor>,
    pub ret: TypeDescriptor,
    pub convention: Convention,
}

impl std::fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.ret)?;
        if self.convention != Convention::Default {
            write!(f, " [{}]", self.convention)?;
        }
        Ok(())
    }
}

/// Failure to build an invoker for one library
#[derive(Debug, thiserror::Error)]
pub enum InvokerError {
    #[error("Function '{symbol}' not found in [{library}]")]
    NotFound { symbol: String, library: String },
    #[error("{0}")]
    Other(String),
}

impl InvokerError {
    /// Load errors let the search move on to the next library
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Expected {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("{0}")]
    Native(String),
}

/// Performs native calls to one function
pub trait Invoker: Send + Sync + std::fmt::Debug {
    fn address(&self) -> Address;
    fn invoke(&self, args: &[Value]) -> Result<Value, InvokeError>;
}

/// Bridge that turns a symbol and a resolved signature into an [`Invoker`]
pub trait InvokerBuilder: Send + Sync {
    /// `enums` is the flat symbol to value map of the declaring scope, for
    /// translating enum symbols passed as arguments
    fn build_invoker(
        &self,
        library: &Arc<dyn NativeLibrary>,
        symbol: &str,
        signature: &FunctionSignature,
        enums: &BTreeMap<String, i64>,
    ) -> Result<Arc<dyn Invoker>, InvokerError>;
}

/// Find `symbol` in `library`, or fail with a load error
pub fn lookup_symbol(library: &dyn NativeLibrary, symbol: &str) -> Result<Address, InvokerError> {
    match library.find_symbol(symbol) {
        Some(address) if !address.is_null() => Ok(address),
        _ => Err(report!(InvokerError::NotFound {
            symbol: symbol.to_string(),
            library: library.display_name(),
        })),
    }
}
