use std::collections::BTreeMap;
use std::sync::Arc;

use error_stack::{report, Report, Result, ResultExt};

use crate::library::{Address, LibrarySet, NativeLibrary};
use crate::memory::Value;
use crate::types::{Convention, Resolver, TypeRef};

use super::{AttachError, FunctionSignature, InvokeError, Invoker, InvokerBuilder, InvokerError};

/// A native function to attach
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Name the binding is exposed under
    pub name: String,
    /// Symbol in the library, defaults to `name`
    pub native_name: Option<String>,
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

impl FunctionDecl {
    pub fn new(
        name: impl Into<String>,
        params: impl IntoIterator<Item = impl Into<TypeRef>>,
        ret: impl Into<TypeRef>,
    ) -> Self {
        Self {
            name: name.into(),
            native_name: None,
            params: params.into_iter().map(Into::into).collect(),
            ret: ret.into(),
        }
    }

    pub fn with_native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = Some(native_name.into());
        self
    }

    pub fn symbol(&self) -> &str {
        self.native_name.as_deref().unwrap_or(&self.name)
    }
}

/// A function attached to a scope
#[derive(Debug, Clone)]
pub struct FunctionBinding {
    name: String,
    symbol: String,
    signature: FunctionSignature,
    library: Arc<dyn NativeLibrary>,
    invoker: Arc<dyn Invoker>,
}

impl FunctionBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    /// The library the invoker was built against
    pub fn library(&self) -> &Arc<dyn NativeLibrary> {
        &self.library
    }

    pub fn address(&self) -> Address {
        self.invoker.address()
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, InvokeError> {
        if args.len() != self.signature.params.len() {
            return Err(report!(InvokeError::Arity {
                expected: self.signature.params.len(),
                got: args.len(),
            }))
            .attach_printable_lazy(|| format!("Calling `{}`", self.name));
        }
        self.invoker.invoke(args)
    }
}

/// Resolve the signature of `decl` and build an invoker from the first library that has it
///
/// Libraries are tried in order. A library that doesn't have the symbol is
/// skipped, but any other failure stops the search. If no library has the
/// symbol, the error is the one from the first library.
pub fn attach_function(
    decl: &FunctionDecl,
    resolver: &Resolver,
    convention: Convention,
    libraries: &LibrarySet,
    builder: &dyn InvokerBuilder,
    enums: &BTreeMap<String, i64>,
) -> Result<FunctionBinding, AttachError> {
    let params = decl
        .params
        .iter()
        .map(|p| resolver.resolve(p))
        .collect::<Result<Vec<_>, _>>()
        .change_context_lazy(|| AttachError::Type(decl.name.clone()))?;
    let ret = resolver
        .resolve(&decl.ret)
        .change_context_lazy(|| AttachError::Type(decl.name.clone()))?;
    let signature = FunctionSignature {
        params,
        ret,
        convention,
    };
    let symbol = decl.symbol();

    let mut first_error: Option<Report<InvokerError>> = None;
    for library in libraries.iter() {
        log::debug!(
            "Looking for function `{}` in {}",
            symbol,
            library.display_name()
        );
        match builder.build_invoker(library, symbol, &signature, enums) {
            Ok(invoker) => {
                log::debug!(
                    "Attached `{}` {} at {}",
                    decl.name,
                    signature,
                    invoker.address()
                );
                return Ok(FunctionBinding {
                    name: decl.name.clone(),
                    symbol: symbol.to_string(),
                    signature,
                    library: library.clone(),
                    invoker,
                });
            }
            Err(e) if e.current_context().is_load_error() => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => return Err(e.change_context(AttachError::Function(decl.name.clone()))),
        }
    }
    match first_error {
        Some(e) => Err(e.change_context(AttachError::Function(decl.name.clone()))),
        None => Err(report!(AttachError::NotFound {
            name: symbol.to_string(),
            libraries: libraries.names(),
        })),
    }
}
