use std::collections::BTreeMap;
use std::sync::Arc;

use error_stack::{report, Result};
use nativebind::attach::{
    lookup_symbol, FunctionSignature, InvokeError, Invoker, InvokerBuilder, InvokerError,
};
use nativebind::library::{Address, NativeLibrary};
use nativebind::Value;

/// Invoker builder that only checks a function symbol is exported
///
/// Bindings made with it resolve like real ones, so a manifest can be
/// validated against the libraries on this machine, but they cannot be called.
#[derive(Debug, Default)]
pub struct SymbolProbe;

impl InvokerBuilder for SymbolProbe {
    fn build_invoker(
        &self,
        library: &Arc<dyn NativeLibrary>,
        symbol: &str,
        signature: &FunctionSignature,
        _enums: &BTreeMap<String, i64>,
    ) -> Result<Arc<dyn Invoker>, InvokerError> {
        let address = lookup_symbol(&**library, symbol)?;
        log::debug!(
            "Found `{}` in {} at {}",
            symbol,
            library.display_name(),
            address
        );
        Ok(Arc::new(ProbedSymbol {
            symbol: symbol.to_string(),
            address,
            signature: signature.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct ProbedSymbol {
    symbol: String,
    address: Address,
    signature: FunctionSignature,
}

impl Invoker for ProbedSymbol {
    fn address(&self) -> Address {
        self.address
    }

    fn invoke(&self, _args: &[Value]) -> Result<Value, InvokeError> {
        Err(report!(InvokeError::Native(format!(
            "`{}` {} was only probed and cannot be called",
            self.symbol, self.signature
        ))))
    }
}
