#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use error_stack::{report, Result};
use nativebind::attach::{
    lookup_symbol, FunctionSignature, InvokeError, Invoker, InvokerBuilder, InvokerError,
};
use nativebind::library::{Address, LibraryLoader, NativeLibrary, OpenError, OpenFlags, Platform};
use nativebind::{Scope, Value};

/// Loader over in-memory libraries, recording every name it was asked to open
#[derive(Debug, Default)]
pub struct FakeLoader {
    libraries: BTreeMap<String, BTreeMap<String, Address>>,
    process: BTreeMap<String, Address>,
    pub opened: Mutex<Vec<String>>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, name: &str, symbols: &[(&str, usize)]) -> Self {
        self.libraries.insert(name.to_string(), symbol_map(symbols));
        self
    }

    pub fn with_process_symbols(mut self, symbols: &[(&str, usize)]) -> Self {
        self.process = symbol_map(symbols);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

fn symbol_map(symbols: &[(&str, usize)]) -> BTreeMap<String, Address> {
    symbols
        .iter()
        .map(|(name, address)| (name.to_string(), Address::from(*address)))
        .collect()
}

impl LibraryLoader for FakeLoader {
    fn open(
        &self,
        name: Option<&str>,
        _flags: OpenFlags,
    ) -> std::result::Result<Arc<dyn NativeLibrary>, OpenError> {
        let Some(name) = name else {
            return Ok(Arc::new(FakeLibrary {
                name: None,
                symbols: self.process.clone(),
            }));
        };
        self.opened.lock().unwrap().push(name.to_string());
        match self.libraries.get(name) {
            Some(symbols) => Ok(Arc::new(FakeLibrary {
                name: Some(name.to_string()),
                symbols: symbols.clone(),
            })),
            None => Err(OpenError(format!(
                "{}: cannot open shared object file: No such file or directory",
                name
            ))),
        }
    }
}

#[derive(Debug)]
pub struct FakeLibrary {
    name: Option<String>,
    symbols: BTreeMap<String, Address>,
}

impl NativeLibrary for FakeLibrary {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn find_symbol(&self, symbol: &str) -> Option<Address> {
        self.symbols.get(symbol).copied()
    }
}

/// Builds invokers that echo their arguments, recording which libraries were consulted
#[derive(Debug, Default)]
pub struct FakeInvokerBuilder {
    /// Libraries where building fails with a non-load error
    pub broken: Vec<String>,
    pub consulted: Mutex<Vec<String>>,
    /// Enum map passed with the latest build
    pub enums: Mutex<BTreeMap<String, i64>>,
}

impl FakeInvokerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken_in(library: &str) -> Self {
        Self {
            broken: vec![library.to_string()],
            ..Self::default()
        }
    }

    pub fn consulted(&self) -> Vec<String> {
        self.consulted.lock().unwrap().clone()
    }

    pub fn enums(&self) -> BTreeMap<String, i64> {
        self.enums.lock().unwrap().clone()
    }
}

impl InvokerBuilder for FakeInvokerBuilder {
    fn build_invoker(
        &self,
        library: &Arc<dyn NativeLibrary>,
        symbol: &str,
        signature: &FunctionSignature,
        enums: &BTreeMap<String, i64>,
    ) -> Result<Arc<dyn Invoker>, InvokerError> {
        *self.enums.lock().unwrap() = enums.clone();
        let name = library.display_name();
        self.consulted.lock().unwrap().push(name.clone());
        if self.broken.contains(&name) {
            return Err(report!(InvokerError::Other(format!(
                "unsupported signature {}",
                signature
            ))));
        }
        let address = lookup_symbol(&**library, symbol)?;
        Ok(Arc::new(EchoInvoker { address }))
    }
}

#[derive(Debug)]
pub struct EchoInvoker {
    address: Address,
}

impl Invoker for EchoInvoker {
    fn address(&self) -> Address {
        self.address
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, InvokeError> {
        Ok(args.first().cloned().unwrap_or(Value::Void))
    }
}

/// A scope wired to fakes, on Linux naming rules
pub fn scope(loader: FakeLoader, invokers: FakeInvokerBuilder) -> (Scope, Arc<FakeLoader>, Arc<FakeInvokerBuilder>) {
    let loader = Arc::new(loader);
    let invokers = Arc::new(invokers);
    let scope = Scope::new("test")
        .with_loader(loader.clone())
        .with_invoker_builder(invokers.clone())
        .with_platform(Platform::LINUX);
    (scope, loader, invokers)
}
