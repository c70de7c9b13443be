use std::path::PathBuf;
use std::sync::Arc;

use error_stack::{Result, ResultExt};
use nativebind::{Declared, Scope};

use crate::manifest::Manifest;
use crate::probe::SymbolProbe;
use crate::report::{Format, ScopeReport};

#[derive(Debug, Clone, clap::Parser)]
pub struct CheckCLI {
    /// (Optional) Path of the manifest.
    ///
    /// If not specified, `nativebind.yaml` is searched for in the current
    /// directory and its parents
    pub manifest: Option<String>,
    /// Also write the full report, including resolved addresses, to this path
    #[clap(short, long)]
    pub output: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load manifest")]
    Manifest,
    #[error("Declaration #{0} failed")]
    Declare(usize),
    #[error("Failed to write report")]
    Report,
}

/// Apply every declaration of a manifest, opening libraries and resolving
/// symbols on this machine
pub fn check(manifest: &Manifest) -> Result<Scope, Error> {
    let mut scope = Scope::new(&manifest.name).with_invoker_builder(Arc::new(SymbolProbe));
    let decls = manifest.declarations().change_context(Error::Manifest)?;
    for (i, decl) in decls.into_iter().enumerate() {
        let name = decl.name().map(str::to_string);
        let declared = scope.declare(decl).change_context(Error::Declare(i))?;
        if let Some(line) = summary(&scope, name.as_deref(), &declared) {
            println!("{}", line);
        }
    }
    Ok(scope)
}

/// One line for each declaration that touched native code
fn summary(scope: &Scope, name: Option<&str>, declared: &Declared) -> Option<String> {
    match declared {
        Declared::Libraries(names) => Some(format!("libraries: {}", names.join(", "))),
        Declared::Function(f) => Some(format!(
            "function {}{} = {} in {}",
            f.name(),
            f.signature(),
            f.address(),
            f.library().display_name()
        )),
        Declared::Variable(address) => {
            let name = name.unwrap_or_default();
            Some(match scope.variable(name) {
                Some(v) => format!(
                    "variable {}: {} = {} in {}",
                    name,
                    v.ty(),
                    address,
                    v.library().display_name()
                ),
                None => format!("variable {} = {}", name, address),
            })
        }
        _ => None,
    }
}

pub fn run_cli(cli: CheckCLI) -> Result<(), Error> {
    let path = Manifest::locate(cli.manifest.as_deref()).change_context(Error::Manifest)?;
    log::info!("Loading manifest from {}", path.display());
    let manifest = Manifest::load(&path).change_context(Error::Manifest)?;
    let scope = check(&manifest)?;
    if let Some(output) = cli.output.map(PathBuf::from) {
        ScopeReport::new(&scope)
            .write(Some(&output), Format::from_path(&output))
            .change_context(Error::Report)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativebind::library::{Address, LibraryLoader, NativeLibrary, OpenError, OpenFlags};
    use nativebind::{Declaration, VariableDecl};

    #[test]
    fn missing_symbol_fails() {
        let manifest = Manifest::parse(
            "name: x\nlibraries: [current_process]\ndeclarations:\n  - function: [nativebind_missing_fn, [], void]\n",
        )
        .unwrap();
        let err = check(&manifest).unwrap_err();
        assert!(matches!(err.current_context(), Error::Declare(1)));
        assert!(err.contains::<nativebind::AttachError>());
    }

    /// Exports one symbol at a fixed address
    #[derive(Debug)]
    struct OneSymbol(Address);

    impl NativeLibrary for OneSymbol {
        fn name(&self) -> Option<&str> {
            Some("libcounter.so")
        }

        fn find_symbol(&self, symbol: &str) -> Option<Address> {
            (symbol == "counter").then_some(self.0)
        }
    }

    impl LibraryLoader for OneSymbol {
        fn open(
            &self,
            _name: Option<&str>,
            _flags: OpenFlags,
        ) -> std::result::Result<Arc<dyn NativeLibrary>, OpenError> {
            Ok(Arc::new(OneSymbol(self.0)))
        }
    }

    #[test]
    fn variable_line_names_the_variable() {
        let mut value = Box::new(0i32);
        let address = Address::from(&mut *value as *mut i32);
        let mut scope = Scope::new("x").with_loader(Arc::new(OneSymbol(address)));
        scope.declare_libraries(["counter"]).unwrap();
        let decl = Declaration::Variable(VariableDecl::new("counter", "int"));
        let declared = scope.declare(decl).unwrap();

        let line = summary(&scope, Some("counter"), &declared).unwrap();
        assert_eq!(
            line,
            format!("variable counter: int32 = {} in libcounter.so", address)
        );
        assert!(summary(&scope, None, &Declared::Convention(Default::default())).is_none());
    }

    #[test]
    fn undeclared_libraries_fail() {
        let manifest =
            Manifest::parse("name: x\ndeclarations:\n  - function: [getpid, [], int]\n").unwrap();
        let err = check(&manifest).unwrap_err();
        assert!(matches!(err.current_context(), Error::Declare(0)));
    }
}
