use std::ffi::c_void;
use std::sync::Arc;

use super::{Address, LibraryLoader, NativeLibrary, OpenError, OpenFlags};

/// Loader backed by the platform dynamic linker
#[derive(Debug, Default, Clone, Copy)]
pub struct DlLoader;

/// A library opened with [`DlLoader`]. Stays loaded as long as any binding holds it.
#[derive(Debug)]
pub struct DynamicLibrary {
    name: Option<String>,
    library: libloading::Library,
}

impl LibraryLoader for DlLoader {
    fn open(
        &self,
        name: Option<&str>,
        flags: OpenFlags,
    ) -> Result<Arc<dyn NativeLibrary>, OpenError> {
        let library = open_library(name, flags).map_err(|e| OpenError(e.to_string()))?;
        log::debug!(
            "Opened library {}",
            name.unwrap_or(super::CURRENT_PROCESS)
        );
        Ok(Arc::new(DynamicLibrary {
            name: name.map(str::to_string),
            library,
        }))
    }
}

impl NativeLibrary for DynamicLibrary {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn find_symbol(&self, symbol: &str) -> Option<Address> {
        // SAFETY: the symbol is only read as an address here, never dereferenced or called
        let found = unsafe { self.library.get::<*mut c_void>(symbol.as_bytes()) };
        match found {
            Ok(sym) => Some(Address::from(*sym)),
            Err(e) => {
                log::trace!("Symbol `{}` not in {}: {}", symbol, self.display_name(), e);
                None
            }
        }
    }
}

#[cfg(unix)]
fn open_library(
    name: Option<&str>,
    flags: OpenFlags,
) -> Result<libloading::Library, libloading::Error> {
    use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

    let mut mode = if flags.lazy { RTLD_LAZY } else { RTLD_NOW };
    mode |= if flags.global { RTLD_GLOBAL } else { RTLD_LOCAL };
    let library = match name {
        // SAFETY: initializers of the opened library run here, which the declaring program accepts
        Some(name) => unsafe { Library::open(Some(name), mode)? },
        None => Library::this(),
    };
    Ok(library.into())
}

#[cfg(windows)]
fn open_library(
    name: Option<&str>,
    _flags: OpenFlags,
) -> Result<libloading::Library, libloading::Error> {
    use libloading::os::windows::Library;

    let library = match name {
        // SAFETY: initializers of the opened library run here, which the declaring program accepts
        Some(name) => unsafe { Library::new(name)? },
        None => Library::this()?,
    };
    Ok(library.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_current_process() {
        let lib = DlLoader.open(None, OpenFlags::LAZY_LOCAL).unwrap();
        assert_eq!(lib.name(), None);
        assert_eq!(lib.display_name(), super::super::CURRENT_PROCESS);
    }

    #[test]
    fn missing_library_reports_cause() {
        let err = DlLoader
            .open(Some("libnativebind-does-not-exist.so"), OpenFlags::LAZY_LOCAL)
            .unwrap_err();
        assert!(!err.0.is_empty());
    }
}
