use std::sync::Arc;

/// Address of a native symbol or of native memory
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(usize);

impl Address {
    pub const NULL: Self = Self(0);

    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn offset(self, offset: usize) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Address(0x{:016x})", self.0)
    }
}

impl From<usize> for Address {
    fn from(address: usize) -> Self {
        Self(address)
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl<T> From<*const T> for Address {
    fn from(ptr: *const T) -> Self {
        Self(ptr as usize)
    }
}

impl<T> From<*mut T> for Address {
    fn from(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }
}

/// Flags for opening a library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Resolve symbols when first used instead of at load time
    pub lazy: bool,
    /// Make the library's symbols available to libraries loaded later
    pub global: bool,
}

impl OpenFlags {
    pub const LAZY_LOCAL: Self = Self {
        lazy: true,
        global: false,
    };
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::LAZY_LOCAL
    }
}

/// Why a library failed to open, as reported by the loader
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct OpenError(pub String);

/// An opened native library
pub trait NativeLibrary: Send + Sync + std::fmt::Debug {
    /// Name the library was opened with, `None` for the current process
    fn name(&self) -> Option<&str>;

    /// Address of an exported symbol, `None` if the library doesn't export it
    fn find_symbol(&self, symbol: &str) -> Option<Address>;

    /// Name for diagnostics
    fn display_name(&self) -> String {
        self.name()
            .map(str::to_string)
            .unwrap_or_else(|| super::CURRENT_PROCESS.to_string())
    }
}

/// Opens native libraries by name
pub trait LibraryLoader: Send + Sync {
    /// Open a library, or the hosting process itself when `name` is `None`
    fn open(
        &self,
        name: Option<&str>,
        flags: OpenFlags,
    ) -> std::result::Result<Arc<dyn NativeLibrary>, OpenError>;
}
