//! Turning declared library names into opened native libraries

use std::sync::Arc;

use error_stack::{report, Result};

mod dl;
pub use dl::*;
mod loader;
pub use loader::*;
mod platform;
pub use platform::*;

/// Display name of the hosting process when used as a library
pub const CURRENT_PROCESS: &str = "[current process]";

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// Every candidate failed, the message is all causes joined
    #[error("{0}")]
    Load(String),
    #[error("no library specified")]
    NotDeclared,
}

/// One logical library in a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryName {
    /// Bind against the hosting process itself
    CurrentProcess,
    Name(String),
    /// Alternative names for the same library, tried in order
    Alternatives(Vec<String>),
}

impl LibraryName {
    fn names(&self) -> Vec<&str> {
        match self {
            Self::CurrentProcess => Vec::new(),
            Self::Name(n) => vec![n.as_str()],
            Self::Alternatives(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for LibraryName {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for LibraryName {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Vec<&str>> for LibraryName {
    fn from(names: Vec<&str>) -> Self {
        Self::Alternatives(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for LibraryName {
    fn from(names: [&str; N]) -> Self {
        Self::Alternatives(names.into_iter().map(str::to_string).collect())
    }
}

impl std::fmt::Display for LibraryName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LibraryName::CurrentProcess => write!(f, "{}", CURRENT_PROCESS),
            LibraryName::Name(n) => write!(f, "{}", n),
            LibraryName::Alternatives(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

/// A concrete candidate that failed to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub candidate: String,
    pub cause: String,
}

/// Opened libraries of a scope, in declaration order
#[derive(Debug, Clone, Default)]
pub struct LibrarySet {
    libraries: Vec<Arc<dyn NativeLibrary>>,
    failures: Vec<LoadFailure>,
}

impl LibrarySet {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn NativeLibrary>> {
        self.libraries.iter()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn NativeLibrary>> {
        self.libraries.get(index)
    }

    pub fn names(&self) -> Vec<String> {
        self.libraries.iter().map(|l| l.display_name()).collect()
    }

    /// Logical libraries that were skipped because none of their candidates opened
    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }
}

/// Open every logical library in `candidates`
///
/// For each logical library the candidates are tried in order and the first
/// one that opens is kept. A logical library that cannot be opened at all is
/// skipped with its causes recorded. Only when nothing could be opened is
/// this an error, and the error message then carries every cause.
pub fn resolve_libraries(
    candidates: &[LibraryName],
    loader: &dyn LibraryLoader,
    platform: &Platform,
) -> Result<LibrarySet, LibraryError> {
    if candidates.is_empty() {
        return Err(report!(LibraryError::NotDeclared));
    }
    let mut set = LibrarySet::default();
    for candidate in candidates {
        let opened = match candidate {
            LibraryName::CurrentProcess => {
                log::debug!("Opening {}", CURRENT_PROCESS);
                loader
                    .open(None, OpenFlags::LAZY_LOCAL)
                    .map_err(|e| {
                        vec![LoadFailure {
                            candidate: CURRENT_PROCESS.to_string(),
                            cause: e.0,
                        }]
                    })
            }
            _ => open_first(&platform.candidates(candidate.names()), loader),
        };
        match opened {
            Ok(lib) => set.libraries.push(lib),
            Err(mut failures) => {
                log::warn!("Skipping library {}: no candidate could be opened", candidate);
                set.failures.append(&mut failures);
            }
        }
    }
    if set.libraries.is_empty() {
        let message = set
            .failures
            .iter()
            .map(|f| f.cause.as_str())
            .collect::<Vec<_>>()
            .join(". ");
        let mut report = report!(LibraryError::Load(message));
        for f in &set.failures {
            report = report.attach_printable(format!("{}: {}", f.candidate, f.cause));
        }
        return Err(report);
    }
    Ok(set)
}

fn open_first(
    names: &[String],
    loader: &dyn LibraryLoader,
) -> std::result::Result<Arc<dyn NativeLibrary>, Vec<LoadFailure>> {
    if names.is_empty() {
        return Err(vec![LoadFailure {
            candidate: "[]".to_string(),
            cause: "no alternative names given".to_string(),
        }]);
    }
    let mut failures = Vec::new();
    for name in names {
        log::debug!("Trying library candidate `{}`", name);
        match loader.open(Some(name), OpenFlags::LAZY_LOCAL) {
            Ok(lib) => return Ok(lib),
            Err(e) => failures.push(LoadFailure {
                candidate: name.clone(),
                cause: e.0,
            }),
        }
    }
    Err(failures)
}
