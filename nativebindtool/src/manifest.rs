use std::path::{Path, PathBuf};

use error_stack::{report, Result, ResultExt};
use nativebind::decl::{DeclArg, Declaration};
use serde::Deserialize;
use serde_yaml::Value;

/// Manifest searched for when no path is given
pub const MANIFEST_FILE: &str = "nativebind.yaml";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Manifest not found")]
    NotFound,
    #[error("Failed to read manifest")]
    Read,
    #[error("Failed to parse manifest")]
    Parse,
    #[error("Invalid declaration #{0}")]
    Declaration(usize),
}

/// Declarations of one scope, as written in YAML
///
/// ```yaml
/// name: libc
/// convention: default
/// libraries: [c, current_process]
/// declarations:
///   - typedef: [uint32, pid_t]
///   - function: [getpid, [], pid_t]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub convention: Option<String>,
    #[serde(default)]
    pub libraries: Vec<Value>,
    #[serde(default)]
    pub declarations: Vec<Value>,
}

impl Manifest {
    /// Use `path` if given, otherwise look for the manifest from the current directory up
    pub fn locate(path: Option<&str>) -> Result<PathBuf, Error> {
        match path {
            Some(path) => Ok(PathBuf::from(path)),
            None => common::find_upwards(MANIFEST_FILE)
                .ok_or(Error::NotFound)
                .attach_printable_lazy(|| {
                    format!(
                        "Please run where `{}` is in the current or a parent directory, or specify the path",
                        MANIFEST_FILE
                    )
                }),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .change_context(Error::Read)
            .attach_printable_lazy(|| format!("Path: {}", path.display()))?;
        Self::parse(&content).attach_printable_lazy(|| format!("Path: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self, Error> {
        serde_yaml::from_str(content).change_context(Error::Parse)
    }

    /// The declarations to apply, libraries and convention first
    pub fn declarations(&self) -> Result<Vec<Declaration>, Error> {
        let mut out = Vec::with_capacity(self.declarations.len() + 2);
        if !self.libraries.is_empty() {
            let args = self
                .libraries
                .iter()
                .map(to_decl_arg)
                .collect::<Result<Vec<_>, _>>()
                .attach_printable("In `libraries`")?;
            out.push(
                Declaration::parse("library", &args)
                    .change_context(Error::Parse)
                    .attach_printable("In `libraries`")?,
            );
        }
        if let Some(convention) = &self.convention {
            out.push(
                Declaration::parse("convention", &[DeclArg::Symbol(convention.clone())])
                    .change_context(Error::Parse)
                    .attach_printable("In `convention`")?,
            );
        }
        for (i, entry) in self.declarations.iter().enumerate() {
            let (kind, args) = split_entry(entry).change_context(Error::Declaration(i))?;
            let decl = Declaration::parse(&kind, &args)
                .change_context(Error::Declaration(i))
                .attach_printable_lazy(|| format!("Kind: {}", kind))?;
            out.push(decl);
        }
        Ok(out)
    }
}

/// `{kind: [args...]}`, or `{kind: arg}` for a single argument
fn split_entry(entry: &Value) -> Result<(String, Vec<DeclArg>), Error> {
    let mapping = match entry {
        Value::Mapping(mapping) if mapping.len() == 1 => mapping,
        _ => {
            return Err(report!(Error::Parse))
                .attach_printable("A declaration must be a map with exactly one key")
        }
    };
    let mut iter = mapping.iter();
    let Some((key, value)) = iter.next() else {
        return Err(report!(Error::Parse));
    };
    let kind = key
        .as_str()
        .ok_or(Error::Parse)
        .attach_printable("A declaration kind must be a string")?;
    let args = match value {
        Value::Sequence(items) => items
            .iter()
            .map(to_decl_arg)
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![to_decl_arg(other)?],
    };
    Ok((kind.to_string(), args))
}

fn to_decl_arg(value: &Value) -> Result<DeclArg, Error> {
    match value {
        Value::String(s) => Ok(DeclArg::Symbol(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(DeclArg::Int)
            .ok_or(Error::Parse)
            .attach_printable_lazy(|| format!("`{}` is not an integer", n)),
        Value::Sequence(items) => items
            .iter()
            .map(to_decl_arg)
            .collect::<Result<Vec<_>, _>>()
            .map(DeclArg::List),
        Value::Mapping(mapping) => mapping
            .iter()
            .map(|(k, v)| -> Result<(String, DeclArg), Error> {
                let key = k
                    .as_str()
                    .ok_or(Error::Parse)
                    .attach_printable("Map keys must be strings")?;
                Ok((key.to_string(), to_decl_arg(v)?))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(DeclArg::Map),
        Value::Null | Value::Bool(_) | Value::Tagged(_) => Err(report!(Error::Parse))
            .attach_printable_lazy(|| format!("Unexpected value: {:?}", value)),
    }
}
