use std::path::PathBuf;

use error_stack::{Result, ResultExt};
use nativebind::{Declaration, Scope};

use crate::manifest::Manifest;
use crate::report::{Format, ScopeReport};

#[derive(Debug, Clone, clap::Parser)]
pub struct LayoutCLI {
    /// (Optional) Path of the manifest.
    ///
    /// If not specified, `nativebind.yaml` is searched for in the current
    /// directory and its parents
    pub manifest: Option<String>,
    /// Output path of the layout report. Printed to stdout if not specified
    #[clap(short, long)]
    pub output: Option<String>,
    /// Format of the report. Inferred from the output extension if not specified
    #[clap(short, long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load manifest")]
    Manifest,
    #[error("Failed to declare types")]
    Declare,
    #[error("Failed to write report")]
    Report,
}

/// Whether a declaration only needs the type system, not native libraries
pub fn is_type_declaration(decl: &Declaration) -> bool {
    !matches!(
        decl,
        Declaration::Libraries(_) | Declaration::Function(_) | Declaration::Variable(_)
    )
}

/// Apply the type declarations of a manifest to a new scope
pub fn declare_types(manifest: &Manifest) -> Result<Scope, Error> {
    let mut scope = Scope::new(&manifest.name);
    let decls = manifest.declarations().change_context(Error::Manifest)?;
    for decl in decls {
        if !is_type_declaration(&decl) {
            log::info!(
                "Skipping {} `{}`",
                decl.kind(),
                decl.name().unwrap_or_default()
            );
            continue;
        }
        scope.declare(decl).change_context(Error::Declare)?;
    }
    Ok(scope)
}

pub fn run_cli(cli: LayoutCLI) -> Result<(), Error> {
    let path = Manifest::locate(cli.manifest.as_deref()).change_context(Error::Manifest)?;
    log::info!("Loading manifest from {}", path.display());
    let manifest = Manifest::load(&path).change_context(Error::Manifest)?;
    let scope = declare_types(&manifest)?;

    let output = cli.output.map(PathBuf::from);
    let format = cli
        .format
        .or_else(|| output.as_deref().map(Format::from_path))
        .unwrap_or(Format::Yaml);
    ScopeReport::new(&scope)
        .write(output.as_deref(), format)
        .change_context(Error::Report)
}
