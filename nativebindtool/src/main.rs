use std::process::ExitCode;

use clap::Parser;
use error_stack::ResultExt;

mod check;
mod layout;
mod manifest;
mod probe;
mod report;

/// Native Bind Tool
///
/// Tool for checking native binding manifests against the libraries on this machine.
#[derive(Debug, Clone, clap::Parser)]
pub struct CLI {
    /// More log output. Repeat for more. `RUST_LOG` takes precedence
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Subcommand {
    /// Compute the struct and union layouts declared in a manifest
    Layout(layout::LayoutCLI),
    /// Open the libraries of a manifest and resolve every function and variable
    Check(check::CheckCLI),
}

fn main() -> ExitCode {
    let CLI {
        verbose,
        subcommand,
    } = CLI::parse();
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    match subcommand {
        Subcommand::Layout(cli) => common::run("layout", || {
            layout::run_cli(cli)
                .attach_printable_lazy(|| "See `nativebindtool layout --help` for more information")
        }),
        Subcommand::Check(cli) => common::run("check", || {
            check::run_cli(cli)
                .attach_printable_lazy(|| "See `nativebindtool check --help` for more information")
        }),
    }
}
