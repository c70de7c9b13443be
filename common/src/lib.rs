use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

mod find_file;
pub use find_file::*;

/// Main execution wrapper
///
/// Runs `f`, prints the error report if it fails, otherwise how long `task` took.
/// Both go to stderr, stdout is left to the task's own output.
pub fn run<T, E: std::fmt::Debug, F: FnOnce() -> Result<T, E>>(task: &str, f: F) -> ExitCode {
    let start_time = Instant::now();
    if let Err(e) = f() {
        eprintln!("\nError: {:?}", e);
        return ExitCode::FAILURE;
    }
    let elapsed = start_time.elapsed();
    eprintln!("{} finished in {:.02} seconds", task, elapsed.as_secs_f32());
    ExitCode::SUCCESS
}

pub fn ensure_parent_exists(path: impl AsRef<Path>) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
