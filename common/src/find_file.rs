use std::path::{Path, PathBuf};

/// Find `file_name` in the current directory or the closest parent that has it
pub fn find_upwards(file_name: &str) -> Option<PathBuf> {
    find_upwards_from(".", file_name)
}

pub fn find_upwards_from(start: impl AsRef<Path>, file_name: &str) -> Option<PathBuf> {
    let mut current = dunce::canonicalize(start).ok()?;
    loop {
        let candidate = current.join(file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?.to_path_buf();
    }
}
