//! Validation helpers for worker configuration.

use rtbench_common::{ProcessError, ProcessResult};
use std::path::{Path, PathBuf};

/// Validate a worker name: non-empty, alphanumerics, hyphens and underscores.
pub fn validate_worker_name(name: &str) -> ProcessResult<()> {
    if name.is_empty() {
        return Err(ProcessError::check_failed(
            "validation",
            "Worker name cannot be empty",
        ));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ProcessError::check_failed(
            name,
            "Worker name can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Resolve an executable the way a shell would.
///
/// Names containing a `/` are taken as paths; bare names are looked up in
/// `PATH`. Returns `None` when nothing executable is found.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains('/') {
        let path = Path::new(program);
        return is_executable(path).then(|| path.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_name_rules() {
        assert!(validate_worker_name("hackbench").is_ok());
        assert!(validate_worker_name("load_2-b").is_ok());
        assert!(validate_worker_name("").is_err());
        assert!(validate_worker_name("bad name").is_err());
        assert!(validate_worker_name("a/b").is_err());
    }

    #[test]
    fn test_find_executable() {
        assert!(find_executable("sh").is_some());
        assert!(find_executable("/bin/sh").is_some());
        assert!(find_executable("rtbench-definitely-missing").is_none());
        assert!(find_executable("").is_none());

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.txt");
        std::fs::write(&plain, "x").unwrap();
        assert!(find_executable(plain.to_str().unwrap()).is_none());
    }
}
