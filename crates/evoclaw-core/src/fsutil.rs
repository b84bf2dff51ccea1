//! Shared atomic-write / restrictive-permission helpers used by every
//! subsystem that persists JSON records to `data_dir`.
//!
//! Grounded on the `skilllite-agent::evolution::atomic_write`
//! (write-to-`.tmp`-then-rename) idiom.

use crate::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Create `dir` (and parents) with mode `0750` if it doesn't already exist.
#[cfg(unix)]
pub fn create_dir_restricted(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if dir.exists() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o750).create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn create_dir_restricted(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Set file permissions to `0640`. No-op on non-Unix targets.
#[cfg(unix)]
pub fn set_file_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(0o640);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
pub fn set_file_mode(_path: &Path) {}

/// Serialize `value` and write it to `path` atomically: write to
/// `<path>.tmp`, then rename over the target. POSIX rename is atomic within
/// the same filesystem, so readers never observe a partially-written file.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_restricted(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(value)?;
    fs::write(&tmp_path, body)?;
    set_file_mode(&tmp_path);
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn atomic_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("sample.json");
        atomic_write_json(&path, &Sample { n: 7 }).unwrap();
        let data = fs::read_to_string(&path).unwrap();
        let loaded: Sample = serde_json::from_str(&data).unwrap();
        assert_eq!(loaded, Sample { n: 7 });
    }
}
