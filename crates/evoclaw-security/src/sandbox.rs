//! Autonomy levels, allow-listed binaries, and path validation used by the
//! scheduler's `shell` action and by tool executors.
//!
//! Grounded on `skilllite-sandbox::security::policy`'s deny-list categories
//! and `skilllite-core::path_validation`'s traversal checks, generalized
//! from "skill execution" to "scheduler shell actions".

use std::path::{Path, PathBuf};

use evoclaw_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutonomyLevel {
    Readonly,
    Supervised,
    Full,
}

/// Forbidden path prefixes mirroring the corpus's mandatory-deny categories:
/// shell/git/ssh/cloud-credential configuration that a compromised agent
/// could use to escalate or exfiltrate.
pub const FORBIDDEN_PATH_PREFIXES: &[&str] = &[
    ".ssh", ".gnupg", ".aws", ".kube", ".docker", ".git/hooks", ".bashrc", ".zshrc", ".profile", ".netrc",
];

pub struct SandboxPolicy {
    pub autonomy: AutonomyLevel,
    pub allowed_binaries: Vec<String>,
    pub workspace: PathBuf,
}

impl SandboxPolicy {
    pub fn new(autonomy: AutonomyLevel, allowed_binaries: Vec<String>, workspace: impl Into<PathBuf>) -> Self {
        Self { autonomy, allowed_binaries, workspace: workspace.into() }
    }

    /// Readonly autonomy never permits a shell command; supervised/full
    /// require the binary to be on the allow-list.
    pub fn validate_command(&self, command: &str) -> Result<()> {
        if self.autonomy == AutonomyLevel::Readonly {
            return Err(Error::forbidden("sandbox is read-only, shell actions are disabled"));
        }
        let binary = command.split_whitespace().next().unwrap_or("");
        if self.allowed_binaries.iter().any(|b| b == binary) {
            Ok(())
        } else {
            Err(Error::forbidden(format!("binary not allow-listed: {binary}")))
        }
    }

    /// Rejects traversal, null bytes, forbidden prefixes, and symlink/`..`
    /// escape outside `self.workspace` unless `path` is absolute and
    /// explicitly passed — callers are expected to only offer
    /// workspace-relative paths here.
    pub fn validate_path(&self, path: &str) -> Result<PathBuf> {
        if path.contains('\0') {
            return Err(Error::invalid_argument("path contains a null byte"));
        }
        if path.split('/').any(|seg| seg == "..") {
            return Err(Error::invalid_argument(format!("path escapes workspace via '..': {path}")));
        }
        let relative = Path::new(path);
        for prefix in FORBIDDEN_PATH_PREFIXES {
            if relative.starts_with(prefix) {
                return Err(Error::forbidden(format!("path is forbidden: {path}")));
            }
        }
        let joined = self.workspace.join(relative);
        let base = self.workspace.canonicalize().unwrap_or_else(|_| self.workspace.clone());
        let resolved = joined.canonicalize().unwrap_or(joined);
        if !resolved.starts_with(&base) {
            return Err(Error::forbidden(format!("path escapes workspace: {path}")));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SandboxPolicy {
        SandboxPolicy::new(AutonomyLevel::Supervised, vec!["echo".into(), "ls".into()], std::env::temp_dir())
    }

    #[test]
    fn readonly_blocks_every_command() {
        let p = SandboxPolicy::new(AutonomyLevel::Readonly, vec!["echo".into()], std::env::temp_dir());
        assert!(p.validate_command("echo hi").is_err());
    }

    #[test]
    fn supervised_allows_listed_binary() {
        assert!(policy().validate_command("echo hi").is_ok());
    }

    #[test]
    fn supervised_rejects_unlisted_binary() {
        assert!(policy().validate_command("rm -rf /").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(policy().validate_path("../etc/passwd").is_err());
    }

    #[test]
    fn rejects_null_byte() {
        assert!(policy().validate_path("foo\0bar").is_err());
    }

    #[test]
    fn rejects_forbidden_prefix() {
        assert!(policy().validate_path(".ssh/id_ed25519").is_err());
    }

    #[test]
    fn allows_plain_relative_path() {
        assert!(policy().validate_path("notes.txt").is_ok());
    }
}
