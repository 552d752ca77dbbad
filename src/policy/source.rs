// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Where evaluators get their policy from
//!
//! Reloading on every request makes edits to the policy file visible to the
//! next request at the cost of one file read per evaluation. Caching reads the
//! file once and serves that snapshot until restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use super::Policy;
use crate::error::Result;

/// Policy provider, either re-read per call or loaded once
#[derive(Debug, Clone)]
pub enum PolicySource {
    /// Read the file again on every [`PolicySource::load`]
    Reload(PathBuf),
    /// Snapshot taken at construction time
    Cached(Arc<Policy>),
}

impl PolicySource {
    /// Build a source for `path`, loading it immediately unless `reload` is set
    pub fn from_path<P: AsRef<Path>>(path: P, reload: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if reload {
            info!("Policy {:?} will be reloaded on every request", path);
            return Ok(PolicySource::Reload(path));
        }
        let policy = Policy::from_file(&path)?;
        info!(
            "Policy {:?} loaded once with {} user(s)",
            path,
            policy.document().users.len()
        );
        Ok(PolicySource::Cached(Arc::new(policy)))
    }

    /// Current policy snapshot
    pub fn load(&self) -> Result<Arc<Policy>> {
        match self {
            PolicySource::Reload(path) => {
                debug!("Reloading policy from {:?}", path);
                Ok(Arc::new(Policy::from_file(path)?))
            }
            PolicySource::Cached(policy) => Ok(Arc::clone(policy)),
        }
    }
}

impl From<Policy> for PolicySource {
    fn from(policy: Policy) -> Self {
        PolicySource::Cached(Arc::new(policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const ALICE: &str = "users:\n  alice:\n    namespace: a\n    repos: [r]\n    actions: [pull]\n";
    const BOB: &str = "users:\n  bob:\n    namespace: b\n    repos: [r]\n    actions: [pull]\n";

    #[test]
    fn test_reload_sees_file_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        fs::write(&path, ALICE).unwrap();

        let source = PolicySource::from_path(&path, true).unwrap();
        assert!(source.load().unwrap().generate_for("alice").is_ok());

        fs::write(&path, BOB).unwrap();
        let policy = source.load().unwrap();
        assert!(policy.generate_for("alice").is_err());
        assert!(policy.generate_for("bob").is_ok());
    }

    #[test]
    fn test_cached_keeps_startup_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        fs::write(&path, ALICE).unwrap();

        let source = PolicySource::from_path(&path, false).unwrap();
        fs::write(&path, BOB).unwrap();
        assert!(source.load().unwrap().generate_for("alice").is_ok());
    }

    #[test]
    fn test_missing_file_is_empty_policy() {
        let dir = tempdir().unwrap();
        let source = PolicySource::from_path(dir.path().join("absent.yaml"), true).unwrap();
        let policy = source.load().unwrap();
        assert!(policy.document().users.is_empty());
        assert!(policy.allowed_access("alice", &["repository:x/a/r:pull"]).is_empty());
    }
}
