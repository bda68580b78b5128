// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::{env, fmt};

use fs_err as fs;
use log::trace;
use thiserror::Error;

/// The one protocol revision this plugin speaks.
pub const API_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse HOLO_API_VERSION")]
    ParseApiVersion(#[from] ParseIntError),

    #[error("incompatible API version {requested}, this plugin implements {implemented}")]
    IncompatibleApiVersion { requested: u32, implemented: u32 },
}

/// Process-scoped runtime environment: where the live tree, the
/// resource repository and our bookkeeping live. Built once per
/// invocation and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub root: PathBuf,
    pub resource_dir: PathBuf,
    pub state_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Runtime {
    /// Read the `HOLO_*` environment the driver hands us.
    ///
    /// `HOLO_ROOT_DIR` defaults to `/`. The directory variables fall
    /// back to the canonical layout under the root so the plugin also
    /// works when invoked by hand.
    pub fn from_env() -> Result<Self, Error> {
        if let Ok(raw) = env::var("HOLO_API_VERSION") {
            let requested = raw.trim().parse::<u32>()?;
            if requested != API_VERSION {
                return Err(Error::IncompatibleApiVersion {
                    requested,
                    implemented: API_VERSION,
                });
            }
        }

        let root = PathBuf::from(env::var_os("HOLO_ROOT_DIR").unwrap_or_else(|| "/".into()));

        Ok(Self {
            resource_dir: dir_var("HOLO_RESOURCE_DIR", &root, "usr/share/holo/files"),
            state_dir: dir_var("HOLO_STATE_DIR", &root, "var/lib/holo/files"),
            cache_dir: dir_var("HOLO_CACHE_DIR", &root, "run/holo-files-cache"),
            root,
        })
    }

    /// Assemble a runtime from explicit directories.
    pub fn new(
        root: impl Into<PathBuf>,
        resource_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            resource_dir: resource_dir.into(),
            state_dir: state_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Tree of pristine package-manager versions, captured the first
    /// time we touch each target.
    pub fn base_dir(&self) -> PathBuf {
        self.state_dir.join("base")
    }

    /// Tree of the content we last wrote out, kept to detect
    /// out-of-band edits.
    pub fn provisioned_dir(&self) -> PathBuf {
        self.state_dir.join("provisioned")
    }

    pub fn target_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn base_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.base_dir().join(rel)
    }

    pub fn provisioned_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.provisioned_dir().join(rel)
    }

    /// Create the directories we own. Failure is tolerated here; any
    /// real problem resurfaces as a precise error on first use.
    pub fn ensure_dirs(&self) {
        for dir in [self.base_dir(), self.provisioned_dir(), self.cache_dir.clone()] {
            let _ = fs::create_dir_all(dir);
        }
    }

    /// Drop the per-invocation scratch space. Best effort.
    pub fn clean_cache(&self) {
        let _ = fs::remove_dir_all(&self.cache_dir);
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root {:?}, resources {:?}", self.root, self.resource_dir)
    }
}

fn dir_var(key: &str, root: &Path, fallback: &str) -> PathBuf {
    match env::var_os(key) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => {
            trace!("{key} not set, using {fallback} under the root");
            root.join(fallback)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn state_subdirectories() {
        let runtime = Runtime::new("/r", "/res", "/state", "/cache");
        assert_eq!(runtime.base_path("etc/x.conf"), PathBuf::from("/state/base/etc/x.conf"));
        assert_eq!(
            runtime.provisioned_path("etc/x.conf"),
            PathBuf::from("/state/provisioned/etc/x.conf")
        );
        assert_eq!(runtime.target_path("etc/x.conf"), PathBuf::from("/r/etc/x.conf"));
    }
}
