// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Integration points with the distribution's packaging toolchain.
//!
//! Every supported package manager has its own convention for parking
//! "the vendor shipped a new version of a file you modified" and "the
//! package went away but you had modified its file" next to the live
//! path. The adapters here normalize those conventions for the
//! reconciler.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::trace;
use thiserror::Error;

pub use self::alpine::Alpine;
pub use self::dpkg::Dpkg;
pub use self::pacman::Pacman;
pub use self::rpm::Rpm;

mod alpine;
mod dpkg;
mod pacman;
mod rpm;

#[derive(Debug, Error)]
pub enum Error {
    #[error("relocate {0:?} to {1:?}")]
    Shuffle(PathBuf, PathBuf, #[source] io::Error),
}

/// A vendor-updated pristine version of a target, discovered next to
/// the live file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedBase {
    /// Where the file can be picked up
    pub actual: PathBuf,
    /// How to name the discovery to the user (differs from `actual`
    /// when the adapter had to move files around)
    pub reported: String,
}

impl UpdatedBase {
    fn at(path: PathBuf) -> Self {
        Self {
            reported: path.display().to_string(),
            actual: path,
        }
    }
}

/// The closed set of packaging toolchains we understand. Selected once
/// per process by [`PackageManager::detect`] and carried by the plugin
/// value from there on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageManager {
    Alpine(Alpine),
    Pacman(Pacman),
    Dpkg(Dpkg),
    Rpm(Rpm),
    /// Unrecognized distribution: no variant files exist
    None,
}

impl PackageManager {
    /// Pick the adapter for the distribution the root belongs to,
    /// going by os-release(5) identification.
    pub fn detect(root: &Path) -> Self {
        let ids = match osrelease::OsRelease::load(root) {
            Ok(parsed) => parsed.ids(),
            Err(error) => {
                eprintln!("!! Cannot read os-release(5): {}", crate::error_chain(&error));
                return Self::None;
            }
        };

        let selected = if ids.contains("alpine") {
            Self::Alpine(Alpine)
        } else if ids.contains("arch") {
            Self::Pacman(Pacman)
        } else if ids.contains("debian") {
            Self::Dpkg(Dpkg)
        } else if ids.contains("fedora") || ids.contains("suse") {
            Self::Rpm(Rpm)
        } else if ids.contains("unittest") {
            // escape hatch for synthetic root trees
            Self::None
        } else {
            eprintln!(
                "!! Running on an unrecognized distribution. Distribution IDs: {}",
                ids.iter().join(",")
            );
            eprintln!(">> Please report this error at <https://github.com/holocm/holo/issues/new>");
            eprintln!(">> and include the contents of your /etc/os-release file.");
            Self::None
        };

        trace!("package manager: {selected:?}");
        selected
    }

    /// Look for a vendor-updated pristine version of `target` next to
    /// the live file. Some adapters move files at the live path as a
    /// side effect, so this must run before anything stats the target.
    pub fn updated_base(&self, target: &Path) -> Result<Option<UpdatedBase>, Error> {
        match self {
            Self::Alpine(pm) => Ok(pm.updated_base(target)),
            Self::Pacman(pm) => Ok(pm.updated_base(target)),
            Self::Dpkg(pm) => pm.updated_base(target),
            Self::Rpm(pm) => pm.updated_base(target),
            Self::None => Ok(None),
        }
    }

    /// Backup copies the package manager left behind for a removed
    /// `target`; candidates for deletion during an orphan scrub.
    pub fn cleanup_targets(&self, target: &Path) -> Vec<PathBuf> {
        match self {
            Self::Pacman(pm) => pm.cleanup_targets(target),
            Self::Alpine(_) | Self::Dpkg(_) | Self::Rpm(_) | Self::None => Vec::new(),
        }
    }
}

/// `path` with `suffix` appended to its final component.
pub(crate) fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn root_with_os_release(contents: &str) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("etc")).unwrap();
        fs::write(root.path().join("etc/os-release"), contents).unwrap();
        root
    }

    #[test]
    fn detect_by_id() {
        let root = root_with_os_release("ID=arch\n");
        assert_eq!(PackageManager::detect(root.path()), PackageManager::Pacman(Pacman));
    }

    #[test]
    fn detect_by_id_like() {
        let root = root_with_os_release("ID=endeavouros\nID_LIKE=arch\n");
        assert_eq!(PackageManager::detect(root.path()), PackageManager::Pacman(Pacman));
    }

    #[test]
    fn detect_prefers_usr_lib_fallback() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("usr/lib")).unwrap();
        fs::write(root.path().join("usr/lib/os-release"), "ID=debian\n").unwrap();
        assert_eq!(PackageManager::detect(root.path()), PackageManager::Dpkg(Dpkg));
    }

    #[test]
    fn detect_unknown_degrades_to_none() {
        let root = root_with_os_release("ID=plan9\n");
        assert_eq!(PackageManager::detect(root.path()), PackageManager::None);
    }

    #[test]
    fn detect_suse_uses_rpm() {
        let root = root_with_os_release("ID=opensuse-leap\nID_LIKE=suse opensuse\n");
        assert_eq!(PackageManager::detect(root.path()), PackageManager::Rpm(Rpm));
    }

    #[test]
    fn suffix_appends_to_final_component() {
        assert_eq!(
            suffixed(Path::new("/etc/x.conf"), ".pacnew"),
            PathBuf::from("/etc/x.conf.pacnew")
        );
    }
}
