// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Scrubbing of orphaned entities.
//!
//! An orphan has a base record but no overlays left: either the
//! repository files were deleted (the target survives and gets its
//! pristine version back) or the package itself went away (every trace
//! is removed). Errors are collected rather than short-circuited so a
//! half-broken state loses as much residue as possible.

use std::io;

use fileimage::FileImage;
use fs_err as fs;

use super::{Entity, Error};
use crate::pm::PackageManager;
use crate::runtime::Runtime;

/// How an orphan will be scrubbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubStrategy {
    /// The target still exists: put the pristine version back
    Restore,
    /// The target is gone: drop all bookkeeping (and stray backups)
    Delete,
}

impl ScrubStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ScrubStrategy::Restore => "restore",
            ScrubStrategy::Delete => "delete",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ScrubStrategy::Restore => "all repository files were deleted",
            ScrubStrategy::Delete => "target was deleted",
        }
    }
}

impl Entity {
    /// Assess an orphan by whether its target is still manageable.
    pub fn scrub_strategy(&self, runtime: &Runtime) -> ScrubStrategy {
        if fileimage::is_manageable(runtime.target_path(self.rel_path())) {
            ScrubStrategy::Restore
        } else {
            ScrubStrategy::Delete
        }
    }

    pub(super) fn apply_orphan(&self, runtime: &Runtime, pm: &PackageManager) -> Vec<Error> {
        let target_path = runtime.target_path(self.rel_path());
        let mut base_path = runtime.base_path(self.rel_path());
        let provisioned_path = runtime.provisioned_path(self.rel_path());

        let mut errors = Vec::new();
        let mut check = |result: Result<(), Error>| {
            if let Err(error) = result {
                errors.push(error);
            }
        };

        match self.scrub_strategy(runtime) {
            ScrubStrategy::Delete => {
                let provisioned = match FileImage::load(&provisioned_path, false) {
                    Ok(provisioned) => provisioned,
                    Err(error) => {
                        check(Err(Error::Load(error)));
                        None
                    }
                };

                // The package manager may have parked a backup of our
                // provisioned content next to the (now gone) target.
                // Only content we recognize as our own is deleted.
                for backup_path in pm.cleanup_targets(&target_path) {
                    let Ok(Some(backup)) = FileImage::load(&backup_path, false) else {
                        continue;
                    };
                    if provisioned.as_ref().is_some_and(|p| backup.equal_to(p)) {
                        println!(">> also deleting {}", backup_path.display());
                        check(
                            fs::remove_file(&backup_path)
                                .map_err(|error| Error::Remove(backup_path.clone(), error)),
                        );
                    }
                }

                check(
                    fs::remove_file(&provisioned_path)
                        .map_err(|error| Error::Remove(provisioned_path.clone(), error)),
                );
                check(
                    fs::remove_file(&base_path)
                        .map_err(|error| Error::Remove(base_path.clone(), error)),
                );
            }
            ScrubStrategy::Restore => {
                // an updated vendor version beats the archived base
                match pm.updated_base(&target_path) {
                    Ok(Some(update)) => {
                        println!(
                            ">> found updated target base: {} -> {}",
                            update.reported,
                            target_path.display()
                        );
                        check(
                            fs::remove_file(&base_path)
                                .map_err(|error| Error::Remove(base_path.clone(), error)),
                        );
                        base_path = update.actual;
                    }
                    Ok(None) => {}
                    Err(error) => check(Err(error.into())),
                }

                match fs::remove_file(&provisioned_path) {
                    Err(error) if error.kind() != io::ErrorKind::NotFound => {
                        check(Err(Error::Remove(provisioned_path.clone(), error)));
                    }
                    _ => {}
                }

                check(
                    fileimage::move_file(&base_path, &target_path)
                        .map_err(|error| Error::Copy(base_path.clone(), target_path.clone(), error)),
                );
            }
        }

        errors
    }
}
