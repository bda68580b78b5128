// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The 3-way reconcile for entities that still have overlays.
//!
//! Three versions of every target are compared: the pristine base
//! archived under `state/base`, the record of what we last wrote under
//! `state/provisioned`, and whatever sits in the live tree right now.
//! The pipeline renders the desired content from the base, refuses to
//! clobber out-of-band edits unless forced, and commits with a sibling
//! write plus rename so observers never see a half-written target.

use std::path::Path;

use fileimage::FileImage;
use fs_err as fs;

use super::{Entity, Error};
use crate::pm::{self, PackageManager};
use crate::runtime::Runtime;
use crate::Outcome;

impl Entity {
    pub(super) fn apply_nonorphan(
        &self,
        runtime: &Runtime,
        pm: &PackageManager,
        force: bool,
    ) -> Result<Outcome, Error> {
        let target_path = runtime.target_path(self.rel_path());
        let base_path = runtime.base_path(self.rel_path());
        let provisioned_path = runtime.provisioned_path(self.rel_path());

        // Absorb a vendor update before anything else: the dpkg and
        // rpm adapters move files at the live path while looking, and
        // whatever they find supersedes the archived base.
        if let Some(update) = pm.updated_base(&target_path)? {
            println!(
                ">> found updated target base: {} -> {}",
                update.reported,
                base_path.display()
            );
            create_parent(&base_path)?;
            fileimage::copy(&update.actual, &base_path)
                .map_err(|error| Error::Copy(update.actual.clone(), base_path.clone(), error))?;
            // the origin has served its purpose
            let _ = fs::remove_file(&update.actual);
        }

        let current = FileImage::load(&target_path, false).map_err(Error::Load)?;
        let base = FileImage::load(&base_path, false).map_err(Error::Load)?;
        let provisioned = FileImage::load(&provisioned_path, false).map_err(Error::Load)?;

        // First contact with this target: the live file *is* the
        // pristine version, archive it as the base.
        let base = match (base, &current) {
            (None, Some(current)) => {
                create_parent(&base_path)?;
                current
                    .write(&base_path)
                    .map_err(|error| Error::Copy(target_path.clone(), base_path.clone(), error))?;
                Some(current.clone().with_path(&base_path))
            }
            (base, _) => base,
        };

        let Some(base) = base else {
            return Err(Error::BaseNotManageable);
        };

        if current.is_none() && !force {
            return Ok(Outcome::ExternallyDeleted);
        }

        let desired = self.render(base.clone().with_path(&target_path))?;

        // The live file must match our last write (or the base, if we
        // never wrote). Matching the desired content is also fine:
        // re-applying over a coincidentally-correct manual edit stays
        // idempotent.
        let expected = provisioned.as_ref().unwrap_or(&base);
        if let Some(current) = &current {
            if !current.equal_to(expected) && !current.equal_to(&desired) && !force {
                return Ok(Outcome::ExternallyChanged);
            }
        }

        // Record what we are about to write, so the next run can tell
        // manual edits apart.
        if !provisioned.as_ref().is_some_and(|p| desired.equal_to(p)) {
            create_parent(&provisioned_path)?;
            desired
                .write(&provisioned_path)
                .map_err(|error| Error::Copy(target_path.clone(), provisioned_path.clone(), error))?;
        }

        if current.as_ref().is_some_and(|c| desired.equal_to(c)) {
            return Ok(Outcome::AlreadyApplied);
        }

        // sibling write + rename keeps a valid file at the target path
        // at every instant
        let staged = pm::suffixed(&target_path, ".holonew");
        desired.write(&staged)?;
        fs::rename(&staged, &target_path)
            .map_err(|error| Error::Rename(staged, target_path, error))?;
        Ok(Outcome::Applied)
    }

    /// Fold the overlays onto the base to produce the desired content.
    /// Steps whose output a later static overlay would discard anyway
    /// are skipped.
    fn render(&self, base: FileImage) -> Result<FileImage, Error> {
        let resources = self.resources();
        let first_step = resources
            .iter()
            .rposition(|resource| resource.discards_previous())
            .unwrap_or(0);

        let mut accumulator = base;
        for resource in &resources[first_step..] {
            accumulator = resource.apply_to(accumulator)?;
        }
        Ok(accumulator)
    }
}

fn create_parent(path: &Path) -> Result<(), Error> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).map_err(|error| Error::CreateDir(dir.to_owned(), error))
}
