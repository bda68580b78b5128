// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::Entity;
use crate::pm::PackageManager;
use crate::runtime::{Runtime, API_VERSION};
use crate::{scan, Outcome};

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown entity ID {0:?}")]
    UnknownEntity(String),

    #[error(transparent)]
    Scan(#[from] scan::Error),
}

/// The file-provisioning plugin: a runtime plus the package-manager
/// adapter detected for it. One value per process; everything else is
/// derived per operation.
#[derive(Debug)]
pub struct FilesPlugin {
    pub runtime: Runtime,
    pub pm: PackageManager,
}

impl FilesPlugin {
    pub fn new(runtime: Runtime) -> Self {
        let pm = PackageManager::detect(&runtime.root);
        runtime.ensure_dirs();
        Self { runtime, pm }
    }

    /// Metadata for the driver's version handshake.
    pub fn info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("MIN_API_VERSION", API_VERSION.to_string()),
            ("MAX_API_VERSION", API_VERSION.to_string()),
        ]
    }

    /// The full entity set, sorted by identifier.
    pub fn scan(&self) -> Result<Vec<Entity>, Error> {
        Ok(scan::scan(&self.runtime)?)
    }

    /// Reconcile the entity with the given identifier.
    pub fn apply(&self, entity_id: &str, force: bool) -> Result<Outcome, Error> {
        let entity = self.find_entity(entity_id)?;
        Ok(entity.apply(&self.runtime, &self.pm, force))
    }

    /// File pairs for diffing: (desired state, current state). Either
    /// may not exist; the caller maps absence for its output medium.
    pub fn diff(&self, entity_id: &str) -> Result<(PathBuf, PathBuf), Error> {
        let entity = self.find_entity(entity_id)?;
        Ok((
            self.runtime.provisioned_path(entity.rel_path()),
            self.runtime.target_path(entity.rel_path()),
        ))
    }

    fn find_entity(&self, entity_id: &str) -> Result<Entity, Error> {
        self.scan()?
            .into_iter()
            .find(|entity| entity.id() == entity_id)
            .ok_or_else(|| Error::UnknownEntity(entity_id.to_owned()))
    }
}
