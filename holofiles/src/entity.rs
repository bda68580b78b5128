// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! One provisionable target and its overlays.

use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;

use crate::pm::{self, PackageManager};
use crate::resource::{self, Resource};
use crate::runtime::Runtime;
use crate::Outcome;

pub use self::orphan::ScrubStrategy;

mod nonorphan;
mod orphan;

#[derive(Debug, Error)]
pub enum Error {
    #[error("skipping target: not a manageable file")]
    BaseNotManageable,

    #[error("skipping target")]
    Load(#[source] fileimage::Error),

    #[error("cannot create directory {0:?}")]
    CreateDir(PathBuf, #[source] io::Error),

    #[error("cannot copy {0:?} to {1:?}")]
    Copy(PathBuf, PathBuf, #[source] fileimage::Error),

    #[error("cannot remove {0:?}")]
    Remove(PathBuf, #[source] io::Error),

    #[error("cannot rename {0:?} to {1:?}")]
    Rename(PathBuf, PathBuf, #[source] io::Error),

    #[error(transparent)]
    Pm(#[from] pm::Error),

    #[error(transparent)]
    Resource(#[from] resource::Error),

    #[error(transparent)]
    Image(#[from] fileimage::Error),
}

/// A target file governed by the engine: its path relative to the
/// root, plus every overlay the repository holds for it. An entity
/// without overlays is an orphan, kept alive only by its base record
/// and eligible for scrubbing.
#[derive(Debug, Clone)]
pub struct Entity {
    rel_path: PathBuf,
    resources: Vec<Resource>,
}

impl Entity {
    pub fn new(rel_path: impl Into<PathBuf>) -> Self {
        Self {
            rel_path: rel_path.into(),
            resources: Vec::new(),
        }
    }

    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    /// Overlays ordered by disambiguator, the order they fold in.
    pub fn resources(&self) -> Vec<&Resource> {
        self.resources
            .iter()
            .sorted_by(|a, b| a.disambiguator().cmp(b.disambiguator()))
            .collect()
    }

    pub fn is_orphan(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    /// Stable identifier, e.g. `file:/etc/foo.conf`.
    pub fn id(&self) -> String {
        format!("file:/{}", self.rel_path.display())
    }

    /// Repository files making up this entity, in application order.
    pub fn sources(&self) -> Vec<&Path> {
        self.resources().into_iter().map(Resource::path).collect()
    }

    /// Verb and reason announced during scan; `None` for plainly
    /// provisionable entities.
    pub fn action(&self, runtime: &Runtime) -> Option<(&'static str, &'static str)> {
        self.is_orphan()
            .then(|| ("Scrubbing", self.scrub_strategy(runtime).reason()))
    }

    /// Key/value detail lines shown during scan.
    pub fn user_info(&self, runtime: &Runtime) -> Vec<(&'static str, String)> {
        let base_path = runtime.base_path(&self.rel_path);
        if self.is_orphan() {
            let strategy = self.scrub_strategy(runtime);
            return vec![(strategy.label(), base_path.display().to_string())];
        }

        let mut info = vec![("store at", base_path.display().to_string())];
        for resource in self.resources() {
            info.push((resource.strategy(), resource.path().display().to_string()));
        }
        info
    }

    /// Reconcile the target with its overlays (or scrub an orphan).
    ///
    /// Failures are printed to stderr and the entity still reports as
    /// applied; the driver protocol has no channel for partial results
    /// yet, and existing drivers rely on this.
    pub fn apply(&self, runtime: &Runtime, pm: &PackageManager, force: bool) -> Outcome {
        if self.is_orphan() {
            for error in self.apply_orphan(runtime, pm) {
                eprintln!("!! {}", crate::error_chain(&error));
            }
            Outcome::Applied
        } else {
            match self.apply_nonorphan(runtime, pm, force) {
                Ok(outcome) => outcome,
                Err(error) => {
                    eprintln!("!! {}", crate::error_chain(&error));
                    Outcome::Applied
                }
            }
        }
    }
}
