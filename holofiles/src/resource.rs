// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Repository overlays.
//!
//! A resource lives at `<repo>/<disambiguator>/<target path>` and
//! describes one modification of its target: a static file replaces
//! the content wholesale, a `.holoscript` filters it through an
//! executable. The disambiguator orders multiple overlays touching the
//! same target.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use fileimage::{FileImage, Payload};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("execution of {0:?} failed")]
    Exec(PathBuf, #[source] io::Error),

    #[error("execution of {0:?} failed: {1}")]
    Failed(PathBuf, ExitStatus),

    #[error("resource vanished during apply: {0:?}")]
    Vanished(PathBuf),

    #[error(transparent)]
    Image(#[from] fileimage::Error),
}

/// How a resource transforms the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Content replaces the accumulator
    Static,
    /// Executable filters the accumulator through stdin/stdout
    Script,
}

/// One file in the resource repository.
#[derive(Debug, Clone)]
pub struct Resource {
    path: PathBuf,
    disambiguator: String,
    target: PathBuf,
    kind: Kind,
}

impl Resource {
    /// Classify a repository file by its path.
    ///
    /// Returns `None` for paths directly in the repository root: the
    /// first path segment is the disambiguator and cannot double as a
    /// target. A `.holoscript` suffix selects the script kind and is
    /// stripped from the target name; every other suffix is part of
    /// the target name.
    pub fn from_path(resource_dir: &Path, path: &Path) -> Option<Resource> {
        let (kind, trimmed) = match strip_script_suffix(path) {
            Some(trimmed) => (Kind::Script, trimmed),
            None => (Kind::Static, path.to_owned()),
        };

        let rel = trimmed.strip_prefix(resource_dir).ok()?;
        let mut segments = rel.components();
        let disambiguator = segments.next()?.as_os_str().to_string_lossy().into_owned();
        let target = segments.as_path().to_owned();
        if target.as_os_str().is_empty() {
            return None;
        }

        Some(Resource {
            path: path.to_owned(),
            disambiguator,
            target,
            kind,
        })
    }

    /// Location of this resource in the repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ordering key among resources for the same target.
    pub fn disambiguator(&self) -> &str {
        &self.disambiguator
    }

    /// Path of the governed target, relative to the root.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Human-readable name of the application strategy, for scan
    /// output.
    pub fn strategy(&self) -> &'static str {
        match self.kind {
            Kind::Static => "apply",
            Kind::Script => "passthru",
        }
    }

    /// Whether applying this resource throws the accumulated content
    /// away. Lets the pipeline skip steps whose output cannot survive.
    pub fn discards_previous(&self) -> bool {
        matches!(self.kind, Kind::Static)
    }

    /// Fold this resource onto the accumulator, producing the next
    /// intermediate content. The accumulator's permission bits and
    /// ownership always carry through.
    pub fn apply_to(&self, accumulator: FileImage) -> Result<FileImage, Error> {
        match self.kind {
            Kind::Static => {
                let repo = FileImage::load(&self.path, false)?
                    .ok_or_else(|| Error::Vanished(self.path.clone()))?;
                Ok(accumulator.with_payload(repo.payload))
            }
            Kind::Script => {
                // scripts consume file contents, so symlinks must be
                // chased down first
                let resolved = accumulator.resolve_symlink()?;
                let output = self.run_script(resolved.payload.bytes())?;
                Ok(resolved.with_payload(Payload::Regular(output)))
            }
        }
    }

    /// Run the script with `input` on stdin, collecting stdout as the
    /// new content. stderr passes straight through to ours.
    fn run_script(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|error| Error::Exec(self.path.clone(), error))?;

        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                scope.spawn(move || {
                    // a script may exit without draining stdin
                    let _ = stdin.write_all(input);
                });
            }
            child.wait_with_output()
        })
        .map_err(|error| Error::Exec(self.path.clone(), error))?;

        if !output.status.success() {
            return Err(Error::Failed(self.path.clone(), output.status));
        }
        Ok(output.stdout)
    }
}

fn strip_script_suffix(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".holoscript")?;
    Some(path.with_file_name(stem))
}
