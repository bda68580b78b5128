// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::{Path, PathBuf};

use fs_err as fs;

use super::{suffixed, UpdatedBase};

/// Pacman/libALPM-based distributions (Arch Linux and derivatives).
///
/// Pacman writes the vendor version of an admin-modified file to
/// `FILE.pacnew`, and backs up a modified file of a removed package as
/// `FILE.pacsave` (or `FILE.pacsave.N` when several pile up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacman;

impl Pacman {
    pub fn updated_base(&self, target: &Path) -> Option<UpdatedBase> {
        let pacnew = suffixed(target, ".pacnew");
        fileimage::is_manageable(&pacnew).then(|| UpdatedBase::at(pacnew))
    }

    pub fn cleanup_targets(&self, target: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();

        let pacsave = suffixed(target, ".pacsave");
        if fileimage::is_manageable(&pacsave) {
            found.push(pacsave);
        }

        // numbered backups: FILE.pacsave.1, FILE.pacsave.2, ...
        let Some(dir) = target.parent() else {
            return found;
        };
        let Some(name) = target.file_name().and_then(|name| name.to_str()) else {
            return found;
        };
        let prefix = format!("{name}.pacsave.");

        let Ok(entries) = fs::read_dir(dir) else {
            return found;
        };
        let mut numbered = Vec::new();
        for entry in entries.flatten() {
            let entry_name = entry.file_name();
            let Some(counter) = entry_name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if counter.parse::<u64>().is_err() {
                continue;
            }
            if !entry
                .file_type()
                .map(|t| t.is_file() || t.is_symlink())
                .unwrap_or(false)
            {
                continue;
            }
            numbered.push(dir.join(entry_name));
        }
        numbered.sort();
        found.extend(numbered);

        found
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cleanup_finds_pacsave_and_numbered_backups() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.conf");
        for name in ["x.conf.pacsave", "x.conf.pacsave.1", "x.conf.pacsave.2"] {
            fs::write(dir.path().join(name), "saved").unwrap();
        }
        // not numeric, not a backup
        fs::write(dir.path().join("x.conf.pacsave.old"), "junk").unwrap();

        let found = Pacman.cleanup_targets(&target);
        assert_eq!(
            found,
            vec![
                dir.path().join("x.conf.pacsave"),
                dir.path().join("x.conf.pacsave.1"),
                dir.path().join("x.conf.pacsave.2"),
            ]
        );
    }

    #[test]
    fn cleanup_without_backups_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Pacman.cleanup_targets(&dir.path().join("x.conf")).is_empty());
    }

    #[test]
    fn pacnew_is_reported_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.conf");
        let pacnew = dir.path().join("x.conf.pacnew");
        fs::write(&pacnew, "new").unwrap();

        let update = Pacman.updated_base(&target).unwrap();
        assert_eq!(update.actual, pacnew);
        assert_eq!(update.reported, pacnew.display().to_string());
    }
}
