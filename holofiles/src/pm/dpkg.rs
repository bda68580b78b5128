// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::Path;

use fs_err as fs;

use super::{suffixed, Error, UpdatedBase};

/// dpkg-based distributions (Debian and derivatives).
///
/// dpkg has two layouts for a conflicting config file: either the
/// vendor version is parked at `FILE.dpkg-dist` next to the admin's
/// `FILE`, or the vendor version took over `FILE` and the admin's copy
/// was moved to `FILE.dpkg-old`. The second layout is normalized into
/// the first so the reconciler only ever sees one arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dpkg;

impl Dpkg {
    pub fn updated_base(&self, target: &Path) -> Result<Option<UpdatedBase>, Error> {
        let dist = suffixed(target, ".dpkg-dist");
        let old = suffixed(target, ".dpkg-old");

        if fileimage::is_manageable(&old) {
            // vendor version sits at the live path; swap back. Plain
            // renames: a crash in between leaves both suffixed files
            // present and the live path empty, which is diagnosable.
            fs::rename(target, &dist)
                .map_err(|error| Error::Shuffle(target.to_owned(), dist.clone(), error))?;
            fs::rename(&old, target)
                .map_err(|error| Error::Shuffle(old.clone(), target.to_owned(), error))?;
            return Ok(Some(UpdatedBase {
                reported: format!("{} (with .dpkg-old)", target.display()),
                actual: dist,
            }));
        }

        Ok(fileimage::is_manageable(&dist).then(|| UpdatedBase::at(dist)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_dist_file_is_reported_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.conf");
        let dist = dir.path().join("x.conf.dpkg-dist");
        fs::write(&target, "admin").unwrap();
        fs::write(&dist, "vendor").unwrap();

        let update = Dpkg.updated_base(&target).unwrap().unwrap();
        assert_eq!(update.actual, dist);
        assert_eq!(update.reported, dist.display().to_string());
    }

    #[test]
    fn dpkg_old_layout_is_swapped_to_dist() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.conf");
        let old = dir.path().join("x.conf.dpkg-old");
        fs::write(&target, "vendor").unwrap();
        fs::write(&old, "admin").unwrap();

        let update = Dpkg.updated_base(&target).unwrap().unwrap();
        assert_eq!(update.actual, dir.path().join("x.conf.dpkg-dist"));
        assert!(update.reported.ends_with("(with .dpkg-old)"));

        // admin version is back at the live path, vendor version at
        // the dist suffix, the old suffix is gone
        assert_eq!(fs::read(&target).unwrap(), b"admin");
        assert_eq!(fs::read(dir.path().join("x.conf.dpkg-dist")).unwrap(), b"vendor");
        assert!(!old.exists());
    }

    #[test]
    fn nothing_to_find() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Dpkg.updated_base(&dir.path().join("x.conf")).unwrap().is_none());
    }
}
