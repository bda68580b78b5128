// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::Path;

use fs_err as fs;

use super::{suffixed, Error, UpdatedBase};

/// RPM-based distributions (Fedora, openSUSE and derivatives).
///
/// Mirrors the dpkg arrangement with `.rpmnew` standing in for
/// `.dpkg-dist` and `.rpmsave` for `.dpkg-old`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rpm;

impl Rpm {
    pub fn updated_base(&self, target: &Path) -> Result<Option<UpdatedBase>, Error> {
        let rpmnew = suffixed(target, ".rpmnew");
        let rpmsave = suffixed(target, ".rpmsave");

        if fileimage::is_manageable(&rpmsave) {
            fs::rename(target, &rpmnew)
                .map_err(|error| Error::Shuffle(target.to_owned(), rpmnew.clone(), error))?;
            fs::rename(&rpmsave, target)
                .map_err(|error| Error::Shuffle(rpmsave.clone(), target.to_owned(), error))?;
            return Ok(Some(UpdatedBase {
                reported: format!("{} (with .rpmsave)", target.display()),
                actual: rpmnew,
            }));
        }

        Ok(fileimage::is_manageable(&rpmnew).then(|| UpdatedBase::at(rpmnew)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rpmsave_layout_is_swapped_to_rpmnew() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.conf");
        let rpmsave = dir.path().join("x.conf.rpmsave");
        fs::write(&target, "vendor").unwrap();
        fs::write(&rpmsave, "admin").unwrap();

        let update = Rpm.updated_base(&target).unwrap().unwrap();
        assert_eq!(update.actual, dir.path().join("x.conf.rpmnew"));
        assert!(update.reported.ends_with("(with .rpmsave)"));
        assert_eq!(fs::read(&target).unwrap(), b"admin");
        assert_eq!(fs::read(dir.path().join("x.conf.rpmnew")).unwrap(), b"vendor");
        assert!(!rpmsave.exists());
    }
}
