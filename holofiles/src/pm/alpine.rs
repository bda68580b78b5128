// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::Path;

use super::{suffixed, UpdatedBase};

/// apk-based distributions (Alpine Linux and derivatives).
///
/// apk writes the vendor version of an admin-modified file to
/// `FILE.apk-new` and keeps no backups of removed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alpine;

impl Alpine {
    pub fn updated_base(&self, target: &Path) -> Option<UpdatedBase> {
        let apknew = suffixed(target, ".apk-new");
        fileimage::is_manageable(&apknew).then(|| UpdatedBase::at(apknew))
    }
}
