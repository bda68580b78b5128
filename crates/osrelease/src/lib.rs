// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Parser for the restricted shell-variable subset of os-release(5).
//!
//! os-release files look like shell scripts but are defined to be a
//! much smaller language: `KEY=VALUE` assignments, one per line, with
//! optional single or double quoting and backslash escapes. Comments
//! and blank lines are ignored, as is any line without a `=`.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("read os-release")]
    Read(#[source] io::Error),
}

/// The parsed variables of an os-release(5) file.
#[derive(Debug, Default, Clone)]
pub struct OsRelease {
    variables: BTreeMap<String, String>,
}

impl OsRelease {
    /// Read `<root>/etc/os-release`, falling back to
    /// `<root>/usr/lib/os-release` when the former doesn't exist.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let contents = match std::fs::read_to_string(root.join("etc/os-release")) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                std::fs::read_to_string(root.join("usr/lib/os-release")).map_err(Error::Read)?
            }
            Err(error) => return Err(Error::Read(error)),
        };
        Ok(Self::parse(&contents))
    }

    pub fn parse(input: &str) -> Self {
        let mut variables = BTreeMap::new();

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            variables.insert(key.to_owned(), unquote(value));
        }

        Self { variables }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// The set of distribution tags this system identifies as, drawn
    /// from `ID=` (single value) and `ID_LIKE=` (space-separated).
    pub fn ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        if let Some(id) = self.get("ID") {
            ids.insert(id.to_owned());
        }
        if let Some(id_like) = self.get("ID_LIKE") {
            ids.extend(id_like.split(' ').filter(|id| !id.is_empty()).map(str::to_owned));
        }
        ids
    }
}

/// Strip one level of matching quotes, then collapse backslash pairs
/// to the escaped character.
fn unquote(value: &str) -> String {
    let value = strip_matching(value, '"').or_else(|| strip_matching(value, '\'')).unwrap_or(value);

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn strip_matching(value: &str, quote: char) -> Option<&str> {
    // a lone quote character is not a quoted empty string
    if value.len() < 2 {
        return None;
    }
    value.strip_prefix(quote)?.strip_suffix(quote)
}
