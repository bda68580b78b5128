// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Enumeration of the complete entity set.
//!
//! Two walks build the picture: the resource repository yields the
//! provisionable entities, and the `state/base` archive yields the
//! orphans: targets we once touched whose overlays have since been
//! deleted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::entity::Entity;
use crate::resource::Resource;
use crate::runtime::Runtime;

#[derive(Debug, Error)]
pub enum Error {
    #[error("walk resource tree")]
    Resources(#[source] walkdir::Error),

    #[error("walk base tree")]
    Base(#[source] walkdir::Error),
}

/// Build the sorted entity set for this runtime.
pub fn scan(runtime: &Runtime) -> Result<Vec<Entity>, Error> {
    let mut entities: BTreeMap<PathBuf, Entity> = BTreeMap::new();

    // resources: only files below a disambiguator directory count
    let resource_dir = &runtime.resource_dir;
    if resource_dir.is_dir() {
        for entry in WalkDir::new(resource_dir).min_depth(1) {
            let entry = entry.map_err(Error::Resources)?;
            if !manageable(&entry) || entry.depth() < 2 {
                continue;
            }
            let Some(resource) = Resource::from_path(resource_dir, entry.path()) else {
                continue;
            };
            entities
                .entry(resource.target().to_owned())
                .or_insert_with(|| Entity::new(resource.target()))
                .add_resource(resource);
        }
    }

    // base records without a matching resource are orphans
    let base_dir = runtime.base_dir();
    if base_dir.is_dir() {
        for entry in WalkDir::new(&base_dir).min_depth(1) {
            let entry = entry.map_err(Error::Base)?;
            if !manageable(&entry) {
                continue;
            }
            let rel = rel_to(entry.path(), &base_dir);
            entities.entry(rel.clone()).or_insert_with(|| Entity::new(rel));
        }
    }

    let mut entities = entities.into_values().collect::<Vec<_>>();
    entities.sort_by_key(Entity::id);
    Ok(entities)
}

fn manageable(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || file_type.is_symlink()
}

fn rel_to(path: &Path, dir: &Path) -> PathBuf {
    path.strip_prefix(dir).unwrap_or(path).to_owned()
}

#[cfg(test)]
mod test {
    use fs_err as fs;

    use super::*;

    fn runtime(tmp: &Path) -> Runtime {
        Runtime::new(
            tmp.join("root"),
            tmp.join("resources"),
            tmp.join("state"),
            tmp.join("cache"),
        )
    }

    fn place(path: PathBuf, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn resources_group_by_target() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = runtime(tmp.path());
        place(runtime.resource_dir.join("10-a/etc/x.conf"), "one");
        place(runtime.resource_dir.join("20-b/etc/x.conf"), "two");
        place(runtime.resource_dir.join("10-a/etc/y.conf"), "other");

        let entities = scan(&runtime).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].id(), "file:/etc/x.conf");
        assert_eq!(entities[0].resources().len(), 2);
        assert_eq!(entities[1].id(), "file:/etc/y.conf");
    }

    #[test]
    fn files_in_resource_root_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = runtime(tmp.path());
        place(runtime.resource_dir.join("README"), "not a resource");

        assert!(scan(&runtime).unwrap().is_empty());
    }

    #[test]
    fn base_records_without_resources_become_orphans() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = runtime(tmp.path());
        place(runtime.base_path("etc/old.conf"), "pristine");

        let entities = scan(&runtime).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id(), "file:/etc/old.conf");
        assert!(entities[0].is_orphan());
    }

    #[test]
    fn base_record_with_resource_is_not_an_orphan() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = runtime(tmp.path());
        place(runtime.resource_dir.join("10-a/etc/x.conf"), "one");
        place(runtime.base_path("etc/x.conf"), "pristine");

        let entities = scan(&runtime).unwrap();
        assert_eq!(entities.len(), 1);
        assert!(!entities[0].is_orphan());
    }

    #[test]
    fn missing_directories_scan_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan(&runtime(tmp.path())).unwrap().is_empty());
    }

    #[test]
    fn entities_sort_by_identifier() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = runtime(tmp.path());
        place(runtime.resource_dir.join("10-a/etc/zz.conf"), "z");
        place(runtime.resource_dir.join("10-a/etc/aa.conf"), "a");
        place(runtime.base_path("etc/mm.conf"), "m");

        let ids = scan(&runtime)
            .unwrap()
            .iter()
            .map(Entity::id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["file:/etc/aa.conf", "file:/etc/mm.conf", "file:/etc/zz.conf"]);
    }
}
