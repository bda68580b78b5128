// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! In-memory snapshots of provisionable files.
//!
//! A [`FileImage`] captures everything the provisioning engine needs to
//! know about one file: its payload (regular contents or symlink
//! target), permission bits and ownership. Images are compared by
//! content and metadata, never by path, which is what lets the engine
//! shuttle the same content between the live tree and its bookkeeping
//! directories.

use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use fs_err as fs;
use nix::unistd::{fchownat, FchownatFlags, Gid, Uid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not a manageable file: {0:?}")]
    NotManageable(PathBuf),

    #[error("target exists and is not a manageable file: {0:?}")]
    RefusedOverwrite(PathBuf),

    #[error("broken symlink to {0:?}")]
    BrokenLink(PathBuf),

    #[error("missing source file: {0:?}")]
    Missing(PathBuf),

    #[error("change ownership of {0:?}")]
    Chown(PathBuf, #[source] nix::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The content of a [`FileImage`]. The variant doubles as the file
/// type bit: an image is either a regular file or a symlink, never
/// both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Byte contents of a regular file
    Regular(Vec<u8>),
    /// Target of a symlink
    Symlink(PathBuf),
}

impl Payload {
    /// The payload as raw bytes; for symlinks, the target path.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::Regular(contents) => contents,
            Payload::Symlink(target) => target.as_os_str().as_encoded_bytes(),
        }
    }
}

/// One manageable file, loaded into memory.
#[derive(Debug, Clone)]
pub struct FileImage {
    /// Logical path this image was read from (or is destined for).
    /// Not part of the image's identity.
    pub path: PathBuf,
    /// Permission bits only; the type lives in [`Payload`]
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub payload: Payload,
}

impl FileImage {
    /// Read the manageable file at `path` into memory.
    ///
    /// Returns `Ok(None)` when nothing exists at `path`; absence is a
    /// normal state for the reconciler, not an error. Anything that is
    /// neither a regular file nor a symlink fails with
    /// [`Error::NotManageable`].
    pub fn load(path: impl Into<PathBuf>, follow: bool) -> Result<Option<FileImage>, Error> {
        let path = path.into();

        let metadata = if follow {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        };
        let metadata = match metadata {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let file_type = metadata.file_type();
        let payload = if file_type.is_symlink() {
            Payload::Symlink(fs::read_link(&path)?)
        } else if file_type.is_file() {
            Payload::Regular(fs::read(&path)?)
        } else {
            return Err(Error::NotManageable(path));
        };

        Ok(Some(FileImage {
            mode: metadata.permissions().mode() & 0o7777,
            uid: metadata.uid(),
            gid: metadata.gid(),
            path,
            payload,
        }))
    }

    /// Rewrite the logical path, keeping the content.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Replace the payload (and with it the file type), keeping
    /// permission bits and ownership.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.payload, Payload::Symlink(_))
    }

    /// Follow the image's symlink chain until a regular file is
    /// reached. Identity for regular files. A relative target is
    /// interpreted against the directory of the image's path.
    pub fn resolve_symlink(self) -> Result<FileImage, Error> {
        let Payload::Symlink(target) = &self.payload else {
            return Ok(self);
        };

        let target = if target.is_absolute() {
            target.clone()
        } else {
            self.path.parent().unwrap_or(Path::new(".")).join(target)
        };

        match FileImage::load(&target, true)? {
            Some(image) => Ok(image),
            None => Err(Error::BrokenLink(target)),
        }
    }

    /// Write the image out to `dest`, replacing whatever manageable
    /// file was there before.
    ///
    /// A pre-existing destination that is not manageable is refused.
    /// This is a plain write; callers that need all-or-nothing
    /// visibility write to a sibling and rename into place.
    pub fn write(&self, dest: &Path) -> Result<(), Error> {
        match fs::symlink_metadata(dest) {
            Ok(metadata) if !manageable_type(metadata.file_type()) => {
                return Err(Error::RefusedOverwrite(dest.to_owned()));
            }
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }

        match fs::remove_file(dest) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }

        match &self.payload {
            Payload::Regular(contents) => {
                fs::write(dest, contents)?;
                // the creation mode is subject to the umask; chmod
                // explicitly to get the recorded bits
                fs::set_permissions(dest, std::fs::Permissions::from_mode(self.mode))?;
            }
            Payload::Symlink(target) => {
                fs_err::os::unix::fs::symlink(target, dest)?;
                // symlinks carry no mode of their own
            }
        }

        fchownat(
            None,
            dest,
            Some(Uid::from_raw(self.uid)),
            Some(Gid::from_raw(self.gid)),
            FchownatFlags::NoFollowSymlink,
        )
        .map_err(|errno| Error::Chown(dest.to_owned(), errno))
    }

    /// Content-and-metadata equality: type, payload, permission bits,
    /// uid and gid. Paths differ freely.
    pub fn equal_to(&self, other: &FileImage) -> bool {
        self.payload == other.payload
            && self.mode == other.mode
            && self.uid == other.uid
            && self.gid == other.gid
    }
}

/// Whether `path` names a file the engine can manage, i.e. a regular
/// file or a symlink.
pub fn is_manageable(path: impl AsRef<Path>) -> bool {
    fs::symlink_metadata(path.as_ref())
        .map(|metadata| manageable_type(metadata.file_type()))
        .unwrap_or(false)
}

fn manageable_type(file_type: std::fs::FileType) -> bool {
    file_type.is_file() || file_type.is_symlink()
}

/// Copy a manageable file, including permission bits and ownership.
pub fn copy(from: &Path, to: &Path) -> Result<(), Error> {
    let image = FileImage::load(from, false)?.ok_or_else(|| Error::Missing(from.to_owned()))?;
    image.write(to)
}

/// Like [`copy`], but removes `from` after a successful write.
pub fn move_file(from: &Path, to: &Path) -> Result<(), Error> {
    copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::os::unix::fs::symlink;

    use super::*;

    fn scratch() -> tempfile::TempDir {
        tempfile::tempdir().expect("create scratch dir")
    }

    fn write_mode(path: &Path, contents: &str, mode: u32) {
        fs::write(path, contents).unwrap();
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn load_regular_file() {
        let dir = scratch();
        let path = dir.path().join("a.conf");
        write_mode(&path, "a=1\n", 0o640);

        let image = FileImage::load(&path, false).unwrap().unwrap();
        assert_eq!(image.payload, Payload::Regular(b"a=1\n".to_vec()));
        assert_eq!(image.mode, 0o640);
        assert_eq!(image.uid, nix::unistd::getuid().as_raw());
    }

    #[test]
    fn load_absent_is_not_an_error() {
        let dir = scratch();
        assert!(FileImage::load(dir.path().join("nope"), false).unwrap().is_none());
    }

    #[test]
    fn load_directory_is_not_manageable() {
        let dir = scratch();
        assert!(matches!(
            FileImage::load(dir.path(), false),
            Err(Error::NotManageable(_))
        ));
    }

    #[test]
    fn load_symlink_keeps_target_as_payload() {
        let dir = scratch();
        let link = dir.path().join("link");
        symlink("somewhere/else", &link).unwrap();

        let image = FileImage::load(&link, false).unwrap().unwrap();
        assert_eq!(image.payload, Payload::Symlink(PathBuf::from("somewhere/else")));
    }

    #[test]
    fn resolve_relative_symlink_against_parent_dir() {
        let dir = scratch();
        write_mode(&dir.path().join("real.conf"), "real\n", 0o644);
        let link = dir.path().join("link.conf");
        symlink("real.conf", &link).unwrap();

        let image = FileImage::load(&link, false).unwrap().unwrap();
        let resolved = image.resolve_symlink().unwrap();
        assert_eq!(resolved.payload, Payload::Regular(b"real\n".to_vec()));
    }

    #[test]
    fn resolve_broken_symlink_fails() {
        let dir = scratch();
        let link = dir.path().join("link");
        symlink("gone", &link).unwrap();

        let image = FileImage::load(&link, false).unwrap().unwrap();
        assert!(matches!(image.resolve_symlink(), Err(Error::BrokenLink(_))));
    }

    #[test]
    fn write_then_reload_round_trips() {
        let dir = scratch();
        let source = dir.path().join("src");
        write_mode(&source, "payload\n", 0o600);

        let image = FileImage::load(&source, false).unwrap().unwrap();
        let dest = dir.path().join("dst");
        image.write(&dest).unwrap();

        let reloaded = FileImage::load(&dest, false).unwrap().unwrap();
        assert!(image.equal_to(&reloaded));
        assert_eq!(reloaded.mode, 0o600);
    }

    #[test]
    fn write_replaces_symlink_with_regular_file() {
        let dir = scratch();
        let dest = dir.path().join("dst");
        symlink("elsewhere", &dest).unwrap();

        let source = dir.path().join("src");
        write_mode(&source, "solid\n", 0o644);
        let image = FileImage::load(&source, false).unwrap().unwrap();

        image.write(&dest).unwrap();
        let reloaded = FileImage::load(&dest, false).unwrap().unwrap();
        assert_eq!(reloaded.payload, Payload::Regular(b"solid\n".to_vec()));
    }

    #[test]
    fn write_refuses_unmanageable_destination() {
        let dir = scratch();
        let dest = dir.path().join("subdir");
        fs::create_dir(&dest).unwrap();

        let source = dir.path().join("src");
        write_mode(&source, "x", 0o644);
        let image = FileImage::load(&source, false).unwrap().unwrap();

        assert!(matches!(image.write(&dest), Err(Error::RefusedOverwrite(_))));
        assert!(dest.is_dir());
    }

    #[test]
    fn equality_ignores_path() {
        let dir = scratch();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write_mode(&a, "same\n", 0o644);
        write_mode(&b, "same\n", 0o644);

        let left = FileImage::load(&a, false).unwrap().unwrap();
        let right = FileImage::load(&b, false).unwrap().unwrap();
        assert!(left.equal_to(&right));
    }

    #[test]
    fn equality_detects_mode_difference() {
        let dir = scratch();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write_mode(&a, "same\n", 0o644);
        write_mode(&b, "same\n", 0o600);

        let left = FileImage::load(&a, false).unwrap().unwrap();
        let right = FileImage::load(&b, false).unwrap().unwrap();
        assert!(!left.equal_to(&right));
    }

    #[test]
    fn move_file_empties_the_source() {
        let dir = scratch();
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        write_mode(&from, "hop\n", 0o644);

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"hop\n");
    }
}
