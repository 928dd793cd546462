//! The file trash: a directory of files addressed by the SHA-1 hash of their
//! content, as the host LMS keeps them after they were deleted from a course.

use std::{io, path::{Path, PathBuf}};

use sha1::{Digest as _, Sha1};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct FilesConfig {
    /// Root of the file trash. Relative paths are relative to the config file.
    #[config(default = "trashdir")]
    pub(crate) trash_dir: PathBuf,
}

/// Computes the content hash under which `bytes` would be stored.
pub(crate) fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Trash directory with layout `<root>/<h[0..2]>/<h[2..4]>/<h>`.
#[derive(Debug, Clone)]
pub(crate) struct TrashDir {
    root: PathBuf,
}

impl TrashDir {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn from_config(config: &FilesConfig) -> Self {
        Self::new(&config.trash_dir)
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file with the given hash. Fails if `hash` is not a SHA-1
    /// hash in lowercase hex.
    pub(crate) fn path_of(&self, hash: &str) -> Result<PathBuf> {
        let valid = hash.len() == 40
            && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            bail!("invalid content hash '{hash}' (expected 40 lowercase hex digits)");
        }

        Ok(self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash))
    }

    pub(crate) async fn contains(&self, hash: &str) -> Result<bool> {
        let path = self.path_of(hash)?;
        tokio::fs::try_exists(&path).await
            .with_context(|| format!("failed to check '{}'", path.display()))
    }

    /// Deletes the file with the given hash. Returns `false` if there was no
    /// such file.
    pub(crate) async fn delete(&self, hash: &str) -> Result<bool> {
        let path = self.path_of(hash)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted '{}' from trash", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(format!("failed to delete '{}'", path.display())),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{content_hash, TrashDir};

    const HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    async fn trash_with_hello() -> (tempfile::TempDir, TrashDir) {
        let dir = tempfile::tempdir().unwrap();
        let trash = TrashDir::new(dir.path());
        let path = trash.path_of(HELLO).unwrap();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "hello").await.unwrap();
        (dir, trash)
    }

    #[test]
    fn hashes() {
        assert_eq!(content_hash(b"hello"), HELLO);
        assert_eq!(content_hash(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn layout() {
        let trash = TrashDir::new("/var/trash");
        assert_eq!(
            trash.path_of(HELLO).unwrap(),
            std::path::Path::new("/var/trash/aa/f4").join(HELLO),
        );
    }

    #[test]
    fn invalid_hashes() {
        let trash = TrashDir::new("/var/trash");
        assert!(trash.path_of("").is_err());
        assert!(trash.path_of("../../etc/passwd").is_err());
        assert!(trash.path_of(&HELLO.to_uppercase()).is_err());
        assert!(trash.path_of(&HELLO[1..]).is_err());
        assert!(trash.path_of(&format!("{HELLO}0")).is_err());
    }

    #[tokio::test]
    async fn contains_and_delete() {
        let (_dir, trash) = trash_with_hello().await;
        let other = content_hash(b"other");

        assert!(trash.contains(HELLO).await.unwrap());
        assert!(!trash.contains(&other).await.unwrap());

        assert!(trash.delete(HELLO).await.unwrap());
        assert!(!trash.contains(HELLO).await.unwrap());
        assert!(!trash.delete(HELLO).await.unwrap());
        assert!(!trash.delete(&other).await.unwrap());
    }
}
