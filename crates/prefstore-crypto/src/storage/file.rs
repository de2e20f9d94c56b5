use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{validate_alias, SecureKeyStorage};
use crate::{KeyStorageError, MasterKey};

/// Stores each master key in its own file, `<folder>/<alias>.key`.
///
/// A key is written to a temporary file in the same folder, flushed, and only then linked into
/// place without replacing an existing file. Key files are therefore always complete, are
/// `0600` on Unix, and are never overwritten: when several creators race for an alias they all
/// return the key of the one that published first.
///
/// An empty key file counts as absent and is replaced by the next `create`.
#[derive(Debug, Clone)]
pub struct FileKeyStorage {
    folder_path: PathBuf,
}

impl FileKeyStorage {
    /// Create a storage rooted at `folder_path`. The folder is created on first write.
    pub fn new(folder_path: impl Into<PathBuf>) -> Self {
        Self {
            folder_path: folder_path.into(),
        }
    }

    /// The folder holding the key files.
    pub fn folder_path(&self) -> &Path {
        &self.folder_path
    }

    fn path_for_alias(&self, alias: &str) -> Result<PathBuf, KeyStorageError> {
        validate_alias(alias)?;
        Ok(self.folder_path.join(format!("{alias}.key")))
    }
}

async fn read_key(alias: &str, path: &Path) -> Result<Option<MasterKey>, KeyStorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) if contents.is_empty() => Ok(None),
        Ok(contents) => {
            let contents = Zeroizing::new(contents);
            MasterKey::from_base64(alias, &contents).map(Some)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Outcome of trying to publish a freshly generated key.
enum Publish {
    Created(MasterKey),
    AlreadyExists,
}

fn publish_new_key(folder_path: &Path, path: &Path) -> Result<Publish, KeyStorageError> {
    std::fs::create_dir_all(folder_path)?;
    let key = MasterKey::generate()?;

    // Temp files start with a dot, which aliases cannot.
    let mut file = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(folder_path)?;
    file.write_all(key.to_base64().as_bytes())?;
    file.as_file().sync_all()?;

    match file.persist_noclobber(path) {
        Ok(_) => Ok(Publish::Created(key)),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(Publish::AlreadyExists),
        Err(e) => Err(e.error.into()),
    }
}

#[async_trait::async_trait]
impl SecureKeyStorage for FileKeyStorage {
    async fn load(&self, alias: &str) -> Result<Option<MasterKey>, KeyStorageError> {
        let path = self.path_for_alias(alias)?;
        read_key(alias, &path).await
    }

    async fn create(&self, alias: &str) -> Result<MasterKey, KeyStorageError> {
        let path = self.path_for_alias(alias)?;
        if let Some(existing) = read_key(alias, &path).await? {
            return Ok(existing);
        }

        if tokio::fs::try_exists(&path).await? {
            warn!(alias, path = %path.display(), "Replacing empty master key file");
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let folder_path = self.folder_path.clone();
        let target = path.clone();
        let published = tokio::task::spawn_blocking(move || publish_new_key(&folder_path, &target))
            .await
            .map_err(|e| KeyStorageError::Backend(format!("key file task failed: {e}")))??;

        match published {
            Publish::Created(key) => {
                debug!(alias, path = %path.display(), "Created master key file");
                Ok(key)
            }
            Publish::AlreadyExists => read_key(alias, &path)
                .await?
                .ok_or_else(|| KeyStorageError::InvalidKeyMaterial(alias.to_owned())),
        }
    }

    async fn contains(&self, alias: &str) -> Result<bool, KeyStorageError> {
        let path = self.path_for_alias(alias)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path().join("keys"));

        assert!(storage.load("alias").await.unwrap().is_none());
        assert!(!storage.contains("alias").await.unwrap());

        let key = storage.create("alias").await.unwrap();
        assert!(storage.contains("alias").await.unwrap());
        assert_eq!(storage.load("alias").await.unwrap(), Some(key));
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path());

        let first = storage.create("alias").await.unwrap();
        let second = storage.create("alias").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let key = FileKeyStorage::new(dir.path()).create("alias").await.unwrap();

        let reopened = FileKeyStorage::new(dir.path());
        assert_eq!(reopened.load("alias").await.unwrap(), Some(key));
    }

    #[tokio::test]
    async fn test_corrupted_key_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alias.key"), "garbage").unwrap();

        let storage = FileKeyStorage::new(dir.path());
        assert!(matches!(
            storage.load("alias").await,
            Err(KeyStorageError::InvalidKeyMaterial(_))
        ));
    }

    #[tokio::test]
    async fn test_alias_cannot_escape_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path());
        assert!(matches!(
            storage.create("../outside").await,
            Err(KeyStorageError::InvalidAlias(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_instances_agree_on_one_key() {
        let dir = tempfile::tempdir().unwrap();

        for round in 0..50 {
            let alias = format!("alias{round}");
            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let storage = FileKeyStorage::new(dir.path());
                    let alias = alias.clone();
                    tokio::spawn(async move { storage.create(&alias).await })
                })
                .collect();

            let mut keys = Vec::new();
            for task in tasks {
                keys.push(task.await.unwrap().unwrap());
            }
            let stored = FileKeyStorage::new(dir.path()).load(&alias).await.unwrap();
            for key in &keys {
                assert_eq!(Some(key), stored.as_ref(), "round {round}");
            }
        }

        // No temporary files are left behind
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(name.to_string_lossy().ends_with(".key"), "{name:?}");
        }
    }

    #[tokio::test]
    async fn test_empty_key_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alias.key"), "").unwrap();

        let storage = FileKeyStorage::new(dir.path());
        assert!(storage.load("alias").await.unwrap().is_none());
        assert!(!storage.contains("alias").await.unwrap());

        let key = storage.create("alias").await.unwrap();
        assert!(storage.contains("alias").await.unwrap());
        assert_eq!(storage.load("alias").await.unwrap(), Some(key.clone()));
        assert_eq!(storage.create("alias").await.unwrap(), key);
    }

    #[tokio::test]
    async fn test_engine_recovers_from_empty_key_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alias.key"), "").unwrap();

        let engine = crate::EncryptionEngine::new(std::sync::Arc::new(FileKeyStorage::new(dir.path())));
        let envelope = engine.encrypt("alias", "x").await.unwrap();
        assert_eq!(engine.decrypt("alias", &envelope).await.unwrap(), "x");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path());
        storage.create("alias").await.unwrap();

        let metadata = std::fs::metadata(dir.path().join("alias.key")).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }
}
