use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Database, DatabaseError, MemoryDatabase, SqliteDatabase};

/// Configuration for the database holding each namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatabaseConfiguration {
    /// One SQLite file per namespace, named `<namespace>.sqlite`
    Sqlite {
        /// Directory containing the database files. It is created if missing.
        folder_path: PathBuf,
    },

    /// Namespaces live only in memory
    #[default]
    InMemory,
}

/// Open the database for namespace `name` as described by `configuration`.
///
/// `name` is used as a file name and must not contain path separators.
pub fn open_database(
    configuration: &DatabaseConfiguration,
    name: &str,
) -> Result<Arc<dyn Database>, DatabaseError> {
    match configuration {
        DatabaseConfiguration::Sqlite { folder_path } => {
            std::fs::create_dir_all(folder_path)?;
            let path = folder_path.join(format!("{name}.sqlite"));
            debug!(namespace = name, path = %path.display(), "Opening namespace database");
            Ok(Arc::new(SqliteDatabase::open(path)?))
        }
        DatabaseConfiguration::InMemory => Ok(Arc::new(MemoryDatabase::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StoredEntry, Transaction};

    #[test]
    fn test_configuration_deserialization() {
        let config: DatabaseConfiguration =
            serde_json::from_str(r#"{"type":"sqlite","folder_path":"/tmp/prefs"}"#).unwrap();
        assert_eq!(
            config,
            DatabaseConfiguration::Sqlite {
                folder_path: PathBuf::from("/tmp/prefs")
            }
        );

        let config: DatabaseConfiguration = serde_json::from_str(r#"{"type":"in_memory"}"#).unwrap();
        assert_eq!(config, DatabaseConfiguration::InMemory);
    }

    #[tokio::test]
    async fn test_open_sqlite_creates_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder_path = dir.path().join("nested");
        let config = DatabaseConfiguration::Sqlite {
            folder_path: folder_path.clone(),
        };

        let db = open_database(&config, "settings").unwrap();
        db.commit(Transaction::new().set("k", StoredEntry::new("long", "1")))
            .await
            .unwrap();

        assert!(folder_path.join("settings.sqlite").exists());
    }
}
