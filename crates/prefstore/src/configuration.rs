use prefstore_crypto::KeyStorageConfiguration;
use prefstore_state::DatabaseConfiguration;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_KEY_ALIAS;

/// Configuration for a [NamespaceRegistry](crate::NamespaceRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesConfiguration {
    /// Where namespace databases live
    #[serde(default)]
    pub database: DatabaseConfiguration,

    /// Where master keys live
    #[serde(default)]
    pub key_storage: KeyStorageConfiguration,

    /// Alias of the master key protecting encrypted values
    #[serde(default = "default_key_alias")]
    pub key_alias: String,
}

fn default_key_alias() -> String {
    DEFAULT_KEY_ALIAS.to_owned()
}

impl Default for PreferencesConfiguration {
    fn default() -> Self {
        Self {
            database: DatabaseConfiguration::default(),
            key_storage: KeyStorageConfiguration::default(),
            key_alias: default_key_alias(),
        }
    }
}
