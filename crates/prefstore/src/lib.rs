#![doc = include_str!("../README.md")]

mod configuration;
pub use configuration::PreferencesConfiguration;
mod error;
pub use error::{PreferenceError, SerializationError, ValidationError};
mod key;
pub use key::{EntryKind, ScalarType, StringKey, TypedKey};
mod registry;
pub use registry::NamespaceRegistry;
mod serializer;
pub use serializer::Serializer;
mod store;
pub use store::{PreferenceStore, DEFAULT_KEY_ALIAS};
mod subscription;
pub use subscription::PreferenceSubscription;
mod value;
pub use value::{Scalar, ScalarValue};

pub use prefstore_crypto::{EncryptionEngine, KeyStorageConfiguration};
pub use prefstore_state::DatabaseConfiguration;
