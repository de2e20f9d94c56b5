//! Integration tests for encrypted preferences

use std::{sync::Arc, time::Duration};

use prefstore::{
    DatabaseConfiguration, KeyStorageConfiguration, NamespaceRegistry, PreferenceError,
    PreferenceStore, PreferencesConfiguration, StringKey, TypedKey, DEFAULT_KEY_ALIAS,
};
use prefstore_crypto::{
    DecryptionError, EncryptedEnvelope, EncryptionEngine, InMemoryKeyStorage, KeyState,
};
use prefstore_state::{Database, MemoryDatabase, SqliteDatabase, StoredEntry, Transaction};

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn store_over(database: Arc<dyn Database>) -> PreferenceStore {
    PreferenceStore::new(
        "secure",
        database,
        Arc::new(EncryptionEngine::new(Arc::new(InMemoryKeyStorage::new()))),
        DEFAULT_KEY_ALIAS,
    )
}

#[tokio::test]
async fn persisted_envelope_never_contains_plaintext() {
    const SECRET: &str = "abc123-session-secret";
    let dir = tempfile::tempdir().unwrap();
    let database: Arc<dyn Database> =
        Arc::new(SqliteDatabase::open(dir.path().join("secure.sqlite")).unwrap());
    let store = store_over(database.clone());

    store.set_encrypted_data(&StringKey::new("token"), SECRET).await.unwrap();

    let snapshot = database.snapshot();
    let entry = snapshot.get("token").unwrap();
    assert_eq!(entry.tag(), "encrypted");
    assert!(entry.payload().starts_with("1.12|"));
    assert!(!entry.payload().contains(SECRET));

    for file in std::fs::read_dir(dir.path()).unwrap() {
        let bytes = std::fs::read(file.unwrap().path()).unwrap();
        assert!(!contains(&bytes, SECRET.as_bytes()));
    }

    let mut sub = store.get_encrypted_data(&StringKey::new("token")).unwrap();
    assert_eq!(sub.next().await.unwrap().unwrap(), Some(SECRET.to_owned()));
}

#[tokio::test]
async fn same_plaintext_encrypts_differently() {
    let database: Arc<dyn Database> = Arc::new(MemoryDatabase::new());
    let store = store_over(database.clone());

    store.set_encrypted_data(&StringKey::new("a"), "abc123").await.unwrap();
    store.set_encrypted_data(&StringKey::new("b"), "abc123").await.unwrap();

    let snapshot = database.snapshot();
    assert_ne!(
        snapshot.get("a").unwrap().payload(),
        snapshot.get("b").unwrap().payload()
    );
}

#[tokio::test]
async fn tampered_envelope_fails_authentication() {
    let database: Arc<dyn Database> = Arc::new(MemoryDatabase::new());
    let store = store_over(database.clone());
    let token = StringKey::new("token");
    let other = StringKey::new("other");

    store.set_encrypted_data(&token, "abc123").await.unwrap();
    store.set_encrypted_data(&other, "untouched").await.unwrap();

    let original: EncryptedEnvelope = database
        .snapshot()
        .get("token")
        .unwrap()
        .payload()
        .parse()
        .unwrap();
    let bytes = original.to_bytes();

    for index in 0..bytes.len() {
        let mut tampered = bytes.clone();
        tampered[index] ^= 0x01;
        let envelope = EncryptedEnvelope::from_bytes(original.format(), &tampered).unwrap();
        database
            .commit(Transaction::new().set(
                "token",
                StoredEntry::new("encrypted", envelope.to_string()),
            ))
            .await
            .unwrap();

        let mut sub = store.get_encrypted_data(&token).unwrap();
        assert!(
            matches!(
                sub.next().await,
                Some(Err(PreferenceError::Decryption(
                    DecryptionError::AuthenticationFailure
                )))
            ),
            "byte {index}"
        );
        assert!(sub.next().await.is_none());
    }

    let mut sub = store.get_encrypted_data(&other).unwrap();
    assert_eq!(sub.next().await.unwrap().unwrap(), Some("untouched".to_owned()));
}

#[tokio::test]
async fn corrupted_envelope_only_errors_its_own_subscription() {
    let database: Arc<dyn Database> = Arc::new(MemoryDatabase::new());
    let store = store_over(database.clone());
    let token = StringKey::new("token");
    let other = StringKey::new("other");
    store.set_encrypted_data(&token, "abc123").await.unwrap();
    store.set_encrypted_data(&other, "fine").await.unwrap();

    let mut token_sub = store.get_encrypted_data(&token).unwrap();
    let mut other_sub = store.get_encrypted_data(&other).unwrap();
    assert_eq!(token_sub.next().await.unwrap().unwrap(), Some("abc123".to_owned()));
    assert_eq!(other_sub.next().await.unwrap().unwrap(), Some("fine".to_owned()));

    database
        .commit(Transaction::new().set("token", StoredEntry::new("encrypted", "1.12|garbage")))
        .await
        .unwrap();

    assert!(matches!(
        token_sub.next().await,
        Some(Err(PreferenceError::Decryption(
            DecryptionError::MalformedEnvelope(_)
        )))
    ));
    assert!(
        tokio::time::timeout(Duration::from_millis(20), other_sub.next())
            .await
            .is_err(),
        "unrelated subscription should not be notified"
    );

    store.set_encrypted_data(&other, "still fine").await.unwrap();
    assert_eq!(
        other_sub.next().await.unwrap().unwrap(),
        Some("still fine".to_owned())
    );
}

#[tokio::test]
async fn restart_reads_previous_values() {
    let dir = tempfile::tempdir().unwrap();
    let configuration = PreferencesConfiguration {
        database: DatabaseConfiguration::Sqlite {
            folder_path: dir.path().join("prefs"),
        },
        key_storage: KeyStorageConfiguration::File {
            folder_path: dir.path().join("keys"),
        },
        ..Default::default()
    };

    {
        let registry = NamespaceRegistry::new(configuration.clone());
        let store = registry.open("account").unwrap();
        store
            .set_encrypted_data(&StringKey::new("token"), "abc123")
            .await
            .unwrap();
        store.set_data(&TypedKey::int("launches"), 3).await.unwrap();
    }

    let registry = NamespaceRegistry::new(configuration);
    let store = registry.open("account").unwrap();
    assert_eq!(registry.engine().key_state(DEFAULT_KEY_ALIAS), KeyState::Absent);

    let mut token = store.get_encrypted_data(&StringKey::new("token")).unwrap();
    assert_eq!(token.next().await.unwrap().unwrap(), Some("abc123".to_owned()));
    assert_eq!(registry.engine().key_state(DEFAULT_KEY_ALIAS), KeyState::Present);

    let mut launches = store.get_data::<i32>(&TypedKey::int("launches")).unwrap();
    assert_eq!(launches.next().await.unwrap().unwrap(), Some(3));
}

#[tokio::test]
async fn missing_master_key_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let database = DatabaseConfiguration::Sqlite {
        folder_path: dir.path().to_owned(),
    };

    {
        let registry = NamespaceRegistry::new(PreferencesConfiguration {
            database: database.clone(),
            ..Default::default()
        });
        registry
            .open("account")
            .unwrap()
            .set_encrypted_data(&StringKey::new("token"), "abc123")
            .await
            .unwrap();
    }

    // The in-memory master key did not survive, the envelope did
    let registry = NamespaceRegistry::new(PreferencesConfiguration {
        database,
        ..Default::default()
    });
    let mut token = registry
        .open("account")
        .unwrap()
        .get_encrypted_data(&StringKey::new("token"))
        .unwrap();
    assert!(matches!(
        token.next().await,
        Some(Err(PreferenceError::Encryption(
            prefstore_crypto::EncryptionError::KeyUnavailable(alias)
        ))) if alias == DEFAULT_KEY_ALIAS
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_creates_one_key() {
    let storage = Arc::new(InMemoryKeyStorage::new());
    let engine = Arc::new(EncryptionEngine::new(storage.clone()));
    let registry = NamespaceRegistry::with_engine(PreferencesConfiguration::default(), engine);
    let first = registry.open("first").unwrap();
    let second = registry.open("second").unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = if i % 2 == 0 { first.clone() } else { second.clone() };
            tokio::spawn(async move {
                store
                    .set_encrypted_data(&StringKey::named(format!("secret_{i}")), format!("value {i}"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(storage.generated_keys(), 1);
    assert_eq!(registry.engine().key_state(DEFAULT_KEY_ALIAS), KeyState::Present);

    for i in 0..16 {
        let store = if i % 2 == 0 { &first } else { &second };
        let mut sub = store
            .get_encrypted_data(&StringKey::named(format!("secret_{i}")))
            .unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), Some(format!("value {i}")));
    }
}

#[tokio::test]
async fn clearing_the_store_keeps_the_master_key() {
    let storage = Arc::new(InMemoryKeyStorage::new());
    let engine = Arc::new(EncryptionEngine::new(storage.clone()));
    let store = PreferenceStore::new(
        "secure",
        Arc::new(MemoryDatabase::new()),
        engine.clone(),
        DEFAULT_KEY_ALIAS,
    );

    store.set_encrypted_data(&StringKey::new("token"), "abc123").await.unwrap();
    store.clear_data_store().await.unwrap();
    store.set_encrypted_data(&StringKey::new("token"), "def456").await.unwrap();

    assert_eq!(storage.generated_keys(), 1);
    assert_eq!(engine.key_state(DEFAULT_KEY_ALIAS), KeyState::Present);
}

#[tokio::test]
async fn encrypted_entry_can_be_removed() {
    let store = store_over(Arc::new(MemoryDatabase::new()));
    let token = StringKey::new("token");
    store.set_encrypted_data(&token, "abc123").await.unwrap();
    store.remove_preference(token.as_typed()).await.unwrap();

    let mut sub = store.get_encrypted_data(&token).unwrap();
    assert_eq!(sub.next().await.unwrap().unwrap(), None);
}
