use std::collections::BTreeMap;

/// The persisted form of one value: a type tag and its text payload.
///
/// The storage engines do not interpret either field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    tag: String,
    payload: String,
}

impl StoredEntry {
    /// Create an entry from its tag and payload.
    pub fn new(tag: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            payload: payload.into(),
        }
    }

    /// The type tag written alongside the payload.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The encoded value.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// An immutable view of every entry in a namespace at one point in the commit history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, StoredEntry>,
}

impl Snapshot {
    /// Look up the entry stored under `key`.
    pub fn get(&self, key: &str) -> Option<&StoredEntry> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the namespace holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn from_entries(entries: BTreeMap<String, StoredEntry>) -> Self {
        Self { entries }
    }

    pub(crate) fn apply(&mut self, transaction: &Transaction) {
        for mutation in &transaction.mutations {
            match mutation {
                Mutation::Set { key, entry } => {
                    self.entries.insert(key.clone(), entry.clone());
                }
                Mutation::Remove { key } => {
                    self.entries.remove(key);
                }
                Mutation::Clear => self.entries.clear(),
            }
        }
    }
}

/// One change inside a [Transaction].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or overwrite the entry under `key`.
    Set {
        /// Key to write
        key: String,
        /// New entry
        entry: StoredEntry,
    },
    /// Delete the entry under `key`, if any.
    Remove {
        /// Key to delete
        key: String,
    },
    /// Delete every entry.
    Clear,
}

/// An ordered list of mutations committed as a unit.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    mutations: Vec<Mutation>,
}

impl Transaction {
    /// Start an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`.
    pub fn set(mut self, key: impl Into<String>, entry: StoredEntry) -> Self {
        self.mutations.push(Mutation::Set {
            key: key.into(),
            entry,
        });
        self
    }

    /// Delete `key`.
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.mutations.push(Mutation::Remove { key: key.into() });
        self
    }

    /// Delete every entry.
    pub fn clear(mut self) -> Self {
        self.mutations.push(Mutation::Clear);
        self
    }

    /// The mutations, in application order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Whether the transaction holds no mutations.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}
