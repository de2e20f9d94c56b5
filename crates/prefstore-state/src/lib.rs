#![doc = include_str!("../README.md")]

mod configuration;
pub use configuration::{open_database, DatabaseConfiguration};
mod database;
pub use database::{Database, DatabaseError};
mod memory;
pub use memory::MemoryDatabase;
mod snapshot;
pub use snapshot::{Mutation, Snapshot, StoredEntry, Transaction};
mod sqlite;
pub use sqlite::SqliteDatabase;
