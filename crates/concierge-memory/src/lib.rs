//! Concierge memory crate - per-client session profiles and their storage.
//!
//! `SessionMemory` owns the profile lifecycle (load, append, merge, save,
//! clear) on top of a pluggable [`ProfileStore`]: one JSON file per client,
//! a WAL-mode SQLite table, or a process-local map for tests.

pub mod db;
pub mod migrations;
pub mod preferences;
pub mod session;
pub mod store;

pub use db::Database;
pub use preferences::PreferenceExtractor;
pub use session::{SessionMemory, MAX_DISCUSSED_ITEMS};
pub use store::{
    open_profile_store, FileProfileStore, InMemoryProfileStore, ProfileStore, SqliteProfileStore,
};
