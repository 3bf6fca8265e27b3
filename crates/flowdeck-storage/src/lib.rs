//! FlowDeck Storage Layer
//!
//! Two key-value tiers back the editor's persisted state:
//! - the durable tier survives restarts (SQLite `settings` table)
//! - the session tier lives only as long as the current editor session
//!
//! Both tiers are last-write-wins and are reached through [`KeyValueStore`].

mod database;
mod error;
pub mod keys;
mod migrations;
mod session;
mod store;

pub use database::Database;
pub use error::StorageError;
pub use session::SessionStore;
pub use store::{KeyValueStore, Storage};

pub type Result<T> = std::result::Result<T, StorageError>;
