//! Storage accessor shared by the persistence controller

use crate::database::Database;
use crate::session::SessionStore;
use crate::Result;

/// String key/value access to one storage tier.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_setting(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_setting(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_setting(key)
    }
}

/// Both storage tiers, durable and session-scoped.
#[derive(Debug, Clone)]
pub struct Storage {
    durable: Database,
    session: SessionStore,
}

impl Storage {
    pub fn new(durable: Database, session: SessionStore) -> Self {
        Self { durable, session }
    }

    /// In-memory durable tier plus a fresh session tier.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, SessionStore::new()))
    }

    pub fn durable(&self) -> &Database {
        &self.durable
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }
}
