//! Local persistence: short-term cache (DashMap) and long-term Sled DB.
//!
//! Profile and blueprint live as JSON blobs under fixed keys. Writes are
//! last-write-wins, no versioning; the cache is checked before Sled.

use crate::error::CoreResult;
use crate::shared::{RestorationBlueprint, UserProfile};
use dashmap::DashMap;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_VAULT_PATH: &str = "./data/solace_vault";

/// Key holding the serialized `UserProfile`.
pub const PROFILE_KEY: &str = "solace/profile";

/// Key holding the serialized `RestorationBlueprint`.
pub const BLUEPRINT_KEY: &str = "solace/blueprint";

/// Manages the hot cache and long-term Sled storage.
pub struct MemoryStore {
    db: Db,
    /// Hot cache: key -> value. Checked before Sled.
    cache: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Opens or creates the Sled database at `./data/solace_vault`.
    pub fn new() -> Result<Self, sled::Error> {
        Self::open_path(DEFAULT_VAULT_PATH)
    }

    /// Opens or creates a Sled database at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            cache: Arc::new(DashMap::new()),
        })
    }

    /// Persists a value under the given key, in both cache and Sled.
    pub fn save_path(&self, key: &str, value: &[u8]) -> Result<(), sled::Error> {
        self.db.insert(key.as_bytes(), value)?;
        self.cache.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    /// Retrieves a value. Checks the hot cache first, then Sled.
    pub fn get_path(&self, key: &str) -> Result<Option<Vec<u8>>, sled::Error> {
        if let Some(v) = self.cache.get(key) {
            return Ok(Some(v.clone()));
        }
        let out = self.db.get(key.as_bytes())?.map(|iv| iv.to_vec());
        if let Some(ref vec) = out {
            self.cache.insert(key.to_string(), vec.clone());
        }
        Ok(out)
    }

    /// Persist the profile as a JSON blob.
    pub fn save_profile(&self, profile: &UserProfile) -> CoreResult<()> {
        let blob = serde_json::to_vec(profile)?;
        self.save_path(PROFILE_KEY, &blob)?;
        Ok(())
    }

    /// Load the persisted profile, if any.
    pub fn load_profile(&self) -> CoreResult<Option<UserProfile>> {
        match self.get_path(PROFILE_KEY)? {
            Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
            None => Ok(None),
        }
    }

    /// Persist the blueprint as a JSON blob, replacing any previous version.
    pub fn save_blueprint(&self, blueprint: &RestorationBlueprint) -> CoreResult<()> {
        let blob = serde_json::to_vec(blueprint)?;
        self.save_path(BLUEPRINT_KEY, &blob)?;
        Ok(())
    }

    /// Load the persisted blueprint, if any.
    pub fn load_blueprint(&self) -> CoreResult<Option<RestorationBlueprint>> {
        match self.get_path(BLUEPRINT_KEY)? {
            Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
            None => Ok(None),
        }
    }
}
