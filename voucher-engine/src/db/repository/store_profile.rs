//! Store Profile Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::StoreProfile;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const STORE_TABLE: &str = "store_profile";

#[derive(Clone)]
pub struct StoreProfileRepository {
    base: BaseRepository,
}

impl StoreProfileRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn record_id(store_key: &str) -> RecordId {
        RecordId::from_table_key(STORE_TABLE, store_key)
    }

    /// Written by the store-management surface; keyed by store_key
    pub async fn upsert(&self, profile: StoreProfile) -> RepoResult<StoreProfile> {
        let rid = Self::record_id(&profile.store_key);
        let stored = StoreProfile {
            id: None,
            ..profile
        };
        let upserted: Option<StoreProfile> =
            self.base.db().upsert(rid).content(stored).await?;
        upserted.ok_or_else(|| RepoError::Database("Failed to upsert store profile".to_string()))
    }

    pub async fn find_by_key(&self, store_key: &str) -> RepoResult<Option<StoreProfile>> {
        let profile: Option<StoreProfile> =
            self.base.db().select(Self::record_id(store_key)).await?;
        Ok(profile)
    }

    pub async fn get(&self, store_key: &str) -> RepoResult<StoreProfile> {
        self.find_by_key(store_key)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Store profile {store_key}")))
    }
}
