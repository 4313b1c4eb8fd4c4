//! Order Counter Repository
//!
//! Per-date counter backing the human order numbers. The record key is
//! the date (YYYYMMDD), so the upsert is naturally scoped per day and
//! the counter restarts at 1 each morning.

use super::{BaseRepository, RepoError, RepoResult};
use serde::Deserialize;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const COUNTER_TABLE: &str = "order_counter";

#[derive(Debug, Deserialize)]
struct CounterRow {
    value: i64,
}

#[derive(Clone)]
pub struct OrderCounterRepository {
    base: BaseRepository,
}

impl OrderCounterRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Atomically increment and return the counter for a date key
    pub async fn next_for_date(&self, date_key: &str) -> RepoResult<i64> {
        let rid = RecordId::from_table_key(COUNTER_TABLE, date_key);
        let mut result = self
            .base
            .db()
            .query("UPSERT $id SET value = (value ?? 0) + 1 RETURN AFTER")
            .bind(("id", rid))
            .await?;
        let rows: Vec<CounterRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|r| r.value)
            .ok_or_else(|| RepoError::Database("Counter upsert returned no row".to_string()))
    }
}
