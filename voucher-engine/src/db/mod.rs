//! Database Module
//!
//! Embedded SurrealDB handle plus models and repositories for the
//! purchase aggregate (order, items, ledger), the catalog cost-basis
//! store and the per-store provider credentials.

pub mod models;
pub mod repository;

use shared::error::AppError;
use std::path::Path;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

const NAMESPACE: &str = "voucher";
const DATABASE: &str = "engine";

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct Database {
    db: Surreal<Db>,
}

impl Database {
    /// Open an on-disk database (RocksDB backend)
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(path.as_ref())
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;
        Self::init(db).await
    }

    /// Open an in-memory database (tests and ephemeral runs)
    pub async fn open_in_memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::database(format!("Failed to open in-memory database: {e}")))?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;
        tracing::info!(ns = NAMESPACE, db = DATABASE, "Database ready");
        Ok(Self { db })
    }

    pub fn handle(&self) -> &Surreal<Db> {
        &self.db
    }
}
