//! Repository Module
//!
//! CRUD and domain queries over the embedded SurrealDB tables.
//!
//! ID convention: callers pass ids as `"table:key"` strings; the
//! helpers below parse them back into `RecordId`s and reject ids that
//! point at the wrong table.

pub mod catalog_price;
pub mod order_counter;
pub mod purchase_item;
pub mod purchase_order;
pub mod store_profile;
pub mod voucher_detail;

pub use catalog_price::CatalogPriceRepository;
pub use order_counter::OrderCounterRepository;
pub use purchase_item::PurchaseItemRepository;
pub use purchase_order::PurchaseOrderRepository;
pub use store_profile::StoreProfileRepository;
pub use voucher_detail::VoucherDetailRepository;

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for shared::error::AppError {
    fn from(err: RepoError) -> Self {
        use shared::error::AppError;
        match err {
            RepoError::NotFound(r) => AppError::not_found(r),
            RepoError::Duplicate(r) => AppError::conflict(r),
            RepoError::Database(m) => AppError::database(m),
            RepoError::Validation(m) => AppError::validation(m),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Parse a `"table:key"` string (or bare key) into a RecordId for the
/// given table. A prefixed id naming a different table is rejected.
pub fn parse_record_id(table: &str, id: &str) -> RepoResult<RecordId> {
    match id.split_once(':') {
        Some((t, key)) => {
            if t != table {
                return Err(RepoError::Validation(format!(
                    "Expected {table} id, got {id}"
                )));
            }
            // Keys may arrive angle-bracketed from RecordId::to_string()
            let key = key.trim_start_matches('⟨').trim_end_matches('⟩');
            Ok(RecordId::from_table_key(table, key))
        }
        None => Ok(RecordId::from_table_key(table, id)),
    }
}

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}
