//! Human order numbers
//!
//! `PO-YYYYMMDD-NNN`: date-scoped, sequence restarts at 1 each day.
//! The sequence comes from an atomic per-date counter record so two
//! concurrent drafts never share a number.

use crate::db::repository::{OrderCounterRepository, RepoResult};
use chrono::Utc;
use surrealdb::engine::local::Db;
use surrealdb::Surreal;

#[derive(Clone)]
pub struct OrderNumberGenerator {
    counter: OrderCounterRepository,
}

impl OrderNumberGenerator {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            counter: OrderCounterRepository::new(db),
        }
    }

    pub async fn next(&self) -> RepoResult<String> {
        let date_key = Utc::now().format("%Y%m%d").to_string();
        let sequence = self.counter.next_for_date(&date_key).await?;
        Ok(format!("PO-{date_key}-{sequence:03}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn numbers_are_date_scoped_and_sequential() {
        let db = Database::open_in_memory().await.unwrap();
        let generator = OrderNumberGenerator::new(db.handle().clone());

        let first = generator.next().await.unwrap();
        let second = generator.next().await.unwrap();

        let date_key = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(first, format!("PO-{date_key}-001"));
        assert_eq!(second, format!("PO-{date_key}-002"));
    }
}
