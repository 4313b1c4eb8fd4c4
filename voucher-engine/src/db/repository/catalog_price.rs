//! Catalog Price Repository

use super::{BaseRepository, RepoResult};
use crate::db::models::CatalogPrice;
use rust_decimal::Decimal;
use serde_json::json;
use shared::util::now_millis;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const CATALOG_TABLE: &str = "catalog_price";

#[derive(Clone)]
pub struct CatalogPriceRepository {
    base: BaseRepository,
}

impl CatalogPriceRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn record_id(option_code: &str) -> RecordId {
        RecordId::from_table_key(CATALOG_TABLE, option_code)
    }

    pub async fn find_by_option(&self, option_code: &str) -> RepoResult<Option<CatalogPrice>> {
        let price: Option<CatalogPrice> =
            self.base.db().select(Self::record_id(option_code)).await?;
        Ok(price)
    }

    /// Write the refreshed cost basis for an option. Merge keeps the
    /// stock counter intact.
    pub async fn upsert_price(
        &self,
        option_code: &str,
        unit_wholesale_price: Decimal,
        currency: &str,
    ) -> RepoResult<()> {
        let _: Option<CatalogPrice> = self
            .base
            .db()
            .upsert(Self::record_id(option_code))
            .merge(json!({
                "option_code": option_code,
                "unit_wholesale_price": unit_wholesale_price,
                "currency": currency,
                "updated_at": now_millis(),
            }))
            .await?;
        Ok(())
    }

    /// Bump the stock counter by the number of newly attached codes
    pub async fn increment_stock(&self, option_code: &str, newly_attached: i32) -> RepoResult<()> {
        if newly_attached <= 0 {
            return Ok(());
        }
        self.base
            .db()
            .query(
                "UPSERT $id SET option_code = $code, \
                 stock_quantity = (stock_quantity ?? 0) + $delta, updated_at = $now",
            )
            .bind(("id", Self::record_id(option_code)))
            .bind(("code", option_code.to_string()))
            .bind(("delta", newly_attached))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }
}
