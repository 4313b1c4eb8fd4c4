//! Downstream storefront attachment
//!
//! After a confirm pass the generated codes are handed to the
//! storefront for attachment to their destination products. Attachment
//! failures never revert voucher status: the money is already spent and
//! the codes exist, so the caller retries attachment out of band.

use async_trait::async_trait;
use shared::AppResult;

/// Per-code storefront verdict
#[derive(Debug, Clone)]
pub struct CodeAttachment {
    pub code: String,
    pub attached: bool,
}

#[async_trait]
pub trait AttachmentNotifier: Send + Sync {
    /// Attach a batch of codes to one storefront product
    async fn attach_codes(
        &self,
        destination_product_id: &str,
        codes: Vec<String>,
    ) -> AppResult<Vec<CodeAttachment>>;
}
