//! Store Profile Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Minimal per-store record the engine reads: provider credentials.
///
/// Store management and credential encryption live outside the engine;
/// this row is written by that surface and only consumed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProfile {
    pub id: Option<RecordId>,
    /// Stable external key ("store_key") orders reference
    pub store_key: String,
    pub name: String,
    pub provider_username: String,
    pub provider_password: String,
    pub terminal_key: String,
}
