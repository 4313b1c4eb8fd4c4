//! Shared types for the voucher purchasing platform
//!
//! Common types used across crates: the unified error type, money
//! helpers, purchase-domain status enums and utility functions.

pub mod error;
pub mod money;
pub mod purchase;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult};
pub use serde::{Deserialize, Serialize};
