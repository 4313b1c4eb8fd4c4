//! Unified error type for the voucher purchasing platform
//!
//! Every crate converges on [`AppError`]. Module-local error enums
//! (repository, provider) convert into it at the boundary so callers
//! only ever match one taxonomy.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error — bad input, order state unchanged
    #[error("{message}")]
    Validation { message: String },

    /// Resource not found
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Resource already exists
    #[error("Resource already exists: {resource}")]
    Conflict { resource: String },

    /// Business rule violation (e.g. non-editable order state)
    #[error("Business rule violation: {message}")]
    BusinessRule { message: String },

    /// Prepaid balance cannot cover the order total
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    /// Transport-level failure talking to the upstream provider
    /// (connect error, timeout, non-2xx status)
    #[error("Provider transport error: {message}")]
    ProviderTransport { message: String },

    /// Upstream authentication rejected
    #[error("Provider authentication failed: {message}")]
    ProviderAuth { message: String },

    /// Database error
    #[error("Database error: {message}")]
    Database { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    // ========== Convenient constructors ==========

    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }

    /// Create a BusinessRule error
    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::BusinessRule {
            message: message.into(),
        }
    }

    /// Create a ProviderTransport error
    pub fn provider_transport(message: impl Into<String>) -> Self {
        Self::ProviderTransport {
            message: message.into(),
        }
    }

    /// Create a ProviderAuth error
    pub fn provider_auth(message: impl Into<String>) -> Self {
        Self::ProviderAuth {
            message: message.into(),
        }
    }

    /// Create a Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is a transport fault eligible for blind retry
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ProviderTransport { .. })
    }
}

/// Result type for platform operations
pub type AppResult<T> = Result<T, AppError>;
