//! Purchase-domain shared types

mod types;

pub use types::{FailureKind, OrderStatus, OrderStatusView, VoucherStatus};
