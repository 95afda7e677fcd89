//! Shared primitive types used across the scorer.

/// A merchant identifier as it appears in the transaction log.
pub type MerchantId = String;

/// A merchant category code. Kept as text so leading zeros survive.
pub type Mcc = String;

/// Placeholder shown when a merchant has no device data.
pub const NOT_AVAILABLE: &str = "N/A";
