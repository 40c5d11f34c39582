use thiserror::Error;

/// Returned when a route or DNS operation is attempted before the
/// installation has been bootstrapped (no account/tunnel on record).
#[derive(Debug, Error)]
#[error("outpost is not initialized; run `outpost init` first")]
pub struct NotInitialized;
