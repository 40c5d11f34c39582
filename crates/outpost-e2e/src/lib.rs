//! End-to-end test utilities for the Outpost reconciliation engine.
//!
//! Provides an in-memory Cloudflare API backend so the full
//! bootstrap/expose/remove sequence can be exercised without external
//! services.

pub mod mock_api;

pub use mock_api::MockCloudflare;
