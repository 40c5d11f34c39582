//! Durable local mirror of the installation's remote resources.
//!
//! One JSON document per installation holds the linked account, the active
//! tunnel (with its cached ingress list) and the DNS hostnames issued so
//! far. The remote Cloudflare service stays authoritative for tunnel and
//! ingress state; this mirror exists to avoid redundant remote reads and to
//! recover across process restarts.
//!
//! The document is deserialized into a fixed schema at load time; unknown
//! fields are an error, missing optional fields default. Persistence is
//! explicit: callers invoke [`LocalStateStore::save`] at the end of each
//! mutating operation.

mod document;
mod store;

pub use document::{Account, IngressRule, StateDocument, TunnelState, Zone, CATCH_ALL_SERVICE};
pub use store::{LocalStateStore, StateError};
