//! Shared pieces used by both the Outpost engine crates and the CLI:
//! the bootstrap-prerequisite error and the on-disk directory layout.

mod error;
mod paths;

pub use error::NotInitialized;
pub use paths::AppDirs;
