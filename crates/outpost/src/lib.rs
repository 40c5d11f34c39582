//! Outpost agent library: configuration, the Docker collaborator, per-app
//! records and the launch/remove workflows. The binary in `main.rs` is a
//! thin clap layer over [`workflow`].

pub mod apps;
pub mod config;
pub mod docker;
pub mod workflow;
