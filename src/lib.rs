//! Keeps a local copy of a remote, continuously changing directory tree.
//!
//! A producer sends one full [`Snapshot`](filesystem::Snapshot) followed by
//! incremental change events. [`SyncSession`](sync::SyncSession) applies them
//! in arrival order and publishes a new immutable snapshot after each one;
//! untouched subtrees are shared between successive snapshots.

#![allow(clippy::enum_variant_names)]
#![allow(clippy::module_inception)]
#![allow(async_fn_in_trait)]

pub mod application;
pub mod cli;
pub mod config;
pub mod ext;
pub mod filesystem;
pub mod render;
pub mod services;
pub mod sync;
pub mod transport;
