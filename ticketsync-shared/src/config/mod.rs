//! # Configuration
//!
//! Settings shared by the sync engine and the command-line client.

pub mod sync;

pub use sync::{ConfigError, LogFormat, SyncConfig};
