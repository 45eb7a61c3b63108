#![warn(missing_docs)]
//! ESG alerts turns a stream of ESG/risk events into a deduplicated,
//! rate-limited set of notifications and a deterministic alert feed.

pub mod channels;
pub mod cmd;
pub mod config;
pub mod engine;
pub mod loader;
pub mod models;
pub mod persistence;
pub mod source;
pub mod test_helpers;
