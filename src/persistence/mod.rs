//! This module contains the persistence layer: the store traits and their
//! JSON file implementations.

pub mod error;
pub mod json_file;
pub mod traits;

pub use json_file::{JsonFileFeedStore, JsonFileStateStore};
