//! Storage abstraction and implementations for Thicket.
//!
//! This crate provides the three persistence primitives the forest engine
//! needs (fetch-all, atomic multi-entity commit, change subscription) behind
//! a trait, with a JSON-file and an in-memory implementation.

#![warn(missing_docs)]

pub mod trait_;

pub mod json_storage;
pub mod memory;

mod feed;

pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;
pub use trait_::{Result, Storage, StorageError};
