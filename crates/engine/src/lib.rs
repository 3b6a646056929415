//! The ordered-forest engine.
//!
//! Everything that mutates the issue forest lives here: the sibling chain
//! codec, the in-memory forest index, the ordering and status-cascade
//! engines (which compute change sets, never touch storage), and the
//! mutation coordinator that commits those change sets atomically.

#![warn(missing_docs)]

pub mod chain;
pub mod index;

pub mod cascade;
pub mod ordering;

pub mod coordinator;

pub use coordinator::{MutationCoordinator, NewIssue};
pub use index::ForestIndex;
pub use ordering::{DragState, Direction};
