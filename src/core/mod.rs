//! Core primitives.
//!
//! The grid, its win and draw rules, and the snapshot digest used in logs.
//! Nothing in this module performs I/O.

pub mod board;
pub mod hash;

// Re-export core types
pub use board::{Board, Cell, Outcome, Symbol};
pub use hash::{document_digest, short_digest, SnapshotDigest};
