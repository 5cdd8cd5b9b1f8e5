//! Store Module
//!
//! Everything that touches the shared key-value store.
//!
//! ## Module Structure
//!
//! - `kv`: The `KeyValueStore` port and its subscription types
//! - `memory`: In-process backend with connections, faults and counters
//! - `document`: Field layout of the game document
//! - `adapter`: Game reads and writes (initialize, move, end, presence)

pub mod kv;
pub mod memory;
pub mod document;
pub mod adapter;

// Re-export key types
pub use kv::{ChildItem, Fields, KeyValueStore, Revision, Snapshot, StoreError, Subscription};
pub use memory::{MemoryConnection, MemoryStore};
pub use document::{GameDocument, Presence};
pub use adapter::{GameStateStore, MoveError, WriteMode};
