//! # Four-in-a-Row Shared-Store Client
//!
//! Two-player connect-four style game on a 10x10 grid, coordinated entirely
//! through one document in a shared key-value store with push subscriptions.
//! There is no game server: every participant runs the same client.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  FOUR-IN-A-ROW CLIENT                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── board.rs    - Grid, win scan, draw rule                 │
//! │  └── hash.rs     - Snapshot digests for tracing              │
//! │                                                              │
//! │  store/          - Shared store access                       │
//! │  ├── kv.rs       - KeyValueStore port, subscriptions         │
//! │  ├── memory.rs   - In-process backend                        │
//! │  ├── document.rs - Game document field layout                │
//! │  └── adapter.rs  - Initialize, move, end, presence writes    │
//! │                                                              │
//! │  game/           - Per-session protocol                      │
//! │  ├── role.rs     - Seat assignment                           │
//! │  ├── presence.rs - Disconnect rollback                       │
//! │  ├── controller.rs - Phase machine, move gate                │
//! │  └── events.rs   - Client events and messages                │
//! │                                                              │
//! │  client/         - Reactive driver                           │
//! │  ├── session.rs  - GameClient loop                           │
//! │  └── chat.rs     - Chat feed                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! Clients coordinate only through the document. In guarded mode (the
//! default) moves and seat claims are conditional on the revision they were
//! computed from, so a lost race fails instead of overwriting. Optimistic
//! mode keeps plain last-write-wins updates.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod store;
pub mod game;
pub mod client;

// Re-export commonly used types
pub use crate::core::board::{Board, Cell, Outcome, Symbol};
pub use crate::store::kv::{KeyValueStore, StoreError};
pub use crate::store::memory::MemoryStore;
pub use crate::store::adapter::WriteMode;
pub use crate::game::role::Role;
pub use crate::game::controller::Phase;
pub use crate::game::events::ClientEvent;
pub use crate::client::session::{ClientConfig, ClientError, Command, GameClient};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Grid side length.
pub const BOARD_SIZE: usize = 10;

/// Marks in a line needed to win.
pub const WIN_LENGTH: usize = 4;
