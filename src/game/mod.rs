//! Game Protocol Module
//!
//! The per-session rules layered on top of the shared document.
//!
//! ## Module Structure
//!
//! - `role`: Seat selection and claiming
//! - `presence`: Disconnect rollback and flag reassertion
//! - `controller`: Phase machine and local move gate
//! - `events`: Outward events and their message texts

pub mod role;
pub mod presence;
pub mod controller;
pub mod events;

// Re-export key types
pub use role::{Role, RoleAssigner};
pub use presence::PresenceManager;
pub use controller::{MoveRejection, Phase, TurnController};
pub use events::ClientEvent;
