//! Client Module
//!
//! The reactive driver a participant runs, and the chat feed beside it.

pub mod chat;
pub mod session;

pub use chat::{ChatChannel, ChatMessage};
pub use session::{ClientConfig, ClientError, Command, GameClient};
