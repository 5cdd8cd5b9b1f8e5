//! Client Events
//!
//! Everything a session reports outward: system messages, chat lines,
//! board refreshes and phase changes. A renderer subscribes to these.

use crate::core::board::{Board, Outcome, Symbol};
use crate::game::controller::Phase;
use crate::game::role::Role;

/// Event published by a game client.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// Non-blocking system notice (role banner, outcome, error).
    System(String),

    /// Chat line from the shared feed.
    Chat {
        /// Sanitized sender name.
        sender: String,
        /// Message body.
        text: String,
    },

    /// Board rebuilt from a snapshot.
    BoardUpdated {
        /// Grid as of the snapshot.
        board: Board,
        /// Status banner.
        status: String,
        /// Whether the local player may click.
        interaction_enabled: bool,
    },

    /// Phase transition.
    PhaseChanged {
        /// Phase before.
        from: Phase,
        /// Phase after.
        to: Phase,
    },

    /// Role was claimed.
    RoleAssigned(Role),
}

/// Message shown when this session detects the outcome itself.
pub fn outcome_announcement(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Win(Symbol::X) => "Player 1 (Player X) wins! Congratulations!",
        Outcome::Win(Symbol::O) => "Player 2 (Player O) wins! Congratulations!",
        Outcome::Draw => "It's a draw! The board is full.",
    }
}

/// Message shown when the document was already finished on arrival.
pub fn outcome_summary(outcome: Option<Outcome>) -> &'static str {
    match outcome {
        Some(Outcome::Win(Symbol::X)) => "Player 1 wins!",
        Some(Outcome::Win(Symbol::O)) => "Player 2 wins!",
        Some(Outcome::Draw) => "It's a draw!",
        None => "Game Over",
    }
}

/// Status banner for a phase.
pub fn status_line(phase: Phase, role: Option<Role>) -> String {
    let role = match (phase, role) {
        (Phase::Ended(_), _) => return "Game Over".to_string(),
        (Phase::Initializing, _) | (_, None) => return "Waiting for game state...".to_string(),
        (Phase::WaitingForOpponent, _) => return "Waiting for opponent...".to_string(),
        (_, Some(role)) => role,
    };

    let Some(symbol) = role.symbol() else {
        return "Spectating".to_string();
    };
    match phase {
        Phase::MyTurn => format!("Your turn ({} - '{}')", role.display_name(), symbol),
        _ => format!(
            "Opponent's turn ({} - '{}')",
            role.opponent_display_name(),
            symbol.other()
        ),
    }
}

/// Error notices, one per failing operation.
pub mod notices {
    /// Initialize / New Game failed.
    pub const NEW_GAME_FAILED: &str = "Error starting new game.";
    /// Move write failed.
    pub const MOVE_FAILED: &str = "Error making move. Please try again.";
    /// Pre-move read failed.
    pub const MOVE_READ_FAILED: &str = "Error fetching game state. Please try again.";
    /// Document missing or malformed when moving.
    pub const MOVE_STATE_UNAVAILABLE: &str = "Error processing move. Game state not available.";
    /// `gameActive=false` write failed.
    pub const END_FAILED: &str = "Error ending game.";
    /// Startup existence check failed.
    pub const STARTUP_FAILED: &str = "Error checking game state. Please refresh.";
    /// Chat append failed.
    pub const CHAT_FAILED: &str = "Error sending chat message.";
    /// Subscription could not be opened.
    pub const SUBSCRIBE_FAILED: &str = "Error listening for game updates. Please refresh.";
    /// Role claim or presence write failed.
    pub const PRESENCE_FAILED: &str = "Error joining the game. Retrying on next update.";
    /// Document could not be decoded.
    pub const INCONSISTENT_STATE: &str = "Received an incomplete game state.";
    /// No document yet.
    pub const WAITING_FOR_INIT: &str = "Waiting for game to initialize...";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let x = Some(Role::Player(Symbol::X));
        let o = Some(Role::Player(Symbol::O));
        assert_eq!(status_line(Phase::MyTurn, x), "Your turn (Player 1 - 'X')");
        assert_eq!(status_line(Phase::OpponentTurn, x), "Opponent's turn (Player 2 - 'O')");
        assert_eq!(status_line(Phase::OpponentTurn, o), "Opponent's turn (Player 1 - 'X')");
        assert_eq!(status_line(Phase::Ended(None), o), "Game Over");
        assert_eq!(status_line(Phase::Initializing, None), "Waiting for game state...");
        assert_eq!(status_line(Phase::OpponentTurn, Some(Role::Spectator)), "Spectating");
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(outcome_announcement(Outcome::Draw), "It's a draw! The board is full.");
        assert_eq!(outcome_summary(Some(Outcome::Win(Symbol::O))), "Player 2 wins!");
        assert_eq!(outcome_summary(None), "Game Over");
    }
}
