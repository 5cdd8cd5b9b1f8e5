//! Turn & Lifecycle Controller
//!
//! Per-session phase machine. Derives the phase from each snapshot, decides
//! when the session must record the end of the game, and gates local move
//! attempts. Performs no I/O; the client driver carries out the effects.

use tracing::debug;

use crate::core::board::{Board, Outcome, Symbol};
use crate::game::role::Role;
use crate::store::document::GameDocument;

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No snapshot processed yet, or no role claimed.
    #[default]
    Initializing,
    /// Holding X, second seat not taken yet.
    WaitingForOpponent,
    /// Local symbol is to move.
    MyTurn,
    /// The other symbol is to move (spectators always sit here).
    OpponentTurn,
    /// Game over. `None` if the document was closed without a visible outcome.
    Ended(Option<Outcome>),
}

impl Phase {
    /// True for `Ended`.
    pub fn is_ended(self) -> bool {
        matches!(self, Phase::Ended(_))
    }
}

/// Why a local move attempt was refused without contacting the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    /// Session has no symbol.
    #[error("spectators cannot move")]
    NotAPlayer,
    /// Phase is not `MyTurn`.
    #[error("not your turn")]
    NotYourTurn,
    /// Input is disabled.
    #[error("interaction disabled")]
    InteractionDisabled,
    /// Coordinates off the board.
    #[error("cell is off the board")]
    OutOfBounds,
    /// Target already holds a mark.
    #[error("cell is occupied")]
    CellOccupied,
}

/// How a snapshot ended the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndKind {
    /// This session found the outcome on an active document and must write
    /// `gameActive=false`.
    Detected(Outcome),
    /// The document was already inactive.
    Observed(Option<Outcome>),
}

/// Result of feeding one snapshot to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotEffect {
    /// Phase before the snapshot.
    pub previous: Phase,
    /// Phase after the snapshot.
    pub current: Phase,
    /// Set when this snapshot moved the session into `Ended`.
    pub ended: Option<EndKind>,
    /// Set when an ended session saw a fresh document.
    pub restarted: bool,
}

impl SnapshotEffect {
    /// True if the phase changed.
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Phase machine for one session.
#[derive(Debug, Default)]
pub struct TurnController {
    phase: Phase,
    board: Board,
    interaction_enabled: bool,
}

impl TurnController {
    /// Start in `Initializing`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last board seen.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// True only while the session may submit a move.
    pub fn interaction_enabled(&self) -> bool {
        self.interaction_enabled
    }

    /// Apply a snapshot.
    ///
    /// Outcome detection runs only if the session was not already `Ended`.
    /// An ended session leaves `Ended` only for an active document whose
    /// board shows no outcome, which is what a reinitialized document looks
    /// like.
    pub fn on_snapshot(&mut self, doc: &GameDocument, role: Option<Role>) -> SnapshotEffect {
        let previous = self.phase;
        self.board = doc.board.clone();
        let outcome = doc.board.outcome(doc.last_mover());

        let mut ended = None;
        let mut restarted = false;

        self.phase = if previous.is_ended() {
            if doc.game_active && outcome.is_none() {
                restarted = true;
                active_phase(doc, role)
            } else {
                previous
            }
        } else if !doc.game_active {
            ended = Some(EndKind::Observed(outcome));
            Phase::Ended(outcome)
        } else if let Some(outcome) = outcome {
            ended = Some(EndKind::Detected(outcome));
            Phase::Ended(Some(outcome))
        } else {
            active_phase(doc, role)
        };

        self.interaction_enabled = self.phase == Phase::MyTurn;

        if previous != self.phase {
            debug!("Phase {:?} -> {:?}", previous, self.phase);
        }

        SnapshotEffect {
            previous,
            current: self.phase,
            ended,
            restarted,
        }
    }

    /// Local gate for a move attempt. Passing means the store may be called.
    pub fn check_move(&self, role: Option<Role>, row: usize, col: usize) -> Result<(), MoveRejection> {
        if !matches!(role, Some(Role::Player(_))) {
            return Err(MoveRejection::NotAPlayer);
        }
        if self.phase != Phase::MyTurn {
            return Err(MoveRejection::NotYourTurn);
        }
        if !self.interaction_enabled {
            return Err(MoveRejection::InteractionDisabled);
        }
        match self.board.get(row, col) {
            None => Err(MoveRejection::OutOfBounds),
            Some(cell) if !cell.is_empty() => Err(MoveRejection::CellOccupied),
            Some(_) => Ok(()),
        }
    }

    /// Disable input until the next snapshot, after a move was submitted.
    pub fn lock_input(&mut self) {
        self.interaction_enabled = false;
    }
}

fn active_phase(doc: &GameDocument, role: Option<Role>) -> Phase {
    match role {
        None => Phase::Initializing,
        Some(Role::Spectator) => Phase::OpponentTurn,
        Some(Role::Player(symbol)) => {
            if symbol == Symbol::X && !doc.presence.o_joined {
                Phase::WaitingForOpponent
            } else if doc.current_player == symbol {
                Phase::MyTurn
            } else {
                Phase::OpponentTurn
            }
        }
    }
}
