//! Game Document
//!
//! Typed view of the shared game document and its flat storage encoding.
//! The `RR_CC` cell keys exist only here; everything above this module
//! works with [`Board`].

use serde_json::Value;

use crate::core::board::{Board, Cell, Symbol};
use crate::store::kv::Fields;
use crate::BOARD_SIZE;

/// Field holding the symbol to move.
pub const FIELD_CURRENT_PLAYER: &str = "currentPlayer";
/// Field holding the active flag.
pub const FIELD_GAME_ACTIVE: &str = "gameActive";
/// Presence flag set by whoever initializes the document.
pub const FIELD_X_CONNECTED: &str = "playerXConnected";
/// Presence flag X sets as its seat reservation.
pub const FIELD_O_CONNECTED: &str = "playerOConnected";
/// Presence flag O sets when it takes the second seat.
pub const FIELD_O_JOINED: &str = "playerOJoined";

/// Storage key for a cell: two-digit row, underscore, two-digit column.
pub fn cell_key(row: usize, col: usize) -> String {
    format!("{:02}_{:02}", row, col)
}

/// Document decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// A required scalar field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field holds a value of the wrong shape.
    #[error("Invalid value for {field}: {value}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Offending value, JSON-encoded.
        value: String,
    },
}

/// Presence flags as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presence {
    /// `playerXConnected`
    pub x_connected: bool,
    /// `playerOConnected`
    pub o_connected: bool,
    /// `playerOJoined`
    pub o_joined: bool,
}

/// Full game state as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDocument {
    /// Grid contents.
    pub board: Board,
    /// Symbol to move.
    pub current_player: Symbol,
    /// False once an outcome was recorded.
    pub game_active: bool,
    /// Presence flags.
    pub presence: Presence,
}

impl GameDocument {
    /// Document written by `initialize`: empty grid, X to move, only the
    /// initializer present.
    pub fn fresh() -> Self {
        Self {
            board: Board::new(),
            current_player: Symbol::X,
            game_active: true,
            presence: Presence {
                x_connected: true,
                o_connected: false,
                o_joined: false,
            },
        }
    }

    /// Symbol that made the most recent move.
    pub fn last_mover(&self) -> Symbol {
        self.current_player.other()
    }

    /// Encode as flat fields, one per cell plus the scalars.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(FIELD_CURRENT_PLAYER.into(), Value::from(self.current_player.as_str()));
        fields.insert(FIELD_GAME_ACTIVE.into(), Value::Bool(self.game_active));
        fields.insert(FIELD_X_CONNECTED.into(), Value::Bool(self.presence.x_connected));
        fields.insert(FIELD_O_CONNECTED.into(), Value::Bool(self.presence.o_connected));
        fields.insert(FIELD_O_JOINED.into(), Value::Bool(self.presence.o_joined));
        for (row, col, cell) in self.board.iter() {
            fields.insert(cell_key(row, col), Value::from(cell.as_str()));
        }
        fields
    }

    /// Decode flat fields.
    ///
    /// Cells are lenient: missing or unknown values read as empty. The
    /// turn and active flag are required. Presence flags default to false.
    pub fn from_fields(fields: &Fields) -> Result<Self, DocumentError> {
        let current_player = match fields.get(FIELD_CURRENT_PLAYER) {
            None => return Err(DocumentError::MissingField(FIELD_CURRENT_PLAYER)),
            Some(value) => value
                .as_str()
                .and_then(Symbol::parse)
                .ok_or_else(|| invalid(FIELD_CURRENT_PLAYER, value))?,
        };

        let game_active = match fields.get(FIELD_GAME_ACTIVE) {
            None => return Err(DocumentError::MissingField(FIELD_GAME_ACTIVE)),
            Some(value) => value.as_bool().ok_or_else(|| invalid(FIELD_GAME_ACTIVE, value))?,
        };

        let presence = Presence {
            x_connected: flag(fields, FIELD_X_CONNECTED)?,
            o_connected: flag(fields, FIELD_O_CONNECTED)?,
            o_joined: flag(fields, FIELD_O_JOINED)?,
        };

        Ok(Self {
            board: board_from_fields(fields),
            current_player,
            game_active,
            presence,
        })
    }
}

/// Rebuild the grid from cell fields. Total: never fails.
pub fn board_from_fields(fields: &Fields) -> Board {
    let mut board = Board::new();
    for row in 0..BOARD_SIZE {
        for col in 0..BOARD_SIZE {
            let cell = fields
                .get(&cell_key(row, col))
                .and_then(Value::as_str)
                .map(Cell::parse_lenient)
                .unwrap_or(Cell::Empty);
            board.set(row, col, cell);
        }
    }
    board
}

fn flag(fields: &Fields, field: &'static str) -> Result<bool, DocumentError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(value) => value.as_bool().ok_or_else(|| invalid(field, value)),
    }
}

fn invalid(field: &'static str, value: &Value) -> DocumentError {
    DocumentError::InvalidField {
        field,
        value: value.to_string(),
    }
}
