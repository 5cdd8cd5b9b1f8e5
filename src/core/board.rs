//! Board Model
//!
//! Fixed-size grid, symbols and outcome detection.
//! Pure functions of the grid: no I/O, no store types.

use serde::{Deserialize, Serialize};

use crate::{BOARD_SIZE, WIN_LENGTH};

// =============================================================================
// SYMBOL
// =============================================================================

/// A player's mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Symbol {
    /// First player, always moves first.
    X,
    /// Second player.
    O,
}

impl Symbol {
    /// The other symbol.
    #[inline]
    pub fn other(self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::X => "X",
            Symbol::O => "O",
        }
    }

    /// Parse the wire representation.
    pub fn parse(s: &str) -> Option<Symbol> {
        match s {
            "X" => Some(Symbol::X),
            "O" => Some(Symbol::O),
            _ => None,
        }
    }

    /// Cell holding this symbol.
    #[inline]
    pub fn to_cell(self) -> Cell {
        match self {
            Symbol::X => Cell::X,
            Symbol::O => Cell::O,
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CELL
// =============================================================================

/// Contents of one grid square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    /// Nobody has played here.
    #[default]
    Empty,
    /// Holds an X.
    X,
    /// Holds an O.
    O,
}

impl Cell {
    /// Wire representation (`-` for empty).
    pub fn as_str(self) -> &'static str {
        match self {
            Cell::Empty => "-",
            Cell::X => "X",
            Cell::O => "O",
        }
    }

    /// Parse a stored value. Anything unrecognized reads as empty.
    pub fn parse_lenient(s: &str) -> Cell {
        match s {
            "X" => Cell::X,
            "O" => Cell::O,
            _ => Cell::Empty,
        }
    }

    /// Symbol occupying this cell, if any.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Symbol::X),
            Cell::O => Some(Symbol::O),
        }
    }

    /// True if nobody has played here.
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// How a finished game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// A symbol completed a line.
    Win(Symbol),
    /// Board filled without a line.
    Draw,
}

// =============================================================================
// BOARD
// =============================================================================

/// Scan directions: right, down, down-right, up-right as (d_row, d_col).
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];

/// The playing grid.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `(row, col)` is on the board.
    #[inline]
    pub fn in_bounds(row: usize, col: usize) -> bool {
        row < BOARD_SIZE && col < BOARD_SIZE
    }

    /// Cell at `(row, col)`, or `None` off the board.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Overwrite a cell. Returns false if off the board.
    pub fn set(&mut self, row: usize, col: usize, cell: Cell) -> bool {
        match self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// Iterate `(row, col, cell)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells.iter().enumerate().map(move |(col, cell)| (row, col, *cell))
        })
    }

    /// Number of cells holding `symbol`.
    pub fn count(&self, symbol: Symbol) -> usize {
        let target = symbol.to_cell();
        self.iter().filter(|(_, _, c)| *c == target).count()
    }

    /// True if no cell is empty.
    pub fn is_full(&self) -> bool {
        self.iter().all(|(_, _, c)| !c.is_empty())
    }

    /// True if `player` has `WIN_LENGTH` in a row along any direction.
    ///
    /// Every cell holding `player` is treated as a line origin. Each step
    /// is bounds-checked on both axes.
    pub fn detect_win(&self, player: Symbol) -> bool {
        let target = player.to_cell();

        for (row, col, cell) in self.iter() {
            if cell != target {
                continue;
            }
            for &(d_row, d_col) in &DIRECTIONS {
                if self.run_length(row, col, d_row, d_col, target) >= WIN_LENGTH {
                    return true;
                }
            }
        }
        false
    }

    /// Length of the run of `target` starting at the origin, capped at `WIN_LENGTH`.
    fn run_length(&self, row: usize, col: usize, d_row: isize, d_col: isize, target: Cell) -> usize {
        let mut count = 1;
        for step in 1..WIN_LENGTH as isize {
            let r = row as isize + step * d_row;
            let c = col as isize + step * d_col;
            if r < 0 || c < 0 {
                break;
            }
            match self.get(r as usize, c as usize) {
                Some(cell) if cell == target => count += 1,
                _ => break,
            }
        }
        count
    }

    /// Outcome of the position, if finished.
    ///
    /// When both symbols hold a line the last mover is declared the winner.
    pub fn outcome(&self, last_mover: Symbol) -> Option<Outcome> {
        let mover_won = self.detect_win(last_mover);
        let other_won = self.detect_win(last_mover.other());

        match (mover_won, other_won) {
            (true, _) => Some(Outcome::Win(last_mover)),
            (false, true) => Some(Outcome::Win(last_mover.other())),
            (false, false) if self.is_full() => Some(Outcome::Draw),
            _ => None,
        }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            for cell in row {
                f.write_str(cell.as_str())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn board_with(cells: &[(usize, usize, Cell)]) -> Board {
        let mut board = Board::new();
        for &(r, c, cell) in cells {
            assert!(board.set(r, c, cell));
        }
        board
    }

    /// Pairs of X and O along each row, flipped on odd rows. No line of four.
    fn drawn_board() -> Board {
        let mut board = Board::new();
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let shift = if row % 2 == 1 { 2 } else { 0 };
                let cell = if ((col + shift) / 2) % 2 == 0 { Cell::X } else { Cell::O };
                board.set(row, col, cell);
            }
        }
        board
    }

    #[test]
    fn test_empty_board_has_no_win() {
        let board = Board::new();
        assert!(!board.detect_win(Symbol::X));
        assert!(!board.detect_win(Symbol::O));
        assert!(!board.is_full());
        assert_eq!(board.outcome(Symbol::X), None);
    }

    #[test]
    fn test_three_in_a_row_is_not_a_win() {
        let board = board_with(&[(4, 4, Cell::X), (4, 5, Cell::X), (4, 6, Cell::X)]);
        assert!(!board.detect_win(Symbol::X));
    }

    #[test]
    fn test_horizontal_win() {
        let board = board_with(&[(0, 0, Cell::X), (0, 1, Cell::X), (0, 2, Cell::X), (0, 3, Cell::X)]);
        assert!(board.detect_win(Symbol::X));
        assert!(!board.detect_win(Symbol::O));
    }

    #[test]
    fn test_vertical_win_on_last_column() {
        let board = board_with(&[(6, 9, Cell::O), (7, 9, Cell::O), (8, 9, Cell::O), (9, 9, Cell::O)]);
        assert!(board.detect_win(Symbol::O));
    }

    #[test]
    fn test_diagonal_wins() {
        let down_right = board_with(&[(2, 3, Cell::X), (3, 4, Cell::X), (4, 5, Cell::X), (5, 6, Cell::X)]);
        assert!(down_right.detect_win(Symbol::X));

        let up_right = board_with(&[(3, 0, Cell::O), (2, 1, Cell::O), (1, 2, Cell::O), (0, 3, Cell::O)]);
        assert!(up_right.detect_win(Symbol::O));
    }

    #[test]
    fn test_run_does_not_wrap_rows() {
        // (0,8) (0,9) (1,0) (1,1) are consecutive in row-major order only.
        let board = board_with(&[(0, 8, Cell::X), (0, 9, Cell::X), (1, 0, Cell::X), (1, 1, Cell::X)]);
        assert!(!board.detect_win(Symbol::X));
    }

    #[test]
    fn test_up_right_scan_stops_at_top_edge() {
        let board = board_with(&[(2, 0, Cell::X), (1, 1, Cell::X), (0, 2, Cell::X)]);
        assert!(!board.detect_win(Symbol::X));
    }

    #[test]
    fn test_interrupted_line() {
        let board = board_with(&[(5, 0, Cell::X), (5, 1, Cell::X), (5, 2, Cell::O), (5, 3, Cell::X), (5, 4, Cell::X)]);
        assert!(!board.detect_win(Symbol::X));
    }

    #[test]
    fn test_full_board_draw() {
        let board = drawn_board();
        assert!(board.is_full());
        assert!(!board.detect_win(Symbol::X));
        assert!(!board.detect_win(Symbol::O));
        assert_eq!(board.outcome(Symbol::O), Some(Outcome::Draw));
    }

    #[test]
    fn test_both_win_goes_to_last_mover() {
        let board = board_with(&[
            (0, 0, Cell::X), (0, 1, Cell::X), (0, 2, Cell::X), (0, 3, Cell::X),
            (9, 0, Cell::O), (9, 1, Cell::O), (9, 2, Cell::O), (9, 3, Cell::O),
        ]);
        assert_eq!(board.outcome(Symbol::O), Some(Outcome::Win(Symbol::O)));
        assert_eq!(board.outcome(Symbol::X), Some(Outcome::Win(Symbol::X)));
    }

    #[test]
    fn test_set_out_of_bounds() {
        let mut board = Board::new();
        assert!(!board.set(BOARD_SIZE, 0, Cell::X));
        assert!(!board.set(0, BOARD_SIZE, Cell::X));
        assert_eq!(board.get(BOARD_SIZE, 0), None);
    }

    #[test]
    fn test_counts() {
        let board = board_with(&[(0, 0, Cell::X), (1, 1, Cell::O), (2, 2, Cell::X)]);
        assert_eq!(board.count(Symbol::X), 2);
        assert_eq!(board.count(Symbol::O), 1);
    }

    /// Reference check: brute-force every window of WIN_LENGTH cells.
    fn has_line(board: &Board, symbol: Symbol) -> bool {
        let target = symbol.to_cell();
        let n = BOARD_SIZE as isize;
        let len = WIN_LENGTH as isize;
        for r in 0..n {
            for c in 0..n {
                for &(dr, dc) in &DIRECTIONS {
                    let end_r = r + (len - 1) * dr;
                    let end_c = c + (len - 1) * dc;
                    if !(0..n).contains(&end_r) || !(0..n).contains(&end_c) {
                        continue;
                    }
                    if (0..len).all(|i| board.get((r + i * dr) as usize, (c + i * dc) as usize) == Some(target)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn arb_board() -> impl Strategy<Value = Board> {
        prop::collection::vec(0u8..3, BOARD_SIZE * BOARD_SIZE).prop_map(|values| {
            let mut board = Board::new();
            for (i, v) in values.into_iter().enumerate() {
                let cell = match v {
                    1 => Cell::X,
                    2 => Cell::O,
                    _ => Cell::Empty,
                };
                board.set(i / BOARD_SIZE, i % BOARD_SIZE, cell);
            }
            board
        })
    }

    proptest! {
        #[test]
        fn prop_detect_win_matches_brute_force(board in arb_board()) {
            prop_assert_eq!(board.detect_win(Symbol::X), has_line(&board, Symbol::X));
            prop_assert_eq!(board.detect_win(Symbol::O), has_line(&board, Symbol::O));
        }

        #[test]
        fn prop_full_iff_no_empty(board in arb_board()) {
            let any_empty = board.iter().any(|(_, _, c)| c.is_empty());
            prop_assert_eq!(board.is_full(), !any_empty);
        }
    }
}
