//! The shared 10×10 board.
//!
//! The stored board is the attack history of a game: the engine only ever
//! writes [`Cell::Miss`] and [`Cell::Hit`]. Ship cells appear only in the
//! derived [`Board::player_view`], which paints the viewer's own fleet.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ship::{Position, ShipSet};

/// Side length of the board.
pub const BOARD_SIZE: usize = 10;

/// State of one cell. Serialized as its numeric code (0 to 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Cell {
    #[default]
    Empty = 0,
    Ship = 1,
    Miss = 2,
    Hit = 3,
}

impl Cell {
    /// `true` for cells that have already been fired at.
    pub fn is_explored(self) -> bool {
        matches!(self, Cell::Miss | Cell::Hit)
    }
}

impl TryFrom<u8> for Cell {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::Ship),
            2 => Ok(Cell::Miss),
            3 => Ok(Cell::Hit),
            other => Err(other),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Cell::try_from(code)
            .map_err(|c| serde::de::Error::custom(format!("unknown cell code {c}")))
    }
}

/// A 10×10 grid indexed `[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// An all-empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell at `pos`, or `None` off the board.
    pub fn get(&self, pos: Position) -> Option<Cell> {
        if !pos.is_valid() {
            return None;
        }
        Some(self.cells[pos.y as usize][pos.x as usize])
    }

    /// Writes `cell` at `pos`. Off-board writes are ignored.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        if pos.is_valid() {
            self.cells[pos.y as usize][pos.x as usize] = cell;
        }
    }

    /// Every position on the board, row by row.
    pub fn positions() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE as i64)
            .flat_map(|y| (0..BOARD_SIZE as i64).map(move |x| Position::new(x, y)))
    }

    /// Positions whose cell is still [`Cell::Empty`].
    pub fn unexplored(&self) -> impl Iterator<Item = Position> + '_ {
        Self::positions().filter(|pos| self.get(*pos) == Some(Cell::Empty))
    }

    /// Number of cells in state `cell`.
    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().flatten().filter(|c| **c == cell).count()
    }

    /// Rows of the grid, for rendering.
    pub fn rows(&self) -> &[[Cell; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    /// The board as seen by the owner of `own_fleet`.
    ///
    /// A copy of the attack log with the viewer's un-struck ship cells
    /// painted [`Cell::Ship`]. Any `Ship` cell that does not belong to the
    /// viewer is redacted to `Empty`.
    pub fn player_view(&self, own_fleet: Option<&ShipSet>) -> Board {
        let mut view = self.clone();
        for row in view.cells.iter_mut() {
            for cell in row.iter_mut() {
                if *cell == Cell::Ship {
                    *cell = Cell::Empty;
                }
            }
        }
        if let Some(fleet) = own_fleet {
            for pos in fleet.ships.iter().flat_map(|ship| ship.positions()) {
                if view.get(pos) == Some(Cell::Empty) {
                    view.set(pos, Cell::Ship);
                }
            }
        }
        view
    }
}
