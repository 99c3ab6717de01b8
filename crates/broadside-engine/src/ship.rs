//! Positions, ship classes, and fleets.

use broadside_protocol::PlayerIndex;
use serde::{Deserialize, Serialize};

use crate::board::BOARD_SIZE;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell coordinate. `x` is the column, `y` the row, both 0-based.
///
/// Coordinates are signed so that off-board neighbours and malformed client
/// input can be represented and then rejected by [`Position::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if the position lies on the 10×10 grid.
    pub fn is_valid(&self) -> bool {
        is_valid_position(self.x, self.y)
    }

    /// In-bounds cells of the 3×3 block centred on this position, the
    /// position itself included.
    pub fn neighborhood(self) -> impl Iterator<Item = Position> {
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| Position::new(self.x + dx, self.y + dy)))
            .filter(Position::is_valid)
    }
}

/// `true` when both coordinates are in `[0, 9]`.
pub fn is_valid_position(x: i64, y: i64) -> bool {
    (0..BOARD_SIZE as i64).contains(&x) && (0..BOARD_SIZE as i64).contains(&y)
}

// ---------------------------------------------------------------------------
// ShipKind
// ---------------------------------------------------------------------------

/// The four size classes of a standard fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipKind {
    Huge,
    Large,
    Medium,
    Small,
}

impl ShipKind {
    /// All classes, largest first. Fleet generation places them in this order.
    pub const ALL: [ShipKind; 4] = [
        ShipKind::Huge,
        ShipKind::Large,
        ShipKind::Medium,
        ShipKind::Small,
    ];

    /// Number of cells a ship of this class occupies.
    pub const fn length(self) -> usize {
        match self {
            Self::Huge => 4,
            Self::Large => 3,
            Self::Medium => 2,
            Self::Small => 1,
        }
    }

    /// How many ships of this class a full fleet contains.
    pub const fn count(self) -> usize {
        match self {
            Self::Huge => 1,
            Self::Large => 2,
            Self::Medium => 3,
            Self::Small => 4,
        }
    }

    /// Total number of ships in a full fleet.
    pub fn fleet_size() -> usize {
        Self::ALL.iter().map(|k| k.count()).sum()
    }
}

// ---------------------------------------------------------------------------
// Ship
// ---------------------------------------------------------------------------

/// A placed ship and its damage.
///
/// `direction == true` grows along x (horizontal), `false` along y.
/// `hits[i]` records whether the i-th cell of [`Ship::positions`] was struck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub position: Position,
    pub direction: bool,
    pub length: usize,
    #[serde(rename = "type")]
    pub kind: ShipKind,
    #[serde(default, skip_serializing)]
    pub hits: Vec<bool>,
}

impl Ship {
    /// Creates an undamaged ship of the class's natural length.
    pub fn new(kind: ShipKind, position: Position, direction: bool) -> Self {
        let length = kind.length();
        Self {
            position,
            direction,
            length,
            kind,
            hits: vec![false; length],
        }
    }

    /// Cells covered by the ship, in placement order.
    ///
    /// Cells that fall off the board are dropped, so a malformed ship can
    /// yield fewer than `length` positions.
    pub fn positions(&self) -> Vec<Position> {
        let Position { x, y } = self.position;
        (0..self.length as i64)
            .map(|i| {
                if self.direction {
                    Position::new(x + i, y)
                } else {
                    Position::new(x, y + i)
                }
            })
            .filter(Position::is_valid)
            .collect()
    }

    /// Returns `true` if the ship covers `target`.
    pub fn occupies(&self, target: Position) -> bool {
        self.positions().contains(&target)
    }

    /// A ship is sunk once every hit flag is set.
    pub fn is_sunk(&self) -> bool {
        self.hits.iter().all(|hit| *hit)
    }
}

// ---------------------------------------------------------------------------
// ShipSet
// ---------------------------------------------------------------------------

/// One side's fleet within a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipSet {
    pub player: PlayerIndex,
    pub ships: Vec<Ship>,
}

impl ShipSet {
    pub fn new(player: PlayerIndex, ships: Vec<Ship>) -> Self {
        Self { player, ships }
    }

    /// A fleet is defeated when it is non-empty and every ship is sunk.
    pub fn is_defeated(&self) -> bool {
        !self.ships.is_empty() && self.ships.iter().all(Ship::is_sunk)
    }

    /// Returns `true` if any ship covers `target`.
    pub fn occupies(&self, target: Position) -> bool {
        self.ships.iter().any(|ship| ship.occupies(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_horizontal_grow_along_x() {
        let ship = Ship::new(ShipKind::Large, Position::new(2, 5), true);
        assert_eq!(
            ship.positions(),
            vec![Position::new(2, 5), Position::new(3, 5), Position::new(4, 5)]
        );
    }

    #[test]
    fn test_positions_vertical_grow_along_y() {
        let ship = Ship::new(ShipKind::Medium, Position::new(0, 8), false);
        assert_eq!(ship.positions(), vec![Position::new(0, 8), Position::new(0, 9)]);
    }

    #[test]
    fn test_positions_drop_off_board_cells() {
        let ship = Ship::new(ShipKind::Huge, Position::new(8, 0), true);
        assert_eq!(ship.positions(), vec![Position::new(8, 0), Position::new(9, 0)]);
    }

    #[test]
    fn test_is_valid_position_bounds() {
        assert!(is_valid_position(0, 0));
        assert!(is_valid_position(9, 9));
        assert!(!is_valid_position(-1, 0));
        assert!(!is_valid_position(0, 10));
    }

    #[test]
    fn test_neighborhood_corner_and_centre() {
        assert_eq!(Position::new(0, 0).neighborhood().count(), 4);
        assert_eq!(Position::new(5, 5).neighborhood().count(), 9);
        assert_eq!(Position::new(9, 4).neighborhood().count(), 6);
    }

    #[test]
    fn test_is_sunk_requires_every_hit() {
        let mut ship = Ship::new(ShipKind::Medium, Position::new(0, 0), true);
        ship.hits[0] = true;
        assert!(!ship.is_sunk());
        ship.hits[1] = true;
        assert!(ship.is_sunk());
    }

    #[test]
    fn test_empty_fleet_is_never_defeated() {
        assert!(!ShipSet::new(PlayerIndex(0), vec![]).is_defeated());
    }

    #[test]
    fn test_fleet_composition_totals_ten() {
        assert_eq!(ShipKind::fleet_size(), 10);
    }

    #[test]
    fn test_ship_wire_shape_hides_hits() {
        let ship = Ship::new(ShipKind::Small, Position::new(1, 2), false);
        let json = serde_json::to_value(&ship).unwrap();
        assert_eq!(json["type"], "small");
        assert_eq!(json["position"]["x"], 1);
        assert_eq!(json["direction"], false);
        assert_eq!(json["length"], 1);
        assert!(json.get("hits").is_none());
    }
}
