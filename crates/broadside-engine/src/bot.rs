//! Random choices for the computer opponent and for timed-out players.

use rand::Rng;
use rand::seq::IteratorRandom;
use tracing::{debug, warn};

use crate::board::{BOARD_SIZE, Board};
use crate::ship::{Position, Ship, ShipKind};

/// Rejected draws [`random_coordinates`] tolerates before it falls back to
/// enumerating the unexplored cells.
const MAX_COORDINATE_DRAWS: usize = 64;

/// Candidate anchors tried for a single ship before the fleet restarts.
const MAX_PLACEMENT_DRAWS: usize = 500;

/// Full fleet restarts before the fixed layout is used.
const MAX_FLEET_ATTEMPTS: usize = 100;

/// Draws uniformly random cells until one has not been fired at.
///
/// After [`MAX_COORDINATE_DRAWS`] rejections it degrades to
/// [`random_attack_position`], so it always terminates. Returns `None` only
/// when the board is fully explored.
pub fn random_coordinates<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<Position> {
    let size = BOARD_SIZE as i64;
    for _ in 0..MAX_COORDINATE_DRAWS {
        let pos = Position::new(rng.random_range(0..size), rng.random_range(0..size));
        if board.get(pos).is_some_and(|cell| !cell.is_explored()) {
            return Some(pos);
        }
    }
    random_attack_position(board, rng)
}

/// Picks uniformly among the [`Cell::Empty`](crate::Cell::Empty) cells.
///
/// Returns `None` when every cell has been explored.
pub fn random_attack_position<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<Position> {
    board.unexplored().choose(rng)
}

/// Generates a standard fleet in which no two ships share or touch a cell,
/// diagonals included.
///
/// Classes are placed largest first, each by rejection sampling a random
/// anchor and direction. If a ship cannot be placed the whole fleet is
/// started over.
pub fn generate_bot_ships<R: Rng + ?Sized>(rng: &mut R) -> Vec<Ship> {
    for attempt in 1..=MAX_FLEET_ATTEMPTS {
        if let Some(fleet) = try_generate_fleet(rng) {
            return fleet;
        }
        debug!(attempt, "bot fleet placement dead-ended, restarting");
    }
    warn!(
        attempts = MAX_FLEET_ATTEMPTS,
        "falling back to fixed bot fleet"
    );
    fixed_fleet()
}

fn try_generate_fleet<R: Rng + ?Sized>(rng: &mut R) -> Option<Vec<Ship>> {
    let size = BOARD_SIZE as i64;
    let mut ships: Vec<Ship> = Vec::with_capacity(ShipKind::fleet_size());

    for kind in ShipKind::ALL {
        for _ in 0..kind.count() {
            let placed = (0..MAX_PLACEMENT_DRAWS).find_map(|_| {
                let anchor = Position::new(rng.random_range(0..size), rng.random_range(0..size));
                let candidate = Ship::new(kind, anchor, rng.random::<bool>());
                fits_clear_of(&candidate, &ships).then_some(candidate)
            })?;
            ships.push(placed);
        }
    }

    Some(ships)
}

/// `true` if `candidate` lies fully on the board and none of its cells or
/// their neighbours is occupied by `placed`.
fn fits_clear_of(candidate: &Ship, placed: &[Ship]) -> bool {
    let cells = candidate.positions();
    if cells.len() != candidate.length {
        return false;
    }
    !cells
        .iter()
        .flat_map(|cell| cell.neighborhood())
        .any(|n| placed.iter().any(|ship| ship.occupies(n)))
}

fn fixed_fleet() -> Vec<Ship> {
    const LAYOUT: [(ShipKind, i64, i64); 10] = [
        (ShipKind::Huge, 0, 0),
        (ShipKind::Large, 5, 0),
        (ShipKind::Large, 0, 2),
        (ShipKind::Medium, 4, 2),
        (ShipKind::Medium, 7, 2),
        (ShipKind::Medium, 0, 4),
        (ShipKind::Small, 3, 4),
        (ShipKind::Small, 5, 4),
        (ShipKind::Small, 7, 4),
        (ShipKind::Small, 9, 4),
    ];
    LAYOUT
        .iter()
        .map(|&(kind, x, y)| Ship::new(kind, Position::new(x, y), true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::placement::check_fleet;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_attack_position_picks_last_empty_cell() {
        let mut board = Board::new();
        for pos in Board::positions() {
            board.set(pos, Cell::Miss);
        }
        board.set(Position::new(4, 7), Cell::Empty);

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            random_attack_position(&board, &mut rng),
            Some(Position::new(4, 7))
        );
        assert_eq!(random_coordinates(&board, &mut rng), Some(Position::new(4, 7)));
    }

    #[test]
    fn test_random_attack_position_full_board_is_none() {
        let mut board = Board::new();
        for pos in Board::positions() {
            board.set(pos, Cell::Hit);
        }
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(random_attack_position(&board, &mut rng), None);
        assert_eq!(random_coordinates(&board, &mut rng), None);
    }

    #[test]
    fn test_generate_bot_ships_is_a_legal_fleet() {
        let mut rng = StdRng::seed_from_u64(7);
        let fleet = generate_bot_ships(&mut rng);
        assert_eq!(fleet.len(), 10);
        assert_eq!(check_fleet(&fleet), Ok(()));
    }

    #[test]
    fn test_generate_bot_ships_seed_is_reproducible() {
        let a = generate_bot_ships(&mut StdRng::seed_from_u64(99));
        let b = generate_bot_ships(&mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_fleet_is_legal() {
        assert_eq!(check_fleet(&fixed_fleet()), Ok(()));
    }
}
