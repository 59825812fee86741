//! Season-wide game numbering.
//!
//! [`build_game_number_map`] is the single source of truth for the numbers a season should carry:
//! every real game leg, in canonical order, gets the next integer starting at 1. It is recomputed
//! from scratch every time and never patched.

use std::collections::BTreeMap;

use crate::{
    dao::models::{CellId, NumberAssignment, ScheduleCellEntity},
    schedule::order::OrderKey,
};

/// Numbers assigned to one cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignedNumbers {
    /// First (or only) leg.
    pub game_number: Option<String>,
    /// Second leg of a double header.
    pub game_number2: Option<String>,
}

impl AssignedNumbers {
    /// Numbers of a cell that is not a real game.
    pub fn none() -> Self {
        Self::default()
    }

    /// Single game numbered `number`.
    pub fn single(number: u64) -> Self {
        Self {
            game_number: Some(number.to_string()),
            game_number2: None,
        }
    }

    /// Double header numbered `first` and `second`.
    pub fn double(first: u64, second: u64) -> Self {
        Self {
            game_number: Some(first.to_string()),
            game_number2: Some(second.to_string()),
        }
    }

    /// Whether `cell` already stores exactly these numbers.
    pub fn matches(&self, cell: &ScheduleCellEntity) -> bool {
        self.game_number == cell.game_number && self.game_number2 == cell.game_number2
    }
}

/// True when the cell is a game that must be numbered: both teams filled in and a status that
/// does not mean "no game".
pub fn is_real_game(cell: &ScheduleCellEntity) -> bool {
    is_real(&cell.local_team, &cell.visitors_team, cell.game_status.is_no_game())
}

pub(crate) fn is_real(local_team: &str, visitors_team: &str, no_game: bool) -> bool {
    !local_team.trim().is_empty() && !visitors_team.trim().is_empty() && !no_game
}

/// Canonical numbering of a whole season.
#[derive(Debug, Clone, Default)]
pub struct GameNumberMap {
    numbers: BTreeMap<CellId, AssignedNumbers>,
    real_games: usize,
    legs: u64,
}

impl GameNumberMap {
    /// Numbers for `cell_id`, if the cell was part of the input.
    pub fn get(&self, cell_id: CellId) -> Option<&AssignedNumbers> {
        self.numbers.get(&cell_id)
    }

    /// Count of cells that received at least one number.
    pub fn real_games(&self) -> usize {
        self.real_games
    }

    /// Highest number handed out; double headers count twice.
    pub fn legs(&self) -> u64 {
        self.legs
    }

    /// Iterate over every cell and its numbers, ordered by cell id.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &AssignedNumbers)> {
        self.numbers.iter().map(|(id, numbers)| (*id, numbers))
    }

    /// Updates needed to bring `cells` in line with this map, skipping cells that already match.
    pub fn changes(&self, cells: &[ScheduleCellEntity]) -> Vec<NumberAssignment> {
        cells
            .iter()
            .filter_map(|cell| {
                let numbers = self.numbers.get(&cell.id)?;
                (!numbers.matches(cell)).then(|| NumberAssignment {
                    cell_id: cell.id,
                    game_number: numbers.game_number.clone(),
                    game_number2: numbers.game_number2.clone(),
                })
            })
            .collect()
    }
}

/// Number every real game leg of a season, 1..=K, in canonical cell order.
pub fn build_game_number_map(cells: &[ScheduleCellEntity]) -> GameNumberMap {
    let mut ordered: Vec<&ScheduleCellEntity> = cells.iter().collect();
    // natural key breaks ties between rows sharing a grid position
    ordered.sort_by_key(|cell| (OrderKey::from(*cell), cell.id));

    let mut map = GameNumberMap::default();
    let mut counter: u64 = 1;

    for cell in ordered {
        let numbers = if !is_real_game(cell) {
            AssignedNumbers::none()
        } else if cell.is_double_game {
            let assigned = AssignedNumbers::double(counter, counter + 1);
            counter += 2;
            assigned
        } else {
            let assigned = AssignedNumbers::single(counter);
            counter += 1;
            assigned
        };

        if numbers.game_number.is_some() {
            map.real_games += 1;
        }
        map.numbers.insert(cell.id, numbers);
    }

    map.legs = counter - 1;
    map
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::seq::SliceRandom;

    use super::*;
    use crate::{dao::models::test_support::cell, schedule::order::sort_canonical};

    fn numbers_of(map: &GameNumberMap, id: CellId) -> (Option<&str>, Option<&str>) {
        let numbers = map.get(id).expect("cell numbered");
        (
            numbers.game_number.as_deref(),
            numbers.game_number2.as_deref(),
        )
    }

    fn reference_season() -> Vec<ScheduleCellEntity> {
        vec![
            cell(1, 1, 1).teams("TeamA", "TeamB"),
            cell(2, 1, 2).placeholder(),
            cell(3, 2, 1).teams("TeamC", "TeamD").double(),
            cell(4, 2, 2).teams("TeamE", "TeamF"),
        ]
    }

    #[test]
    fn numbers_reference_season() {
        let map = build_game_number_map(&reference_season());

        assert_eq!(numbers_of(&map, 1), (Some("1"), None));
        assert_eq!(numbers_of(&map, 2), (None, None));
        assert_eq!(numbers_of(&map, 3), (Some("2"), Some("3")));
        assert_eq!(numbers_of(&map, 4), (Some("4"), None));
        assert_eq!(map.real_games(), 3);
        assert_eq!(map.legs(), 4);
    }

    #[test]
    fn removing_a_double_header_closes_the_gap() {
        let mut cells = reference_season();
        cells.retain(|c| c.id != 3);
        let map = build_game_number_map(&cells);
        assert_eq!(numbers_of(&map, 4), (Some("2"), None));
    }

    #[test]
    fn excludes_placeholders_and_no_game_variants() {
        let cells = vec![
            cell(1, 1, 0).teams("", "B"),
            cell(2, 1, 1).teams("A", "   "),
            cell(3, 1, 2).status("No Game"),
            cell(4, 1, 3).status("NO-GAME").double(),
            cell(5, 1, 4).status("no_game"),
            cell(6, 1, 5),
        ];
        let map = build_game_number_map(&cells);

        for id in 1..=5 {
            assert_eq!(numbers_of(&map, id), (None, None), "cell {id}");
        }
        assert_eq!(numbers_of(&map, 6), (Some("1"), None));
    }

    #[test]
    fn numbering_is_dense_and_follows_canonical_order() {
        let mut cells: Vec<ScheduleCellEntity> = (0..40)
            .map(|i| {
                let c = cell(i + 1, (i % 5) as i32 + 1, (i / 5) as i32).at((i % 3) as i32, 0);
                match i % 7 {
                    0 => c.double(),
                    3 => c.placeholder(),
                    5 => c.status("no game"),
                    _ => c,
                }
            })
            .collect();
        let map = build_game_number_map(&cells);

        let mut seen = BTreeSet::new();
        for (_, numbers) in map.iter() {
            for number in [&numbers.game_number, &numbers.game_number2].into_iter().flatten() {
                assert!(seen.insert(number.parse::<u64>().unwrap()), "duplicate {number}");
            }
        }
        let expected: BTreeSet<u64> = (1..=map.legs()).collect();
        assert_eq!(seen, expected);

        sort_canonical(&mut cells);
        let mut last = 0;
        for c in cells.iter().filter(|c| is_real_game(c)) {
            let numbers = map.get(c.id).unwrap();
            let first: u64 = numbers.game_number.as_ref().unwrap().parse().unwrap();
            assert!(first > last);
            last = first;
            if c.is_double_game {
                let second: u64 = numbers.game_number2.as_ref().unwrap().parse().unwrap();
                assert_eq!(second, first + 1);
                last = second;
            } else {
                assert!(numbers.game_number2.is_none());
            }
        }
    }

    #[test]
    fn input_order_does_not_matter() {
        let cells: Vec<ScheduleCellEntity> = (0..25)
            .map(|i| {
                let c = cell(i + 1, (i % 4) as i32 + 1, i as i32);
                if i % 6 == 0 { c.double() } else { c }
            })
            .collect();
        let baseline = build_game_number_map(&cells);

        let mut shuffled = cells.clone();
        shuffled.shuffle(&mut rand::rng());
        let again = build_game_number_map(&shuffled);

        let left: Vec<_> = baseline.iter().collect();
        let right: Vec<_> = again.iter().collect();
        assert_eq!(left, right);
    }

    #[test]
    fn changes_skip_cells_already_numbered() {
        let cells = vec![
            cell(1, 1, 0).numbered(Some("1"), None),
            cell(2, 1, 1).numbered(Some("7"), None),
            cell(3, 1, 2).placeholder().numbered(Some("3"), None),
        ];
        let map = build_game_number_map(&cells);
        let changes = map.changes(&cells);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].cell_id, 2);
        assert_eq!(changes[0].game_number.as_deref(), Some("2"));
        assert_eq!(changes[1].cell_id, 3);
        assert_eq!(changes[1].game_number, None);
    }
}
