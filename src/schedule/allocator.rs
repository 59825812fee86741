//! Per-save number allocation.
//!
//! Saving one cell must not shift the numbers of every other cell, so a save only mints or
//! extends numbers for the cell being written. Gaps and reorderings are left for the season
//! recompute ([`crate::schedule::numbering`]).

use serde::Serialize;

use crate::{
    dao::models::{CellData, ScheduleCellEntity},
    schedule::numbering::AssignedNumbers,
};

/// Largest stored number taken at face value; anything above it is treated as garbage.
pub const MAX_GAME_NUMBER: u64 = (1 << 53) - 1;

/// Parse a stored game number. Anything that is not a positive whole number up to
/// [`MAX_GAME_NUMBER`] counts as absent.
pub fn parse_game_number(raw: Option<&str>) -> Option<u64> {
    let value = raw?.trim().parse::<f64>().ok()?;
    let whole = value.is_finite() && value.fract() == 0.0;
    if whole && value >= 1.0 && value <= MAX_GAME_NUMBER as f64 {
        Some(value as u64)
    } else {
        None
    }
}

/// Highest number in use anywhere in the season, `0` for an unnumbered season.
pub fn season_max(cells: &[ScheduleCellEntity]) -> u64 {
    cells
        .iter()
        .flat_map(|cell| [cell.game_number.as_deref(), cell.game_number2.as_deref()])
        .filter_map(parse_game_number)
        .max()
        .unwrap_or(0)
}

fn number_in_use(cells: &[ScheduleCellEntity], candidate: u64, except: &ScheduleCellEntity) -> bool {
    cells
        .iter()
        .filter(|cell| cell.id != except.id)
        .flat_map(|cell| [cell.game_number.as_deref(), cell.game_number2.as_deref()])
        .filter_map(parse_game_number)
        .any(|number| number == candidate)
}

/// Decide the numbers for a cell about to be saved.
///
/// `season` is the season as currently stored (it may or may not include `existing`), `existing`
/// the stored row for the cell when there is one, and `incoming` the data being written.
pub fn allocate(
    season: &[ScheduleCellEntity],
    existing: Option<&ScheduleCellEntity>,
    incoming: &CellData,
) -> AssignedNumbers {
    if !incoming.is_real_game() {
        return AssignedNumbers::none();
    }

    let existing_first = existing.and_then(|row| parse_game_number(row.game_number.as_deref()));

    let (Some(row), Some(first)) = (existing, existing_first) else {
        return mint(season, incoming.is_double_game);
    };

    if !incoming.is_double_game {
        return AssignedNumbers {
            game_number: row.game_number.clone(),
            game_number2: None,
        };
    }

    if parse_game_number(row.game_number2.as_deref()).is_some() {
        return AssignedNumbers {
            game_number: row.game_number.clone(),
            game_number2: row.game_number2.clone(),
        };
    }

    let candidate = first.saturating_add(1);
    let second = if number_in_use(season, candidate, row) {
        season_max(season).saturating_add(1)
    } else {
        candidate
    };

    AssignedNumbers {
        game_number: row.game_number.clone(),
        game_number2: Some(second.to_string()),
    }
}

fn mint(season: &[ScheduleCellEntity], double: bool) -> AssignedNumbers {
    let max = season_max(season);
    if double {
        AssignedNumbers::double(max.saturating_add(1), max.saturating_add(2))
    } else {
        AssignedNumbers::single(max.saturating_add(1))
    }
}

/// Numbers the next new cell would receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextNumbers {
    /// First leg.
    pub next: u64,
    /// Second leg, only for a double header.
    pub next2: Option<u64>,
}

/// Read-only estimate of the numbers a new cell would get, for previews before saving.
pub fn preview(season: &[ScheduleCellEntity], double: bool) -> NextNumbers {
    let max = season_max(season);
    NextNumbers {
        next: max.saturating_add(1),
        next2: double.then_some(max.saturating_add(2)),
    }
}
