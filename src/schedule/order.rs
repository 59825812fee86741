use crate::dao::models::ScheduleCellEntity;

/// Position of a cell in the canonical season order: week, then grid row, then grid column,
/// then cell index, all ascending.
///
/// Derived only from persisted fields so every node sorts a season the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    week: i32,
    row: i32,
    col: i32,
    cell: i32,
}

impl OrderKey {
    /// Build a key; absent components sort as `0`.
    pub fn new(week: Option<i32>, row: Option<i32>, col: Option<i32>, cell: Option<i32>) -> Self {
        Self {
            week: week.unwrap_or(0),
            row: row.unwrap_or(0),
            col: col.unwrap_or(0),
            cell: cell.unwrap_or(0),
        }
    }
}

impl From<&ScheduleCellEntity> for OrderKey {
    fn from(cell: &ScheduleCellEntity) -> Self {
        Self::new(
            Some(cell.week_number),
            Some(cell.row_index),
            Some(cell.col_index),
            Some(cell.cell_index),
        )
    }
}

/// Sort cells into canonical order. The sort is stable.
pub fn sort_canonical(cells: &mut [ScheduleCellEntity]) {
    cells.sort_by_key(|cell| OrderKey::from(cell));
}
