use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use time::Date;

use crate::schedule::{GameStatus, UmpireSlots, numbering::is_real};

/// Identifier of a season row.
pub type SeasonId = i64;
/// Identifier of a schedule cell row.
pub type CellId = i64;

/// Natural key of a schedule cell: at most one row exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    /// Owning season.
    pub season_id: SeasonId,
    /// Week of the season, starting at 1.
    pub week_number: i32,
    /// Slot inside the week grid.
    pub cell_index: i32,
}

/// One cell of a season's weekly grid as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleCellEntity {
    /// Primary key.
    pub id: CellId,
    /// Owning season.
    pub season_id: SeasonId,
    /// Week of the season, starting at 1.
    pub week_number: i32,
    /// Slot inside the week grid.
    pub cell_index: i32,
    /// Grid row, used for ordering and display.
    pub row_index: i32,
    /// Grid column, used for ordering and display.
    pub col_index: i32,
    /// League label copied from the grid.
    pub league: Option<String>,
    /// Display day name.
    pub day_name: String,
    /// Display date.
    pub date_str: String,
    /// Stadium city.
    pub stadium_city: String,
    /// Stadium name.
    pub stadium_name: String,
    /// Home team, empty while unfilled.
    pub local_team: String,
    /// Visiting team, empty while unfilled.
    pub visitors_team: String,
    /// Number of the first (or only) leg.
    pub game_number: Option<String>,
    /// Number of the second leg of a double header.
    pub game_number2: Option<String>,
    /// Start time of the first leg.
    pub game_time: Option<String>,
    /// Start time of the second leg.
    pub game_time2: Option<String>,
    /// Status of the cell.
    pub game_status: GameStatus,
    /// Whether the cell holds two games.
    pub is_double_game: bool,
    /// Whether this is a final-series game.
    pub is_final_game: bool,
    /// Umpire assignments.
    pub umpires: UmpireSlots,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the row was written.
    pub updated_at: SystemTime,
}

impl ScheduleCellEntity {
    /// Natural key of the row.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            season_id: self.season_id,
            week_number: self.week_number,
            cell_index: self.cell_index,
        }
    }

    /// Build a row from write data.
    pub fn from_data(id: CellId, data: CellData, created_at: SystemTime, updated_at: SystemTime) -> Self {
        Self {
            id,
            season_id: data.season_id,
            week_number: data.week_number,
            cell_index: data.cell_index,
            row_index: data.row_index,
            col_index: data.col_index,
            league: data.league,
            day_name: data.day_name,
            date_str: data.date_str,
            stadium_city: data.stadium_city,
            stadium_name: data.stadium_name,
            local_team: data.local_team,
            visitors_team: data.visitors_team,
            game_number: data.game_number,
            game_number2: data.game_number2,
            game_time: data.game_time,
            game_time2: data.game_time2,
            game_status: data.game_status,
            is_double_game: data.is_double_game,
            is_final_game: data.is_final_game,
            umpires: data.umpires,
            created_at,
            updated_at,
        }
    }

    /// Write data equivalent to the current row.
    pub fn data(&self) -> CellData {
        CellData {
            season_id: self.season_id,
            week_number: self.week_number,
            cell_index: self.cell_index,
            row_index: self.row_index,
            col_index: self.col_index,
            league: self.league.clone(),
            day_name: self.day_name.clone(),
            date_str: self.date_str.clone(),
            stadium_city: self.stadium_city.clone(),
            stadium_name: self.stadium_name.clone(),
            local_team: self.local_team.clone(),
            visitors_team: self.visitors_team.clone(),
            game_number: self.game_number.clone(),
            game_number2: self.game_number2.clone(),
            game_time: self.game_time.clone(),
            game_time2: self.game_time2.clone(),
            game_status: self.game_status.clone(),
            is_double_game: self.is_double_game,
            is_final_game: self.is_final_game,
            umpires: self.umpires.clone(),
        }
    }
}

/// Full content written for a schedule cell, keyed by its natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct CellData {
    /// Owning season.
    pub season_id: SeasonId,
    /// Week of the season.
    pub week_number: i32,
    /// Slot inside the week grid.
    pub cell_index: i32,
    /// Grid row.
    pub row_index: i32,
    /// Grid column.
    pub col_index: i32,
    /// League label.
    pub league: Option<String>,
    /// Display day name.
    pub day_name: String,
    /// Display date.
    pub date_str: String,
    /// Stadium city.
    pub stadium_city: String,
    /// Stadium name.
    pub stadium_name: String,
    /// Home team.
    pub local_team: String,
    /// Visiting team.
    pub visitors_team: String,
    /// First leg number.
    pub game_number: Option<String>,
    /// Second leg number.
    pub game_number2: Option<String>,
    /// First leg start time.
    pub game_time: Option<String>,
    /// Second leg start time.
    pub game_time2: Option<String>,
    /// Status.
    pub game_status: GameStatus,
    /// Double header flag.
    pub is_double_game: bool,
    /// Final-series flag.
    pub is_final_game: bool,
    /// Umpire assignments.
    pub umpires: UmpireSlots,
}

impl CellData {
    /// Natural key the data will be stored under.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            season_id: self.season_id,
            week_number: self.week_number,
            cell_index: self.cell_index,
        }
    }

    /// Whether the data describes a game that must be numbered.
    pub fn is_real_game(&self) -> bool {
        is_real(
            &self.local_team,
            &self.visitors_team,
            self.game_status.is_no_game(),
        )
    }
}

/// Partial update of a schedule cell addressed by id. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellPatch {
    /// New week.
    pub week_number: Option<i32>,
    /// New grid slot.
    pub cell_index: Option<i32>,
    /// New grid row.
    pub row_index: Option<i32>,
    /// New grid column.
    pub col_index: Option<i32>,
    /// New league label (`Some(None)` clears it).
    pub league: Option<Option<String>>,
    /// New day name.
    pub day_name: Option<String>,
    /// New date.
    pub date_str: Option<String>,
    /// New stadium city.
    pub stadium_city: Option<String>,
    /// New stadium name.
    pub stadium_name: Option<String>,
    /// New home team.
    pub local_team: Option<String>,
    /// New visiting team.
    pub visitors_team: Option<String>,
    /// New first leg number.
    pub game_number: Option<Option<String>>,
    /// New second leg number.
    pub game_number2: Option<Option<String>>,
    /// New first leg time.
    pub game_time: Option<Option<String>>,
    /// New second leg time.
    pub game_time2: Option<Option<String>>,
    /// New status.
    pub game_status: Option<GameStatus>,
    /// New double header flag.
    pub is_double_game: Option<bool>,
    /// New final-series flag.
    pub is_final_game: Option<bool>,
    /// New umpire assignments.
    pub umpires: Option<UmpireSlots>,
}

impl CellPatch {
    /// Patch that overwrites every field with `data`. The season is never changed by a patch.
    pub fn replace_with(data: CellData) -> Self {
        Self {
            week_number: Some(data.week_number),
            cell_index: Some(data.cell_index),
            row_index: Some(data.row_index),
            col_index: Some(data.col_index),
            league: Some(data.league),
            day_name: Some(data.day_name),
            date_str: Some(data.date_str),
            stadium_city: Some(data.stadium_city),
            stadium_name: Some(data.stadium_name),
            local_team: Some(data.local_team),
            visitors_team: Some(data.visitors_team),
            game_number: Some(data.game_number),
            game_number2: Some(data.game_number2),
            game_time: Some(data.game_time),
            game_time2: Some(data.game_time2),
            game_status: Some(data.game_status),
            is_double_game: Some(data.is_double_game),
            is_final_game: Some(data.is_final_game),
            umpires: Some(data.umpires),
        }
    }

    /// Apply the patch on top of `data`.
    pub fn apply(self, data: &mut CellData) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field { data.$field = value; })*
            };
        }
        set!(
            week_number,
            cell_index,
            row_index,
            col_index,
            league,
            day_name,
            date_str,
            stadium_city,
            stadium_name,
            local_team,
            visitors_team,
            game_number,
            game_number2,
            game_time,
            game_time2,
            game_status,
            is_double_game,
            is_final_game,
            umpires,
        );
    }
}

/// New numbers for one cell, written as part of a season recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberAssignment {
    /// Target cell.
    pub cell_id: CellId,
    /// First leg number.
    pub game_number: Option<String>,
    /// Second leg number.
    pub game_number2: Option<String>,
}

/// League a season belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum League {
    /// Liga Venezolana de Béisbol Profesional.
    #[serde(rename = "LVBP")]
    Lvbp,
    /// Liga Mayor de Béisbol Profesional.
    #[serde(rename = "LMBP")]
    Lmbp,
}

impl League {
    /// Parse the wire code of a league.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "LVBP" => Some(League::Lvbp),
            "LMBP" => Some(League::Lmbp),
            _ => None,
        }
    }

    /// Wire code of the league.
    pub fn code(self) -> &'static str {
        match self {
            League::Lvbp => "LVBP",
            League::Lmbp => "LMBP",
        }
    }
}

/// Lifecycle of a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonStatus {
    /// Schedule still being edited.
    Active,
    /// Season closed by an administrator.
    Finished,
}

/// Season row owning many schedule cells.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonEntity {
    /// Primary key.
    pub id: SeasonId,
    /// League of the season.
    pub league: League,
    /// First day of the season.
    #[serde(with = "iso_date")]
    pub start_date: Date,
    /// Number of weeks; grows with the highest week saved.
    pub total_weeks: i32,
    /// Lifecycle status.
    pub status: SeasonStatus,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Data needed to create a season.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSeason {
    /// League of the season.
    pub league: League,
    /// First day of the season.
    pub start_date: Date,
    /// Initial number of weeks.
    pub total_weeks: i32,
}

/// `YYYY-MM-DD` dates.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
    use time::{Date, macros::format_description};

    /// Parse a `YYYY-MM-DD` string.
    pub fn parse(text: &str) -> Result<Date, time::error::Parse> {
        Date::parse(text, format_description!("[year]-[month]-[day]"))
    }

    /// Format as `YYYY-MM-DD`.
    pub fn format(date: Date) -> Result<String, time::error::Format> {
        date.format(format_description!("[year]-[month]-[day]"))
    }

    /// Serde serializer.
    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let text = format(*date).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    /// Serde deserializer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::SystemTime;

    use super::*;

    /// Real single game `Local{id}` vs `Visitor{id}` in season 1.
    pub fn cell(id: CellId, week: i32, cell_index: i32) -> ScheduleCellEntity {
        let now = SystemTime::UNIX_EPOCH;
        ScheduleCellEntity::from_data(
            id,
            CellData {
                season_id: 1,
                week_number: week,
                cell_index,
                row_index: 0,
                col_index: 0,
                league: None,
                day_name: String::new(),
                date_str: String::new(),
                stadium_city: String::new(),
                stadium_name: String::new(),
                local_team: format!("Local{id}"),
                visitors_team: format!("Visitor{id}"),
                game_number: None,
                game_number2: None,
                game_time: None,
                game_time2: None,
                game_status: GameStatus::Game,
                is_double_game: false,
                is_final_game: false,
                umpires: UmpireSlots::empty(),
            },
            now,
            now,
        )
    }

    impl ScheduleCellEntity {
        pub fn at(mut self, row: i32, col: i32) -> Self {
            self.row_index = row;
            self.col_index = col;
            self
        }

        pub fn teams(mut self, local: &str, visitors: &str) -> Self {
            self.local_team = local.into();
            self.visitors_team = visitors.into();
            self
        }

        pub fn placeholder(self) -> Self {
            self.teams("", "")
        }

        pub fn double(mut self) -> Self {
            self.is_double_game = true;
            self
        }

        pub fn single(mut self) -> Self {
            self.is_double_game = false;
            self
        }

        pub fn status(mut self, raw: &str) -> Self {
            self.game_status = GameStatus::parse(raw);
            self
        }

        pub fn numbered(mut self, first: Option<&str>, second: Option<&str>) -> Self {
            self.game_number = first.map(Into::into);
            self.game_number2 = second.map(Into::into);
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::cell;

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut data = cell(1, 2, 3).numbered(Some("4"), None).data();
        CellPatch {
            local_team: Some("Leones".into()),
            game_number2: Some(Some("5".into())),
            league: Some(None),
            ..CellPatch::default()
        }
        .apply(&mut data);

        assert_eq!(data.local_team, "Leones");
        assert_eq!(data.visitors_team, "Visitor1");
        assert_eq!(data.game_number.as_deref(), Some("4"));
        assert_eq!(data.game_number2.as_deref(), Some("5"));
        assert_eq!(data.week_number, 2);
    }

    #[test]
    fn replace_patch_round_trips_data() {
        let source = cell(7, 3, 1).double().numbered(Some("9"), Some("10")).data();
        let mut target = cell(8, 1, 0).data();
        CellPatch::replace_with(source.clone()).apply(&mut target);
        assert_eq!(target, source);
    }

    #[test]
    fn season_dates_use_iso_format() {
        let season = SeasonEntity {
            id: 1,
            league: League::Lvbp,
            start_date: iso_date::parse("2025-10-14").unwrap(),
            total_weeks: 16,
            status: SeasonStatus::Active,
            created_at: SystemTime::UNIX_EPOCH,
        };
        let encoded = serde_json::to_value(&season).unwrap();
        assert_eq!(encoded["start_date"], "2025-10-14");
        assert_eq!(encoded["league"], "LVBP");
        assert_eq!(encoded["status"], "active");
        assert!(iso_date::parse("14/10/2025").is_err());
    }
}
