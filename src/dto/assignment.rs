//! Wire types of the `/assignments` routes.
//!
//! Field names are camelCase to stay compatible with the schedule grid client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{CellData, CellId, CellPatch, ScheduleCellEntity, SeasonId},
    dto::format_system_time,
    error::ServiceError,
    schedule::{GameStatus, UmpireSlots, umpires::normalize_optional_umpires},
};

/// Full cell written by the grid editor. Game numbers sent by the client are ignored.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertAssignmentRequest {
    /// Row id when the client already knows it.
    #[serde(default)]
    pub id: Option<CellId>,
    #[validate(required, range(min = 1))]
    pub season_id: Option<SeasonId>,
    #[validate(required, range(min = 1))]
    pub week_number: Option<i32>,
    #[validate(required, range(min = 0))]
    pub cell_index: Option<i32>,
    #[serde(default)]
    pub row_index: Option<i32>,
    #[serde(default)]
    pub col_index: Option<i32>,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub day_name: Option<String>,
    #[serde(default)]
    pub date_str: Option<String>,
    #[serde(default)]
    pub stadium_city: Option<String>,
    #[serde(default)]
    pub stadium_name: Option<String>,
    #[serde(default)]
    pub local_team: Option<String>,
    #[serde(default)]
    pub visitors_team: Option<String>,
    #[serde(default)]
    pub game_time: Option<String>,
    #[serde(default)]
    pub game_time2: Option<String>,
    /// `game`, `no_game` or free text; defaults to `game`.
    #[serde(default)]
    pub game_status: Option<String>,
    #[serde(default)]
    pub is_double_game: Option<bool>,
    #[serde(default)]
    pub is_final_game: Option<bool>,
    /// Umpire slots in any accepted shape (object or JSON-encoded string).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub umpires: Option<Value>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

impl UpsertAssignmentRequest {
    /// Convert into storage data, filling defaults. Numbers are left empty for the allocator.
    pub fn into_cell_data(self) -> Result<CellData, ServiceError> {
        let (Some(season_id), Some(week_number), Some(cell_index)) =
            (self.season_id, self.week_number, self.cell_index)
        else {
            return Err(ServiceError::InvalidInput(
                "seasonId, weekNumber and cellIndex are required".into(),
            ));
        };

        let context = format!("season={season_id} week={week_number} cell={cell_index}");
        let umpires = normalize_optional_umpires(self.umpires.as_ref(), &context);

        Ok(CellData {
            season_id,
            week_number,
            cell_index,
            row_index: self.row_index.unwrap_or(0),
            col_index: self.col_index.unwrap_or(0),
            league: non_empty(self.league),
            day_name: self.day_name.unwrap_or_default(),
            date_str: self.date_str.unwrap_or_default(),
            stadium_city: self.stadium_city.unwrap_or_default(),
            stadium_name: self.stadium_name.unwrap_or_default(),
            local_team: self.local_team.unwrap_or_default(),
            visitors_team: self.visitors_team.unwrap_or_default(),
            game_number: None,
            game_number2: None,
            game_time: non_empty(self.game_time),
            game_time2: non_empty(self.game_time2),
            game_status: self
                .game_status
                .as_deref()
                .map(GameStatus::parse)
                .unwrap_or_default(),
            is_double_game: self.is_double_game.unwrap_or(false),
            is_final_game: self.is_final_game.unwrap_or(false),
            umpires,
        })
    }
}

/// Partial edit of a cell addressed by id. Absent fields are left untouched; `null` clears the
/// nullable ones.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchAssignmentRequest {
    #[validate(range(min = 1))]
    pub week_number: Option<i32>,
    #[validate(range(min = 0))]
    pub cell_index: Option<i32>,
    pub row_index: Option<i32>,
    pub col_index: Option<i32>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub league: Option<Option<String>>,
    pub day_name: Option<String>,
    pub date_str: Option<String>,
    pub stadium_city: Option<String>,
    pub stadium_name: Option<String>,
    pub local_team: Option<String>,
    pub visitors_team: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub game_time: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub game_time2: Option<Option<String>>,
    pub game_status: Option<String>,
    pub is_double_game: Option<bool>,
    pub is_final_game: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub umpires: Option<Value>,
}

impl PatchAssignmentRequest {
    /// Storage patch for the row `id`. Game numbers are never patched directly.
    pub fn into_patch(self, id: CellId) -> CellPatch {
        let context = format!("cell={id}");
        CellPatch {
            week_number: self.week_number,
            cell_index: self.cell_index,
            row_index: self.row_index,
            col_index: self.col_index,
            league: self.league.map(non_empty),
            day_name: self.day_name,
            date_str: self.date_str,
            stadium_city: self.stadium_city,
            stadium_name: self.stadium_name,
            local_team: self.local_team,
            visitors_team: self.visitors_team,
            game_number: None,
            game_number2: None,
            game_time: self.game_time.map(non_empty),
            game_time2: self.game_time2.map(non_empty),
            game_status: self.game_status.as_deref().map(GameStatus::parse),
            is_double_game: self.is_double_game,
            is_final_game: self.is_final_game,
            umpires: self
                .umpires
                .map(|raw| normalize_optional_umpires(Some(&raw), &context)),
        }
    }
}

/// Filters of `GET /assignments`.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AssignmentListQuery {
    /// Season to list (`id` is accepted as an alias).
    #[serde(alias = "id")]
    #[validate(required, range(min = 1))]
    pub season_id: Option<SeasonId>,
    /// Only this week; ignored when not positive.
    pub week: Option<i32>,
    /// Exact game status.
    pub status: Option<String>,
    /// Exact stadium city.
    pub city: Option<String>,
    /// Case-insensitive text search over teams, stadium and day name.
    pub q: Option<String>,
}

impl AssignmentListQuery {
    /// Whether `cell` passes every filter.
    pub fn matches(&self, cell: &ScheduleCellEntity) -> bool {
        if let Some(week) = self.week.filter(|week| *week > 0) {
            if cell.week_number != week {
                return false;
            }
        }
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            if cell.game_status.as_str() != status {
                return false;
            }
        }
        if let Some(city) = self.city.as_deref().filter(|c| !c.is_empty()) {
            if cell.stadium_city != city {
                return false;
            }
        }
        let needle = self
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .unwrap_or_default();
        if needle.is_empty() {
            return true;
        }
        [
            &cell.local_team,
            &cell.visitors_team,
            &cell.stadium_name,
            &cell.stadium_city,
            &cell.day_name,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// One schedule cell as returned to the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub id: CellId,
    pub season_id: SeasonId,
    pub week_number: i32,
    pub cell_index: i32,
    pub row_index: i32,
    pub col_index: i32,
    pub league: Option<String>,
    pub day_name: String,
    pub date_str: String,
    pub stadium_city: String,
    pub stadium_name: String,
    pub local_team: String,
    pub visitors_team: String,
    pub game_number: Option<String>,
    pub game_number2: Option<String>,
    pub game_time: Option<String>,
    pub game_time2: Option<String>,
    #[schema(value_type = String)]
    pub game_status: GameStatus,
    pub is_double_game: bool,
    pub is_final_game: bool,
    #[schema(value_type = Object)]
    pub umpires: UmpireSlots,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ScheduleCellEntity> for AssignmentView {
    fn from(value: ScheduleCellEntity) -> Self {
        Self {
            id: value.id,
            season_id: value.season_id,
            week_number: value.week_number,
            cell_index: value.cell_index,
            row_index: value.row_index,
            col_index: value.col_index,
            league: value.league,
            day_name: value.day_name,
            date_str: value.date_str,
            stadium_city: value.stadium_city,
            stadium_name: value.stadium_name,
            local_team: value.local_team,
            visitors_team: value.visitors_team,
            game_number: value.game_number,
            game_number2: value.game_number2,
            game_time: value.game_time,
            game_time2: value.game_time2,
            game_status: value.game_status,
            is_double_game: value.is_double_game,
            is_final_game: value.is_final_game,
            umpires: value.umpires,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

/// Response of `GET /assignments`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentListResponse {
    pub items: Vec<AssignmentView>,
}

/// Response of the upsert and patch routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub ok: bool,
    pub assignment: AssignmentView,
}

impl From<AssignmentView> for AssignmentResponse {
    fn from(assignment: AssignmentView) -> Self {
        Self {
            ok: true,
            assignment,
        }
    }
}

/// Query of `GET /seasons/{id}/next-numbers`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextNumbersQuery {
    /// Preview numbers for a double header.
    #[serde(default)]
    pub double: bool,
}

/// Numbers a new cell would receive if saved now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextNumbersResponse {
    pub season_id: SeasonId,
    pub next: u64,
    pub next2: Option<u64>,
}

/// Outcome of a season recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeResponse {
    pub season_id: SeasonId,
    /// Cells holding a real game.
    pub real_games: usize,
    /// Numbers handed out (double headers count twice).
    pub legs: u64,
    /// Cells whose stored numbers changed.
    pub updated: usize,
}

/// Body of `POST /assignments/finish`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinishSeasonRequest {
    #[validate(required, range(min = 1))]
    pub season_id: Option<SeasonId>,
    /// Final week count; ignored unless positive.
    #[serde(default)]
    pub total_weeks: Option<i32>,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub ok: bool,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
