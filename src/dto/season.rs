//! Wire types of the `/seasons` routes.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{SeasonEntity, SeasonId, SeasonStatus, iso_date},
    dto::{
        format_system_time,
        validation::{validate_iso_date, validate_league},
    },
};

/// Weeks given to a season created without an explicit count.
pub const DEFAULT_TOTAL_WEEKS: i32 = 16;
/// Upper bound on a season's length.
pub const MAX_TOTAL_WEEKS: i32 = 60;

/// Body of `POST /seasons`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeasonRequest {
    /// `LVBP` or `LMBP`.
    #[validate(custom(function = "validate_league"))]
    pub league: String,
    /// `YYYY-MM-DD`.
    #[validate(custom(function = "validate_iso_date"))]
    pub start_date: String,
    #[serde(default)]
    #[validate(range(min = 1, max = 60))]
    pub total_weeks: Option<i32>,
}

/// Body of `PATCH /seasons/{id}`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeasonRequest {
    #[serde(default)]
    #[validate(range(min = 1, max = 60))]
    pub total_weeks: Option<i32>,
    #[serde(default)]
    pub is_finished: Option<bool>,
}

/// Query of `GET /seasons`.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct SeasonListQuery {
    /// Restrict to one league.
    #[validate(custom(function = "validate_league"))]
    pub league: Option<String>,
}

/// Season as returned to the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeasonView {
    pub id: SeasonId,
    pub league: String,
    pub start_date: String,
    pub total_weeks: i32,
    /// `active` or `finished`.
    pub status: String,
    pub is_finished: bool,
    pub created_at: String,
}

impl From<SeasonEntity> for SeasonView {
    fn from(value: SeasonEntity) -> Self {
        let is_finished = value.status == SeasonStatus::Finished;
        Self {
            id: value.id,
            league: value.league.code().to_owned(),
            start_date: iso_date::format(value.start_date)
                .unwrap_or_else(|_| "invalid-date".into()),
            total_weeks: value.total_weeks,
            status: if is_finished { "finished" } else { "active" }.to_owned(),
            is_finished,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Single season response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SeasonResponse {
    pub season: SeasonView,
}

/// Season list response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SeasonListResponse {
    pub items: Vec<SeasonView>,
}
