use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dao::models::SeasonId,
    dto::{
        assignment::{NextNumbersQuery, NextNumbersResponse, RecomputeResponse},
        season::{
            CreateSeasonRequest, SeasonListQuery, SeasonListResponse, SeasonResponse,
            UpdateSeasonRequest,
        },
    },
    error::AppError,
    services::{assignment_service, season_service},
    state::SharedState,
};

/// Season management and numbering maintenance endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/seasons", get(list_seasons).post(create_season))
        .route("/seasons/{id}", get(get_season).patch(update_season))
        .route("/seasons/{id}/recompute", post(recompute_season))
        .route("/seasons/{id}/next-numbers", get(next_numbers))
}

/// Create a season.
#[utoipa::path(
    post,
    path = "/seasons",
    tag = "seasons",
    request_body = CreateSeasonRequest,
    responses(
        (status = 201, description = "Season created", body = SeasonResponse),
        (status = 409, description = "Same league and start date already exist")
    )
)]
pub async fn create_season(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSeasonRequest>,
) -> Result<(StatusCode, Json<SeasonResponse>), AppError> {
    let season = season_service::create_season(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(SeasonResponse { season })))
}

/// List seasons, newest first.
#[utoipa::path(
    get,
    path = "/seasons",
    tag = "seasons",
    params(SeasonListQuery),
    responses((status = 200, description = "Seasons", body = SeasonListResponse))
)]
pub async fn list_seasons(
    State(state): State<SharedState>,
    Query(query): Query<SeasonListQuery>,
) -> Result<Json<SeasonListResponse>, AppError> {
    let items = season_service::list_seasons(&state, query).await?;
    Ok(Json(SeasonListResponse { items }))
}

/// Retrieve a season by id.
#[utoipa::path(
    get,
    path = "/seasons/{id}",
    tag = "seasons",
    params(("id" = i64, Path, description = "Season identifier")),
    responses(
        (status = 200, description = "Season", body = SeasonResponse),
        (status = 404, description = "Unknown season")
    )
)]
pub async fn get_season(
    State(state): State<SharedState>,
    Path(id): Path<SeasonId>,
) -> Result<Json<SeasonResponse>, AppError> {
    let season = season_service::get_season(&state, id).await?;
    Ok(Json(SeasonResponse { season }))
}

/// Change a season's week count or finished flag.
#[utoipa::path(
    patch,
    path = "/seasons/{id}",
    tag = "seasons",
    params(("id" = i64, Path, description = "Season identifier")),
    request_body = UpdateSeasonRequest,
    responses(
        (status = 200, description = "Season updated", body = SeasonResponse),
        (status = 400, description = "Nothing to update or invalid week count"),
        (status = 404, description = "Unknown season")
    )
)]
pub async fn update_season(
    State(state): State<SharedState>,
    Path(id): Path<SeasonId>,
    Json(payload): Json<UpdateSeasonRequest>,
) -> Result<Json<SeasonResponse>, AppError> {
    let season = season_service::update_season(&state, id, payload).await?;
    Ok(Json(SeasonResponse { season }))
}

/// Renumber every game of a season from scratch.
#[utoipa::path(
    post,
    path = "/seasons/{id}/recompute",
    tag = "seasons",
    params(("id" = i64, Path, description = "Season identifier")),
    responses(
        (status = 200, description = "Season renumbered", body = RecomputeResponse),
        (status = 404, description = "Unknown season")
    )
)]
pub async fn recompute_season(
    State(state): State<SharedState>,
    Path(id): Path<SeasonId>,
) -> Result<Json<RecomputeResponse>, AppError> {
    Ok(Json(assignment_service::recompute_season(&state, id).await?))
}

/// Preview the numbers the next new game of the season would receive.
#[utoipa::path(
    get,
    path = "/seasons/{id}/next-numbers",
    tag = "seasons",
    params(("id" = i64, Path, description = "Season identifier"), NextNumbersQuery),
    responses(
        (status = 200, description = "Next free numbers", body = NextNumbersResponse),
        (status = 404, description = "Unknown season")
    )
)]
pub async fn next_numbers(
    State(state): State<SharedState>,
    Path(id): Path<SeasonId>,
    Query(query): Query<NextNumbersQuery>,
) -> Result<Json<NextNumbersResponse>, AppError> {
    Ok(Json(
        assignment_service::preview_next_numbers(&state, id, query.double).await?,
    ))
}
