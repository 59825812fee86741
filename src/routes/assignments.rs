use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::{
    dao::models::CellId,
    dto::assignment::{
        ActionResponse, AssignmentListQuery, AssignmentListResponse, AssignmentResponse,
        FinishSeasonRequest, PatchAssignmentRequest, UpsertAssignmentRequest,
    },
    error::AppError,
    services::{assignment_service, season_service},
    state::SharedState,
};

/// Schedule grid endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route("/assignments/upsert", post(upsert_assignment))
        .route("/assignments/finish", post(finish_season))
        .route(
            "/assignments/{id}",
            patch(patch_assignment).delete(delete_assignment),
        )
}

/// List the cells of a season in canonical order.
#[utoipa::path(
    get,
    path = "/assignments",
    tag = "assignments",
    params(AssignmentListQuery),
    responses(
        (status = 200, description = "Season cells", body = AssignmentListResponse),
        (status = 400, description = "Missing seasonId")
    )
)]
pub async fn list_assignments(
    State(state): State<SharedState>,
    Query(query): Query<AssignmentListQuery>,
) -> Result<Json<AssignmentListResponse>, AppError> {
    let items = assignment_service::list_assignments(&state, query).await?;
    Ok(Json(AssignmentListResponse { items }))
}

/// Create a cell in a free slot of the grid.
#[utoipa::path(
    post,
    path = "/assignments",
    tag = "assignments",
    request_body = UpsertAssignmentRequest,
    responses(
        (status = 201, description = "Cell created", body = AssignmentResponse),
        (status = 404, description = "Unknown season"),
        (status = 409, description = "Slot already taken")
    )
)]
pub async fn create_assignment(
    State(state): State<SharedState>,
    Json(payload): Json<UpsertAssignmentRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>), AppError> {
    let created = assignment_service::create_assignment(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Save a cell by natural key (or id) and renumber its season.
#[utoipa::path(
    post,
    path = "/assignments/upsert",
    tag = "assignments",
    request_body = UpsertAssignmentRequest,
    responses(
        (status = 200, description = "Cell saved", body = AssignmentResponse),
        (status = 404, description = "Unknown season"),
        (status = 409, description = "Target slot already taken")
    )
)]
pub async fn upsert_assignment(
    State(state): State<SharedState>,
    Json(payload): Json<UpsertAssignmentRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let saved = assignment_service::upsert_assignment(&state, payload).await?;
    Ok(Json(saved.into()))
}

/// Edit some fields of a cell.
#[utoipa::path(
    patch,
    path = "/assignments/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Cell identifier")),
    request_body = PatchAssignmentRequest,
    responses(
        (status = 200, description = "Cell updated", body = AssignmentResponse),
        (status = 404, description = "Unknown cell")
    )
)]
pub async fn patch_assignment(
    State(state): State<SharedState>,
    Path(id): Path<CellId>,
    Json(payload): Json<PatchAssignmentRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let saved = assignment_service::patch_assignment(&state, id, payload).await?;
    Ok(Json(saved.into()))
}

/// Delete a cell and renumber its season.
#[utoipa::path(
    delete,
    path = "/assignments/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Cell identifier")),
    responses(
        (status = 200, description = "Cell deleted", body = ActionResponse),
        (status = 404, description = "Unknown cell")
    )
)]
pub async fn delete_assignment(
    State(state): State<SharedState>,
    Path(id): Path<CellId>,
) -> Result<Json<ActionResponse>, AppError> {
    assignment_service::delete_assignment(&state, id).await?;
    Ok(Json(ActionResponse::ok()))
}

/// Close a season, optionally fixing its final week count.
#[utoipa::path(
    post,
    path = "/assignments/finish",
    tag = "assignments",
    request_body = FinishSeasonRequest,
    responses(
        (status = 200, description = "Season finished", body = ActionResponse),
        (status = 404, description = "Unknown season")
    )
)]
pub async fn finish_season(
    State(state): State<SharedState>,
    Json(payload): Json<FinishSeasonRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    season_service::finish_season(&state, payload).await?;
    Ok(Json(ActionResponse::ok()))
}
