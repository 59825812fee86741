use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the umpire schedule backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::assignments::list_assignments,
        crate::routes::assignments::create_assignment,
        crate::routes::assignments::upsert_assignment,
        crate::routes::assignments::patch_assignment,
        crate::routes::assignments::delete_assignment,
        crate::routes::assignments::finish_season,
        crate::routes::seasons::create_season,
        crate::routes::seasons::list_seasons,
        crate::routes::seasons::get_season,
        crate::routes::seasons::update_season,
        crate::routes::seasons::recompute_season,
        crate::routes::seasons::next_numbers,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::state::NumberingMetricsSnapshot,
            crate::dto::assignment::UpsertAssignmentRequest,
            crate::dto::assignment::PatchAssignmentRequest,
            crate::dto::assignment::AssignmentView,
            crate::dto::assignment::AssignmentListResponse,
            crate::dto::assignment::AssignmentResponse,
            crate::dto::assignment::NextNumbersResponse,
            crate::dto::assignment::RecomputeResponse,
            crate::dto::assignment::FinishSeasonRequest,
            crate::dto::assignment::ActionResponse,
            crate::dto::season::CreateSeasonRequest,
            crate::dto::season::UpdateSeasonRequest,
            crate::dto::season::SeasonView,
            crate::dto::season::SeasonResponse,
            crate::dto::season::SeasonListResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "assignments", description = "Schedule cells and their game numbers"),
        (name = "seasons", description = "Seasons and numbering maintenance"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/assignments",
            "/assignments/upsert",
            "/assignments/{id}",
            "/assignments/finish",
            "/seasons",
            "/seasons/{id}",
            "/seasons/{id}/recompute",
            "/seasons/{id}/next-numbers",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let assignments = &doc.paths.paths["/assignments"];
        assert!(assignments.get.is_some() && assignments.post.is_some());
    }
}
