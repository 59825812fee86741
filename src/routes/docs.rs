use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const OPENAPI_JSON_PATH: &str = "/api-doc/openapi.json";

/// Serve Swagger UI at `/docs` over the schedule API document.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new("/docs")
        .url(OPENAPI_JSON_PATH, ApiDoc::openapi())
        .into();

    ui.with_state(state)
}
