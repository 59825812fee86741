use umpire_schedule_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

/// Print the OpenAPI document of the schedule API to stdout.
fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json()?);
    Ok(())
}
