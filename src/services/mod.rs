/// Schedule cell writes, listing and season renumbering.
pub mod assignment_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Season-scoped locking with retry and unlocked fallback.
pub mod season_lock;
/// Season creation, updates and closing.
pub mod season_service;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
