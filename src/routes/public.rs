use crate::{
    AppState,
    handlers::{auth, jobs, shifts},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints. The job and shift boards are readable by anyone; every
/// mutation lives in the authenticated router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Identity ---
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // --- Boards ---
        // GET /jobs?search=&status=&date_from=&min_rate=...
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/shifts", get(shifts::list_shifts))
        .route("/shifts/{id}", get(shifts::get_shift))
}
