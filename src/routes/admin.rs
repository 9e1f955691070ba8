use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Nested under `/admin` behind the authentication layer. Each handler additionally
/// requires `Role::Admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /admin/users/{id}/status
        // Activates pending sign-ups and suspends accounts.
        .route("/users/{id}/status", put(admin::set_user_status))
        // GET /admin/stats
        .route("/stats", get(admin::platform_stats))
}
