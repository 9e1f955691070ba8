use axum::{extract::State, response::Response};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{Json, Path},
    models::{PlatformStats, Role, SetUserStatusRequest, User},
    pagination::ok,
    repository::{AdminRepository, UserRepository},
};

/// set_user_status
///
/// [Admin Route] Activates, suspends or re-pends an account. Admins cannot change their
/// own status.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/status",
    request_body = SetUserStatusRequest,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Status updated", body = User),
        (status = 400, description = "Cannot change own status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_user_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetUserStatusRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Admin])?;
    if id == user.id {
        return Err(AppError::validation("Cannot change your own status"));
    }

    let updated = state
        .repo
        .set_user_status(id, payload.status)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    tracing::info!(user_id = %id, status = ?payload.status, admin_id = %user.id, "user status changed");
    Ok(ok("User status updated successfully", updated))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Platform statistics", body = PlatformStats),
        (status = 403, description = "Admin only")
    )
)]
pub async fn platform_stats(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    user.require(&[Role::Admin])?;
    let stats = state.repo.platform_stats().await?;
    Ok(ok("Platform statistics retrieved successfully", stats))
}
