use axum::{extract::State, response::Response};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    domain,
    error::{AppError, AppResult},
    extract::{Json, Path},
    models::{CompanyLocation, CreateLocationRequest, Role, UpdateLocationRequest},
    pagination::{created, done, ok},
    repository::LocationRepository,
};

const OWNERS: &[Role] = &[Role::Agency, Role::Admin];

fn required(value: &str, what: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{what} is required")));
    }
    Ok(value.to_string())
}

/// list_locations
///
/// [Authenticated Route] The caller's saved sites, newest first.
#[utoipa::path(
    get,
    path = "/api/company-locations",
    responses((status = 200, description = "Saved locations", body = [CompanyLocation]))
)]
pub async fn list_locations(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    user.require(OWNERS)?;
    let locations = state.repo.list_locations(user.id).await?;
    Ok(ok("Company locations retrieved successfully", locations))
}

#[utoipa::path(
    post,
    path = "/api/company-locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location saved", body = CompanyLocation),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_location(
    user: AuthUser,
    State(state): State<AppState>,
    Json(mut payload): Json<CreateLocationRequest>,
) -> AppResult<Response> {
    user.require(OWNERS)?;
    payload.location_name = required(&payload.location_name, "Location name")?;
    payload.address = required(&payload.address, "Address")?;
    domain::validate_coordinates(payload.latitude, payload.longitude)?;

    let location = state.repo.create_location(user.id, payload).await?;
    Ok(created("Company location created successfully", location))
}

async fn owned(state: &AppState, id: Uuid, user: AuthUser) -> AppResult<CompanyLocation> {
    state
        .repo
        .get_location(id, user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Company location"))
}

#[utoipa::path(
    get,
    path = "/api/company-locations/{id}",
    params(("id" = Uuid, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location", body = CompanyLocation),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn get_location(user: AuthUser, State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    user.require(OWNERS)?;
    let location = owned(&state, id, user).await?;
    Ok(ok("Company location retrieved successfully", location))
}

/// update_location
///
/// [Authenticated Route] Partial update. Jobs already posted keep their snapshot.
#[utoipa::path(
    put,
    path = "/api/company-locations/{id}",
    request_body = UpdateLocationRequest,
    params(("id" = Uuid, Path, description = "Location ID")),
    responses((status = 200, description = "Location updated", body = CompanyLocation))
)]
pub async fn update_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> AppResult<Response> {
    user.require(OWNERS)?;
    let mut location = owned(&state, id, user).await?;

    let payload = UpdateLocationRequest {
        location_name: payload.location_name.map(|n| required(&n, "Location name")).transpose()?,
        address: payload.address.map(|a| required(&a, "Address")).transpose()?,
        ..payload
    };
    domain::validate_coordinates(payload.latitude, payload.longitude)?;
    location.apply(payload);

    let location = state.repo.save_location(&location).await?;
    Ok(ok("Company location updated successfully", location))
}

#[utoipa::path(
    delete,
    path = "/api/company-locations/{id}",
    params(("id" = Uuid, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location deleted"),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn delete_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    user.require(OWNERS)?;
    if !state.repo.delete_location(id, user.id).await? {
        return Err(AppError::not_found("Company location"));
    }
    Ok(done("Company location deleted successfully"))
}
