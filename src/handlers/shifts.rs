use axum::{extract::State, response::Response};
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use super::{ensure_owner, summaries, with_guards};
use crate::{
    AppState,
    auth::AuthUser,
    domain,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    models::{
        AssignGuardRequest, CreateShiftRequest, DayOfWeek, NewShift, Role, Shift, ShiftDetail,
        ShiftFilter, ShiftListing, ShiftQuery, UpdateShiftRequest, UserStatus,
    },
    pagination::{PaginatedResponse, created, done, ok},
    repository::{ApplicationRepository, LocationRepository, ShiftRepository, UserRepository},
};

/// Keeps the first occurrence of each weekday. An empty set is rejected.
fn weekdays(days: Vec<DayOfWeek>) -> AppResult<Vec<DayOfWeek>> {
    let mut unique = Vec::with_capacity(days.len());
    for day in days {
        if !unique.contains(&day) {
            unique.push(day);
        }
    }
    if unique.is_empty() {
        return Err(AppError::validation("At least one day of the week is required"));
    }
    Ok(unique)
}

fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> AppResult<()> {
    match end {
        Some(end) if end < start => Err(AppError::validation("End date cannot be before start date")),
        _ => Ok(()),
    }
}

async fn load_shift(state: &AppState, id: Uuid) -> AppResult<Shift> {
    state.repo.get_shift(id).await?.ok_or_else(|| AppError::not_found("Shift"))
}

async fn load_owned(state: &AppState, id: Uuid, user: AuthUser) -> AppResult<Shift> {
    user.require(&[Role::Agency, Role::Admin])?;
    let shift = load_shift(state, id).await?;
    ensure_owner(user, shift.company_id, "shift")?;
    Ok(shift)
}

async fn listings(state: &AppState, shifts: Vec<Shift>) -> AppResult<Vec<ShiftListing>> {
    let people = summaries(
        &state.repo,
        shifts
            .iter()
            .flat_map(|s| [Some(s.company_id), s.guard_id])
            .flatten()
            .collect(),
    )
    .await?;

    Ok(shifts
        .into_iter()
        .map(|shift| ShiftListing {
            company: people.get(&shift.company_id).cloned(),
            guard: shift.guard_id.and_then(|g| people.get(&g).cloned()),
            shift,
        })
        .collect())
}

async fn details(state: &AppState, shifts: Vec<Shift>) -> AppResult<Vec<ShiftDetail>> {
    let ids: Vec<Uuid> = shifts.iter().map(|s| s.id).collect();
    let applications = state.repo.applications_for_shifts(&ids).await?;
    let mut by_shift: HashMap<Uuid, Vec<_>> = HashMap::new();
    for application in with_guards(&state.repo, applications).await? {
        if let Some(shift_id) = application.application.shift_id {
            by_shift.entry(shift_id).or_default().push(application);
        }
    }

    let mut result = Vec::with_capacity(shifts.len());
    for listing in listings(state, shifts).await? {
        let assignments = state.repo.shift_assignments(listing.shift.id).await?;
        result.push(ShiftDetail {
            applications: by_shift.remove(&listing.shift.id).unwrap_or_default(),
            assignments,
            company: listing.company,
            guard: listing.guard,
            shift: listing.shift,
        });
    }
    Ok(result)
}

async fn listing_of(state: &AppState, shift: Shift) -> AppResult<ShiftListing> {
    listings(state, vec![shift])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Shift"))
}

/// create_shift
///
/// [Authenticated Route] Agencies post a recurring weekly shift, either at a saved
/// company location (copied onto the shift) or at an inline address.
#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = CreateShiftRequest,
    responses(
        (status = 201, description = "Shift created", body = ShiftListing),
        (status = 400, description = "Invalid input or company location"),
        (status = 403, description = "Only agencies post shifts")
    )
)]
pub async fn create_shift(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateShiftRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Agency])?;

    domain::validate_title(&payload.title)?;
    domain::validate_description(payload.description.as_deref())?;
    domain::validate_rate(payload.hourly_rate_cents)?;
    domain::window_minutes(payload.start_time, payload.end_time)?;
    check_dates(payload.start_date, payload.end_date)?;
    let days_of_week = weekdays(payload.days_of_week)?;

    let (location_name, address, latitude, longitude) = match payload.company_location_id {
        Some(id) => {
            let saved = state
                .repo
                .get_location(id, user.id)
                .await?
                .ok_or_else(|| AppError::validation("Invalid company location"))?;
            (saved.location_name, saved.address, saved.latitude, saved.longitude)
        }
        None => {
            let (Some(name), Some(address)) = (
                domain::non_empty(payload.location_name),
                domain::non_empty(payload.address),
            ) else {
                return Err(AppError::validation("Location name and address are required"));
            };
            domain::validate_coordinates(payload.latitude, payload.longitude)?;
            (name, address, payload.latitude, payload.longitude)
        }
    };

    let shift = state
        .repo
        .create_shift(NewShift {
            company_id: user.id,
            company_location_id: payload.company_location_id,
            title: payload.title.trim().to_string(),
            description: domain::non_empty(payload.description),
            location_name,
            address,
            latitude,
            longitude,
            start_time: payload.start_time,
            end_time: payload.end_time,
            days_of_week,
            hourly_rate_cents: payload.hourly_rate_cents,
            start_date: payload.start_date,
            end_date: payload.end_date,
            requirements: payload.requirements.unwrap_or_default(),
            special_instructions: domain::non_empty(payload.special_instructions),
        })
        .await?;

    tracing::info!(shift_id = %shift.id, company_id = %user.id, "shift posted");
    Ok(created("Shift created successfully", listing_of(&state, shift).await?))
}

/// list_shifts
///
/// [Public Route] Paginated shift board.
#[utoipa::path(
    get,
    path = "/api/shifts",
    params(ShiftQuery),
    responses((status = 200, description = "Paginated shifts", body = [ShiftListing]))
)]
pub async fn list_shifts(
    State(state): State<AppState>,
    Query(query): Query<ShiftQuery>,
) -> AppResult<PaginatedResponse<ShiftListing>> {
    let page = query.page();
    let (shifts, total) = state.repo.list_shifts(&query.filter(), page).await?;
    let data = listings(&state, shifts).await?;
    Ok(PaginatedResponse::new("Shifts retrieved successfully", data, page, total))
}

#[utoipa::path(
    get,
    path = "/api/shifts/{id}",
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift detail", body = ShiftDetail),
        (status = 404, description = "Shift not found")
    )
)]
pub async fn get_shift(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let shift = load_shift(&state, id).await?;
    let detail = details(&state, vec![shift])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Shift"))?;
    Ok(ok("Shift retrieved successfully", detail))
}

/// update_shift
///
/// [Authenticated Route] Owner-only partial update. Active or completed shifts are frozen.
/// A different `company_location_id` re-copies the address and coordinates.
#[utoipa::path(
    put,
    path = "/api/shifts/{id}",
    request_body = UpdateShiftRequest,
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift updated", body = ShiftListing),
        (status = 400, description = "Shift is active or completed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Shift not found")
    )
)]
pub async fn update_shift(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShiftRequest>,
) -> AppResult<Response> {
    let mut shift = load_owned(&state, id, user).await?;
    if shift.status.is_locked() {
        return Err(AppError::validation("Cannot update a shift that is active or completed"));
    }

    if let Some(title) = payload.title {
        domain::validate_title(&title)?;
        shift.title = title.trim().to_string();
    }
    if let Some(description) = payload.description {
        domain::validate_description(Some(&description))?;
        shift.description = domain::non_empty(Some(description));
    }

    match payload.company_location_id {
        Some(location_id) if shift.company_location_id != Some(location_id) => {
            let saved = state
                .repo
                .get_location(location_id, shift.company_id)
                .await?
                .ok_or_else(|| AppError::validation("Invalid company location"))?;
            shift.company_location_id = Some(saved.id);
            shift.location_name = saved.location_name;
            shift.address = saved.address;
            shift.latitude = saved.latitude;
            shift.longitude = saved.longitude;
        }
        _ => {
            domain::validate_coordinates(payload.latitude, payload.longitude)?;
            if let Some(name) = domain::non_empty(payload.location_name) {
                shift.location_name = name;
            }
            if let Some(address) = domain::non_empty(payload.address) {
                shift.address = address;
            }
            if payload.latitude.is_some() {
                shift.latitude = payload.latitude;
            }
            if payload.longitude.is_some() {
                shift.longitude = payload.longitude;
            }
        }
    }

    if let Some(start) = payload.start_time {
        shift.start_time = start;
    }
    if let Some(end) = payload.end_time {
        shift.end_time = end;
    }
    domain::window_minutes(shift.start_time, shift.end_time)?;
    if let Some(days) = payload.days_of_week {
        shift.days_of_week = weekdays(days)?;
    }
    if let Some(rate) = payload.hourly_rate_cents {
        domain::validate_rate(rate)?;
        shift.hourly_rate_cents = rate;
    }
    if let Some(extra) = payload.extra_hours {
        if extra < 0.0 {
            return Err(AppError::validation("Extra hours cannot be negative"));
        }
        shift.extra_hours = extra;
    }
    if let Some(status) = payload.status {
        shift.status = status;
    }
    if let Some(start_date) = payload.start_date {
        shift.start_date = start_date;
    }
    if payload.end_date.is_some() {
        shift.end_date = payload.end_date;
    }
    check_dates(shift.start_date, shift.end_date)?;
    if let Some(requirements) = payload.requirements {
        shift.requirements = requirements;
    }
    if let Some(instructions) = payload.special_instructions {
        shift.special_instructions = domain::non_empty(Some(instructions));
    }

    let shift = state.repo.update_shift(&shift).await?;
    Ok(ok("Shift updated successfully", listing_of(&state, shift).await?))
}

#[utoipa::path(
    delete,
    path = "/api/shifts/{id}",
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift deleted"),
        (status = 400, description = "Shift is active or completed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Shift not found")
    )
)]
pub async fn delete_shift(user: AuthUser, State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let shift = load_owned(&state, id, user).await?;
    if shift.status.is_locked() {
        return Err(AppError::validation("Cannot delete a shift that is active or completed"));
    }

    state.repo.delete_shift(id).await?;
    tracing::info!(shift_id = %id, "shift deleted");
    Ok(done("Shift deleted successfully"))
}

/// assign_guard
///
/// [Authenticated Route] Directly assigns an active guard to an open shift.
#[utoipa::path(
    post,
    path = "/api/shifts/{id}/assign",
    request_body = AssignGuardRequest,
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Guard assigned", body = ShiftListing),
        (status = 400, description = "Shift is not open"),
        (status = 404, description = "Shift or guard not found")
    )
)]
pub async fn assign_guard(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignGuardRequest>,
) -> AppResult<Response> {
    load_owned(&state, id, user).await?;

    let guard = state.repo.get_user(payload.guard_id).await?;
    if !guard.is_some_and(|g| g.role == Role::Guard && g.status == UserStatus::Active) {
        return Err(AppError::not_found("Guard"));
    }

    let shift = state.repo.assign_guard(id, payload.guard_id).await?;
    tracing::info!(shift_id = %id, guard_id = %payload.guard_id, "guard assigned to shift");
    Ok(ok("Guard assigned successfully", listing_of(&state, shift).await?))
}

#[utoipa::path(
    delete,
    path = "/api/shifts/{id}/assign",
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Guard removed", body = ShiftListing),
        (status = 400, description = "No guard assigned")
    )
)]
pub async fn remove_guard(user: AuthUser, State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    load_owned(&state, id, user).await?;
    let shift = state.repo.remove_guard(id).await?;
    tracing::info!(shift_id = %id, "guard removed from shift");
    Ok(ok("Guard removed successfully", listing_of(&state, shift).await?))
}

/// company_shifts
///
/// [Authenticated Route] The calling agency's shifts with assignments and applications.
#[utoipa::path(
    get,
    path = "/api/shifts/company/mine",
    params(ShiftQuery),
    responses((status = 200, description = "Paginated company shifts", body = [ShiftDetail]))
)]
pub async fn company_shifts(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ShiftQuery>,
) -> AppResult<PaginatedResponse<ShiftDetail>> {
    user.require(&[Role::Agency])?;
    let page = query.page();
    let filter = ShiftFilter {
        company_id: Some(user.id),
        ..query.filter()
    };
    let (shifts, total) = state.repo.list_shifts(&filter, page).await?;
    let data = details(&state, shifts).await?;
    Ok(PaginatedResponse::new("Company shifts retrieved successfully", data, page, total))
}

/// guard_shifts
///
/// [Authenticated Route] Shifts the calling guard is assigned to, directly or through an
/// accepted application.
#[utoipa::path(
    get,
    path = "/api/shifts/guard/mine",
    params(ShiftQuery),
    responses((status = 200, description = "Paginated guard shifts", body = [ShiftListing]))
)]
pub async fn guard_shifts(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ShiftQuery>,
) -> AppResult<PaginatedResponse<ShiftListing>> {
    user.require(&[Role::Guard])?;
    let page = query.page();
    let filter = ShiftFilter {
        guard_id: Some(user.id),
        ..query.filter()
    };
    let (shifts, total) = state.repo.list_shifts(&filter, page).await?;
    let data = listings(&state, shifts).await?;
    Ok(PaginatedResponse::new("Guard shifts retrieved successfully", data, page, total))
}
