use axum::{extract::State, response::Response};
use uuid::Uuid;

use super::{ensure_owner, job_owner, shift_owner, with_guards};
use crate::{
    AppState,
    auth::AuthUser,
    domain,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    models::{
        AcceptOutcome, Application, ApplicationQuery, ApplicationTarget, ApplicationWithGuard,
        ApplyRequest, NewApplication, RejectApplicationRequest, Role, ShiftStatus,
    },
    pagination::{PaginatedResponse, created, ok},
    repository::{ApplicationRepository, JobRepository, ShiftRepository},
};

const COMPANY: &[Role] = &[Role::Agency, Role::Admin];

/// Validates the bid (defaulting to the posted rate) and writes the application.
async fn submit(
    state: &AppState,
    guard_id: Uuid,
    target: ApplicationTarget,
    posted_rate_cents: i64,
    payload: ApplyRequest,
) -> AppResult<Application> {
    domain::validate_cover_letter(payload.cover_letter.as_deref())?;
    let bid_rate_cents = payload.bid_rate_cents.unwrap_or(posted_rate_cents);
    domain::validate_rate(bid_rate_cents)?;

    let application = state
        .repo
        .create_application(NewApplication {
            guard_id,
            target,
            bid_rate_cents,
            cover_letter: domain::non_empty(payload.cover_letter),
        })
        .await?;
    tracing::info!(application_id = %application.id, guard_id = %guard_id, "application submitted");
    Ok(application)
}

/// Loads an application and checks the caller owns the job or shift it targets.
async fn owned_application(state: &AppState, id: Uuid, user: AuthUser) -> AppResult<Application> {
    user.require(COMPANY)?;
    let application = state
        .repo
        .get_application(id)
        .await?
        .ok_or_else(|| AppError::not_found("Application"))?;

    let (company_id, what) = match application.target() {
        Some(ApplicationTarget::Job(job_id)) => (job_owner(&state.repo, job_id).await?, "job"),
        Some(ApplicationTarget::Shift(shift_id)) => (shift_owner(&state.repo, shift_id).await?, "shift"),
        None => return Err(AppError::Internal(format!("application {id} has no job or shift"))),
    };
    ensure_owner(user, company_id, what)?;
    Ok(application)
}

/// apply_for_job
///
/// [Authenticated Route] Guards apply to a job that is still staffing. One application
/// per guard and job.
#[utoipa::path(
    post,
    path = "/api/jobs/{id}/apply",
    request_body = ApplyRequest,
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 400, description = "Job is not accepting applications"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Already applied")
    )
)]
pub async fn apply_for_job(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Guard])?;
    let job = state.repo.get_job(id).await?.ok_or_else(|| AppError::not_found("Job"))?;
    if !job.status.accepts_applications() {
        return Err(AppError::validation("Job is not accepting applications"));
    }

    let application = submit(&state, user.id, ApplicationTarget::Job(id), job.hourly_rate_cents, payload).await?;
    Ok(created("Application submitted successfully", application))
}

#[utoipa::path(
    post,
    path = "/api/shifts/{id}/apply",
    request_body = ApplyRequest,
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 400, description = "Shift is not open"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Already applied")
    )
)]
pub async fn apply_for_shift(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Guard])?;
    let shift = state
        .repo
        .get_shift(id)
        .await?
        .ok_or_else(|| AppError::not_found("Shift"))?;
    if shift.status != ShiftStatus::Open {
        return Err(AppError::validation("Shift is not accepting applications"));
    }

    let application = submit(&state, user.id, ApplicationTarget::Shift(id), shift.hourly_rate_cents, payload).await?;
    Ok(created("Application submitted successfully", application))
}

async fn applications_for(
    state: &AppState,
    user: AuthUser,
    target: ApplicationTarget,
    query: ApplicationQuery,
) -> AppResult<PaginatedResponse<ApplicationWithGuard>> {
    user.require(COMPANY)?;
    let (company_id, what) = match target {
        ApplicationTarget::Job(id) => (job_owner(&state.repo, id).await?, "job"),
        ApplicationTarget::Shift(id) => (shift_owner(&state.repo, id).await?, "shift"),
    };
    ensure_owner(user, company_id, what)?;

    let page = query.page();
    let (rows, total) = state.repo.list_applications(&query.for_target(target), page).await?;
    let data = with_guards(&state.repo, rows).await?;
    Ok(PaginatedResponse::new("Applications retrieved successfully", data, page, total))
}

/// job_applications
///
/// [Authenticated Route] Applications to one of the caller's jobs, each with the guard.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}/applications",
    params(("id" = Uuid, Path, description = "Job ID"), ApplicationQuery),
    responses(
        (status = 200, description = "Paginated applications", body = [ApplicationWithGuard]),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn job_applications(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ApplicationQuery>,
) -> AppResult<PaginatedResponse<ApplicationWithGuard>> {
    applications_for(&state, user, ApplicationTarget::Job(id), query).await
}

#[utoipa::path(
    get,
    path = "/api/shifts/{id}/applications",
    params(("id" = Uuid, Path, description = "Shift ID"), ApplicationQuery),
    responses(
        (status = 200, description = "Paginated applications", body = [ApplicationWithGuard]),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Shift not found")
    )
)]
pub async fn shift_applications(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ApplicationQuery>,
) -> AppResult<PaginatedResponse<ApplicationWithGuard>> {
    applications_for(&state, user, ApplicationTarget::Shift(id), query).await
}

/// accept_application
///
/// [Authenticated Route] Hires the guard. The repository flips the status only if it is
/// still `applied`, creates the assignment and moves the job or shift forward.
#[utoipa::path(
    put,
    path = "/api/applications/{id}/accept",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application accepted", body = AcceptOutcome),
        (status = 400, description = "Already processed or job fully staffed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn accept_application(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    owned_application(&state, id, user).await?;
    let outcome = state.repo.accept_application(id).await?;
    tracing::info!(application_id = %id, hired_guards = ?outcome.hired_guards, "application accepted");
    Ok(ok("Application accepted successfully", outcome))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}/reject",
    request_body = RejectApplicationRequest,
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application rejected", body = Application),
        (status = 400, description = "Already processed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn reject_application(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectApplicationRequest>,
) -> AppResult<Response> {
    owned_application(&state, id, user).await?;
    let application = state
        .repo
        .reject_application(id, domain::non_empty(payload.reason))
        .await?;
    Ok(ok("Application rejected successfully", application))
}

/// guard_applications
///
/// [Authenticated Route] The calling guard's applications. Explicit `job_id`/`shift_id`
/// filters take precedence over `type`.
#[utoipa::path(
    get,
    path = "/api/applications/mine",
    params(ApplicationQuery),
    responses((status = 200, description = "Paginated applications", body = [Application]))
)]
pub async fn guard_applications(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ApplicationQuery>,
) -> AppResult<PaginatedResponse<Application>> {
    user.require(&[Role::Guard])?;
    let page = query.page();
    let (rows, total) = state.repo.list_applications(&query.for_guard(user.id), page).await?;
    Ok(PaginatedResponse::new("Applications retrieved successfully", rows, page, total))
}
