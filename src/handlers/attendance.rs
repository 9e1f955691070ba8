use axum::{extract::State, response::Response};
use chrono::Utc;
use uuid::Uuid;

use super::{ensure_owner, job_owner, shift_owner, summaries};
use crate::{
    AppState,
    auth::AuthUser,
    domain,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    models::{
        AssignmentStatus, Attendance, AttendanceFilter, AttendanceQuery, AttendanceTarget,
        AttendanceView, CheckIn, CheckInRequest, CheckOut, CheckOutRequest, Role,
        VerifyAttendanceRequest,
    },
    pagination::{PaginatedResponse, created, ok},
    repository::{ApplicationRepository, AttendanceRepository, JobRepository, ShiftRepository},
};

fn target_of(job_id: Option<Uuid>, shift_id: Option<Uuid>) -> AppResult<AttendanceTarget> {
    AttendanceTarget::from_ids(job_id, shift_id)
        .ok_or_else(|| AppError::validation("Provide exactly one of job_id or shift_id"))
}

/// The target must exist (404) and the guard must be working it (403): an assignment
/// on the job, or the shift's direct guard or a live shift assignment.
async fn ensure_assigned(state: &AppState, guard_id: Uuid, target: AttendanceTarget) -> AppResult<()> {
    let assigned = match target {
        AttendanceTarget::Job(job_id) => {
            state
                .repo
                .get_job(job_id)
                .await?
                .ok_or_else(|| AppError::not_found("Job"))?;
            state
                .repo
                .job_assignment(job_id, guard_id)
                .await?
                .is_some_and(|a| a.status != AssignmentStatus::Removed)
        }
        AttendanceTarget::Shift(shift_id) => {
            let shift = state
                .repo
                .get_shift(shift_id)
                .await?
                .ok_or_else(|| AppError::not_found("Shift"))?;
            shift.guard_id == Some(guard_id)
                || state
                    .repo
                    .shift_assignment(shift_id, guard_id)
                    .await?
                    .is_some_and(|a| a.status != AssignmentStatus::Removed)
        }
    };

    if !assigned {
        return Err(AppError::forbidden("You are not assigned to this job or shift"));
    }
    Ok(())
}

/// Company that owns the job or shift an attendance row belongs to.
async fn row_owner(state: &AppState, attendance: &Attendance) -> AppResult<Uuid> {
    match attendance.target() {
        Some(AttendanceTarget::Job(id)) => job_owner(&state.repo, id).await,
        Some(AttendanceTarget::Shift(id)) => shift_owner(&state.repo, id).await,
        None => Err(AppError::Internal(format!("attendance {} has no job or shift", attendance.id))),
    }
}

async fn view_of(state: &AppState, attendance: Attendance) -> AppResult<AttendanceView> {
    let guard = summaries(&state.repo, vec![attendance.guard_id])
        .await?
        .remove(&attendance.guard_id);
    Ok(AttendanceView { attendance, guard })
}

async fn load(state: &AppState, id: Uuid) -> AppResult<Attendance> {
    state
        .repo
        .get_attendance(id)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record"))
}

/// check_in
///
/// [Authenticated Route] Records the guard's arrival for today (UTC) with coordinates.
/// One check-in per guard, day and job or shift.
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in", body = Attendance),
        (status = 400, description = "Invalid target or already checked in"),
        (status = 403, description = "Not assigned"),
        (status = 404, description = "Job or shift not found")
    )
)]
pub async fn check_in(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CheckInRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Guard])?;
    let target = target_of(payload.job_id, payload.shift_id)?;
    domain::validate_coordinates(Some(payload.latitude), Some(payload.longitude))?;
    ensure_assigned(&state, user.id, target).await?;

    let now = Utc::now();
    let attendance = state
        .repo
        .record_check_in(CheckIn {
            guard_id: user.id,
            target,
            date: now.date_naive(),
            at: now,
            latitude: payload.latitude,
            longitude: payload.longitude,
            notes: domain::non_empty(payload.notes),
        })
        .await?
        .ok_or_else(|| AppError::validation("Already checked in for today"))?;

    tracing::info!(attendance_id = %attendance.id, guard_id = %user.id, "guard checked in");
    Ok(created("Checked in successfully", attendance))
}

/// check_out
///
/// [Authenticated Route] Closes today's record and computes `hours_worked`.
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out", body = Attendance),
        (status = 400, description = "No open check-in for today")
    )
)]
pub async fn check_out(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CheckOutRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Guard])?;
    let target = target_of(payload.job_id, payload.shift_id)?;
    domain::validate_coordinates(Some(payload.latitude), Some(payload.longitude))?;

    let now = Utc::now();
    let record = state
        .repo
        .find_attendance_for_day(user.id, target, now.date_naive())
        .await?
        .ok_or_else(|| AppError::validation("No check-in record found for today"))?;
    let Some(checked_in_at) = record.check_in_time else {
        return Err(AppError::validation("You have not checked in yet"));
    };
    if record.check_out_time.is_some() {
        return Err(AppError::validation("Already checked out for today"));
    }

    let attendance = state
        .repo
        .record_check_out(
            record.id,
            CheckOut {
                at: now,
                latitude: payload.latitude,
                longitude: payload.longitude,
                hours_worked: domain::elapsed_hours(checked_in_at, now),
                notes: domain::non_empty(payload.notes),
            },
        )
        .await?
        .ok_or_else(|| AppError::validation("Already checked out for today"))?;

    tracing::info!(attendance_id = %attendance.id, hours = ?attendance.hours_worked, "guard checked out");
    Ok(ok("Checked out successfully", attendance))
}

/// list_attendance
///
/// [Authenticated Route] Guards see their own rows, agencies see rows for their jobs and
/// shifts, admins see everything.
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses((status = 200, description = "Paginated attendance", body = [AttendanceView]))
)]
pub async fn list_attendance(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> AppResult<PaginatedResponse<AttendanceView>> {
    let base = query.filter();
    let filter = match user.role {
        Role::Guard => AttendanceFilter {
            guard_id: Some(user.id),
            ..base
        },
        Role::Agency => AttendanceFilter {
            company_id: Some(user.id),
            ..base
        },
        Role::Admin => base,
    };

    let page = query.page();
    let (rows, total) = state.repo.list_attendance(&filter, page).await?;
    let guards = summaries(&state.repo, rows.iter().map(|a| a.guard_id).collect()).await?;
    let data = rows
        .into_iter()
        .map(|attendance| AttendanceView {
            guard: guards.get(&attendance.guard_id).cloned(),
            attendance,
        })
        .collect();
    Ok(PaginatedResponse::new("Attendance records retrieved successfully", data, page, total))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id" = Uuid, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceView),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_attendance(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let attendance = load(&state, id).await?;
    let allowed = match user.role {
        Role::Admin => true,
        Role::Guard => attendance.guard_id == user.id,
        Role::Agency => row_owner(&state, &attendance).await? == user.id,
    };
    if !allowed {
        return Err(AppError::forbidden("Not authorized to view this attendance record"));
    }
    Ok(ok("Attendance record retrieved successfully", view_of(&state, attendance).await?))
}

/// verify_attendance
///
/// [Authenticated Route] The owning agency (or an admin) signs off a record.
#[utoipa::path(
    put,
    path = "/api/attendance/{id}/verify",
    request_body = VerifyAttendanceRequest,
    params(("id" = Uuid, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Attendance verified", body = AttendanceView),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn verify_attendance(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyAttendanceRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Agency, Role::Admin])?;
    let attendance = load(&state, id).await?;
    ensure_owner(user, row_owner(&state, &attendance).await?, "attendance record")?;

    let verified = state
        .repo
        .verify_attendance(id, user.id, domain::non_empty(payload.notes))
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record"))?;
    tracing::info!(attendance_id = %id, verified_by = %user.id, "attendance verified");
    Ok(ok("Attendance verified successfully", view_of(&state, verified).await?))
}
