use axum::{extract::State, response::Response};
use chrono::NaiveTime;
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
        CompanyLocation, CreateJobRequest, Job, JobDetail, JobListing, JobQuery, NewJob,
        NewJobLocation, Role, UpdateJobRequest,
    },
    pagination::{PaginatedResponse, created, done, ok},
    repository::{ApplicationRepository, JobRepository, LocationRepository},
};

/// Copies a saved company location into the snapshot stored with the job.
fn snapshot_of(location: CompanyLocation, window: (NaiveTime, NaiveTime), hours: f64, guards: i32) -> NewJobLocation {
    NewJobLocation {
        company_location_id: Some(location.id),
        location_name: location.location_name,
        address: location.address,
        latitude: location.latitude,
        longitude: location.longitude,
        hours_required: hours,
        start_time: window.0,
        end_time: window.1,
        required_guards: guards,
        special_requirements: location.special_requirements,
    }
}

async fn owned_location(state: &AppState, id: Uuid, company_id: Uuid) -> AppResult<CompanyLocation> {
    state
        .repo
        .get_location(id, company_id)
        .await?
        .ok_or_else(|| AppError::validation("Invalid company location"))
}

async fn load_job(state: &AppState, id: Uuid) -> AppResult<Job> {
    state.repo.get_job(id).await?.ok_or_else(|| AppError::not_found("Job"))
}

/// Attaches the location snapshot and company summary to each job.
async fn listings(state: &AppState, jobs: Vec<Job>) -> AppResult<Vec<JobListing>> {
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    let mut locations: HashMap<_, _> = state
        .repo
        .job_locations(&ids)
        .await?
        .into_iter()
        .map(|l| (l.job_id, l))
        .collect();
    let companies = summaries(&state.repo, jobs.iter().map(|j| j.company_id).collect()).await?;

    Ok(jobs
        .into_iter()
        .map(|job| JobListing {
            location: locations.remove(&job.id),
            company: companies.get(&job.company_id).cloned(),
            job,
        })
        .collect())
}

async fn details(state: &AppState, jobs: Vec<Job>) -> AppResult<Vec<JobDetail>> {
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    let applications = state.repo.applications_for_jobs(&ids).await?;
    let mut by_job: HashMap<Uuid, Vec<_>> = HashMap::new();
    for application in with_guards(&state.repo, applications).await? {
        if let Some(job_id) = application.application.job_id {
            by_job.entry(job_id).or_default().push(application);
        }
    }

    Ok(listings(state, jobs)
        .await?
        .into_iter()
        .map(|listing| JobDetail {
            applications: by_job.remove(&listing.job.id).unwrap_or_default(),
            job: listing.job,
            location: listing.location,
            company: listing.company,
        })
        .collect())
}

/// create_job
///
/// [Authenticated Route] Agencies post a single-date job. The optional saved location is
/// checked before anything is written; job and snapshot are then inserted together.
#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = JobListing),
        (status = 400, description = "Invalid input or company location"),
        (status = 403, description = "Only agencies post jobs")
    )
)]
pub async fn create_job(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Agency])?;

    domain::validate_title(&payload.title)?;
    domain::validate_description(payload.description.as_deref())?;
    domain::validate_rate(payload.hourly_rate_cents)?;
    let required_guards = payload.required_guards.unwrap_or(1);
    domain::validate_required_guards(required_guards)?;
    let (total_hours, total_budget_cents) = domain::job_totals(
        payload.start_time,
        payload.end_time,
        payload.hourly_rate_cents,
        required_guards,
    )?;

    let location = match payload.company_location_id {
        Some(id) => Some(snapshot_of(
            owned_location(&state, id, user.id).await?,
            (payload.start_time, payload.end_time),
            total_hours,
            required_guards,
        )),
        None => None,
    };

    let (job, location) = state
        .repo
        .create_job(
            NewJob {
                company_id: user.id,
                title: payload.title.trim().to_string(),
                description: domain::non_empty(payload.description),
                date: payload.date,
                start_time: payload.start_time,
                end_time: payload.end_time,
                hourly_rate_cents: payload.hourly_rate_cents,
                total_hours,
                required_guards,
                requirements: payload.requirements.unwrap_or_default(),
                special_instructions: domain::non_empty(payload.special_instructions),
                total_budget_cents,
            },
            location,
        )
        .await?;

    tracing::info!(job_id = %job.id, company_id = %user.id, "job posted");
    let company = summaries(&state.repo, vec![user.id]).await?.remove(&user.id);
    Ok(created("Job created successfully", JobListing { job, location, company }))
}

/// list_jobs
///
/// [Public Route] Paginated job board with text search, status, date and rate filters.
#[utoipa::path(
    get,
    path = "/api/jobs",
    params(JobQuery),
    responses((status = 200, description = "Paginated jobs", body = [JobListing]))
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> AppResult<PaginatedResponse<JobListing>> {
    let page = query.page();
    let (jobs, total) = state.repo.list_jobs(&query.filter(None), page).await?;
    let data = listings(&state, jobs).await?;
    Ok(PaginatedResponse::new("Jobs retrieved successfully", data, page, total))
}

/// get_job
///
/// [Public Route] One job with its location, company and applications.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job detail", body = JobDetail),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let job = load_job(&state, id).await?;
    let detail = details(&state, vec![job])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Job"))?;
    Ok(ok("Job retrieved successfully", detail))
}

/// update_job
///
/// [Authenticated Route] Owner-only partial update. Running or finished jobs are frozen.
#[utoipa::path(
    put,
    path = "/api/jobs/{id}",
    request_body = UpdateJobRequest,
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job updated", body = JobListing),
        (status = 400, description = "Job is in progress or completed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn update_job(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Agency, Role::Admin])?;
    let mut job = load_job(&state, id).await?;
    ensure_owner(user, job.company_id, "job")?;
    if job.status.is_locked() {
        return Err(AppError::validation("Cannot update a job that is in progress or completed"));
    }

    let recompute = payload.changes_totals();
    if let Some(title) = payload.title {
        domain::validate_title(&title)?;
        job.title = title.trim().to_string();
    }
    if let Some(description) = payload.description {
        domain::validate_description(Some(&description))?;
        job.description = domain::non_empty(Some(description));
    }
    if let Some(date) = payload.date {
        job.date = date;
    }
    if let Some(start) = payload.start_time {
        job.start_time = start;
    }
    if let Some(end) = payload.end_time {
        job.end_time = end;
    }
    if let Some(rate) = payload.hourly_rate_cents {
        domain::validate_rate(rate)?;
        job.hourly_rate_cents = rate;
    }
    if let Some(guards) = payload.required_guards {
        domain::validate_required_guards(guards)?;
        job.required_guards = guards;
    }
    if let Some(requirements) = payload.requirements {
        job.requirements = requirements;
    }
    if let Some(instructions) = payload.special_instructions {
        job.special_instructions = domain::non_empty(Some(instructions));
    }
    if let Some(status) = payload.status {
        job.status = status;
    }
    if recompute {
        let (hours, budget) =
            domain::job_totals(job.start_time, job.end_time, job.hourly_rate_cents, job.required_guards)?;
        job.total_hours = hours;
        job.total_budget_cents = budget;
    }

    let current = state
        .repo
        .job_locations(&[job.id])
        .await?
        .pop()
        .and_then(|l| l.company_location_id);
    let location = match payload.company_location_id {
        Some(location_id) if current != Some(location_id) => {
            let saved = owned_location(&state, location_id, job.company_id).await?;
            Some(snapshot_of(
                saved,
                (job.start_time, job.end_time),
                job.total_hours,
                job.required_guards,
            ))
        }
        _ => None,
    };

    let job = state.repo.update_job(&job, location).await?;
    let listing = listings(&state, vec![job])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Job"))?;
    Ok(ok("Job updated successfully", listing))
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job deleted"),
        (status = 400, description = "Job is in progress or completed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn delete_job(user: AuthUser, State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    user.require(&[Role::Agency, Role::Admin])?;
    let job = load_job(&state, id).await?;
    ensure_owner(user, job.company_id, "job")?;
    if job.status.is_locked() {
        return Err(AppError::validation("Cannot delete a job that is in progress or completed"));
    }

    state.repo.delete_job(id).await?;
    tracing::info!(job_id = %id, "job deleted");
    Ok(done("Job deleted successfully"))
}

/// company_jobs
///
/// [Authenticated Route] The calling agency's jobs, each with its applications.
#[utoipa::path(
    get,
    path = "/api/jobs/company/mine",
    params(JobQuery),
    responses((status = 200, description = "Paginated company jobs", body = [JobDetail]))
)]
pub async fn company_jobs(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> AppResult<PaginatedResponse<JobDetail>> {
    user.require(&[Role::Agency])?;
    let page = query.page();
    let (jobs, total) = state.repo.list_jobs(&query.filter(Some(user.id)), page).await?;
    let data = details(&state, jobs).await?;
    Ok(PaginatedResponse::new("Company jobs retrieved successfully", data, page, total))
}
