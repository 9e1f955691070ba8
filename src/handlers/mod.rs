//! HTTP handlers, one module per resource.
//!
//! Handlers validate input, enforce role and ownership rules, call the repository and
//! assemble the response views. They return `AppResult<Response>` so every failure is
//! rendered through `AppError`.

use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Application, ApplicationWithGuard, UserSummary},
    repository::{JobRepository, RepositoryState, ShiftRepository, UserRepository},
};

pub mod admin;
pub mod applications;
pub mod attendance;
pub mod auth;
pub mod jobs;
pub mod locations;
pub mod shifts;
pub mod wallet;

/// The company that posted a job or shift, or an admin.
pub(crate) fn ensure_owner(user: AuthUser, company_id: Uuid, what: &str) -> AppResult<()> {
    if user.is_admin() || user.id == company_id {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("Not authorized to manage this {what}")))
    }
}

/// Company that posted the job. 404 when the job is gone.
pub(crate) async fn job_owner(repo: &RepositoryState, job_id: Uuid) -> AppResult<Uuid> {
    repo.get_job(job_id)
        .await?
        .map(|job| job.company_id)
        .ok_or_else(|| AppError::not_found("Job"))
}

pub(crate) async fn shift_owner(repo: &RepositoryState, shift_id: Uuid) -> AppResult<Uuid> {
    repo.get_shift(shift_id)
        .await?
        .map(|shift| shift.company_id)
        .ok_or_else(|| AppError::not_found("Shift"))
}

/// Loads the `id, name, email` projection for every id, keyed by id. Duplicates and
/// unknown ids are fine.
pub(crate) async fn summaries(
    repo: &RepositoryState,
    mut ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, UserSummary>> {
    ids.sort_unstable();
    ids.dedup();
    let found = repo.user_summaries(&ids).await?;
    Ok(found.into_iter().map(|s| (s.id, s)).collect())
}

/// Attaches the applying guard to each application.
pub(crate) async fn with_guards(
    repo: &RepositoryState,
    applications: Vec<Application>,
) -> AppResult<Vec<ApplicationWithGuard>> {
    let guards = summaries(repo, applications.iter().map(|a| a.guard_id).collect()).await?;
    Ok(applications
        .into_iter()
        .map(|application| ApplicationWithGuard {
            guard: guards.get(&application.guard_id).cloned(),
            application,
        })
        .collect())
}
