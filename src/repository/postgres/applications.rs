use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PostgresRepository, conflict_on_unique, push_order_and_page, shifts::SHIFT_ASSIGNMENT_COLUMNS};
use crate::{
    error::{AppError, AppResult},
    models::{
        AcceptOutcome, Application, ApplicationFilter, ApplicationKind, ApplicationTarget,
        JobAssignment, JobStatus, NewApplication, ShiftAssignment,
    },
    pagination::Page,
    repository::ApplicationRepository,
};

const APPLICATION_COLUMNS: &str =
    "id, guard_id, job_id, shift_id, status, bid_rate_cents, cover_letter, notes, applied_at, responded_at";

fn push_application_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ApplicationFilter) {
    builder.push(" WHERE TRUE");
    if let Some(guard_id) = filter.guard_id {
        builder.push(" AND guard_id = ").push_bind(guard_id);
    }
    if let Some(job_id) = filter.job_id {
        builder.push(" AND job_id = ").push_bind(job_id);
    }
    if let Some(shift_id) = filter.shift_id {
        builder.push(" AND shift_id = ").push_bind(shift_id);
    }
    match filter.kind {
        Some(ApplicationKind::Job) => {
            builder.push(" AND job_id IS NOT NULL");
        }
        Some(ApplicationKind::Shift) => {
            builder.push(" AND shift_id IS NOT NULL");
        }
        None => {}
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
}

#[async_trait]
impl ApplicationRepository for PostgresRepository {
    async fn create_application(&self, application: NewApplication) -> AppResult<Application> {
        let (job_id, shift_id, duplicate) = match application.target {
            ApplicationTarget::Job(id) => (Some(id), None, "You have already applied for this job"),
            ApplicationTarget::Shift(id) => (None, Some(id), "You have already applied for this shift"),
        };

        sqlx::query_as::<_, Application>(&format!(
            "INSERT INTO applications (id, guard_id, job_id, shift_id, bid_rate_cents, cover_letter) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(application.guard_id)
        .bind(job_id)
        .bind(shift_id)
        .bind(application.bid_rate_cents)
        .bind(&application.cover_letter)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, duplicate))
    }

    async fn get_application(&self, id: Uuid) -> AppResult<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn list_applications(&self, filter: &ApplicationFilter, page: Page) -> AppResult<(Vec<Application>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM applications");
        push_application_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {APPLICATION_COLUMNS} FROM applications"));
        push_application_filters(&mut builder, filter);
        push_order_and_page(&mut builder, filter.sort.column(), filter.order.sql(), page);
        let applications = builder.build_query_as::<Application>().fetch_all(&self.pool).await?;

        Ok((applications, total))
    }

    async fn applications_for_jobs(&self, job_ids: &[Uuid]) -> AppResult<Vec<Application>> {
        if job_ids.is_empty() {
            return Ok(vec![]);
        }
        let applications = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = ANY($1) ORDER BY applied_at DESC"
        ))
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn applications_for_shifts(&self, shift_ids: &[Uuid]) -> AppResult<Vec<Application>> {
        if shift_ids.is_empty() {
            return Ok(vec![]);
        }
        let applications = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE shift_id = ANY($1) ORDER BY applied_at DESC"
        ))
        .bind(shift_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    /// accept_application
    ///
    /// The status flip is conditional on `status = 'applied'`, and the parent job row is
    /// locked before counting assignments, so two concurrent accepts can neither accept
    /// the same application twice nor push a job past `required_guards`.
    async fn accept_application(&self, id: Uuid) -> AppResult<AcceptOutcome> {
        let mut tx = self.pool.begin().await?;

        let application = sqlx::query_as::<_, Application>(&format!(
            "UPDATE applications SET status = 'accepted', responded_at = NOW() \
             WHERE id = $1 AND status = 'applied' RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::validation("Application is not in applied status"))?;

        let target = application
            .target()
            .ok_or_else(|| AppError::Internal(format!("application {id} has no job or shift")))?;

        let hired_guards = match target {
            ApplicationTarget::Job(job_id) => {
                let (required, hired): (i32, i32) =
                    sqlx::query_as("SELECT required_guards, hired_guards FROM jobs WHERE id = $1 FOR UPDATE")
                        .bind(job_id)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or_else(|| AppError::not_found("Job"))?;

                let existing: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM job_assignments WHERE job_id = $1 AND guard_id = $2")
                        .bind(job_id)
                        .bind(application.guard_id)
                        .fetch_optional(&mut *tx)
                        .await?;

                let mut assigned: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM job_assignments WHERE job_id = $1 AND status <> 'removed'",
                )
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await?;

                if existing.is_none() {
                    if assigned >= i64::from(required) {
                        // Dropping `tx` rolls back the status flip above.
                        return Err(AppError::validation("Job is fully staffed"));
                    }
                    sqlx::query(
                        "INSERT INTO job_assignments (id, job_id, guard_id, application_id, status) \
                         VALUES ($1, $2, $3, $4, 'assigned')",
                    )
                    .bind(Uuid::new_v4())
                    .bind(job_id)
                    .bind(application.guard_id)
                    .bind(application.id)
                    .execute(&mut *tx)
                    .await?;
                    assigned += 1;
                }

                let new_hired = hired.max(i32::try_from(assigned).unwrap_or(i32::MAX));
                sqlx::query("UPDATE jobs SET hired_guards = $2, status = $3, updated_at = NOW() WHERE id = $1")
                    .bind(job_id)
                    .bind(new_hired)
                    .bind(JobStatus::after_hiring(new_hired, required))
                    .execute(&mut *tx)
                    .await?;
                Some(new_hired)
            }
            ApplicationTarget::Shift(shift_id) => {
                let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM shifts WHERE id = $1 FOR UPDATE")
                    .bind(shift_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                if locked.is_none() {
                    return Err(AppError::not_found("Shift"));
                }

                sqlx::query(
                    "INSERT INTO shift_assignments (id, shift_id, guard_id, application_id, status) \
                     VALUES ($1, $2, $3, $4, 'assigned') \
                     ON CONFLICT (shift_id, guard_id) DO UPDATE \
                     SET status = 'assigned', application_id = EXCLUDED.application_id",
                )
                .bind(Uuid::new_v4())
                .bind(shift_id)
                .bind(application.guard_id)
                .bind(application.id)
                .execute(&mut *tx)
                .await?;

                sqlx::query("UPDATE shifts SET status = 'assigned', updated_at = NOW() WHERE id = $1 AND status = 'open'")
                    .bind(shift_id)
                    .execute(&mut *tx)
                    .await?;
                None
            }
        };

        tx.commit().await?;
        tracing::info!(application_id = %id, "application accepted");
        Ok(AcceptOutcome {
            application,
            hired_guards,
        })
    }

    async fn reject_application(&self, id: Uuid, reason: Option<String>) -> AppResult<Application> {
        sqlx::query_as::<_, Application>(&format!(
            "UPDATE applications SET status = 'rejected', responded_at = NOW(), notes = COALESCE($2, notes) \
             WHERE id = $1 AND status = 'applied' RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::validation("Application is not in applied status"))
    }

    async fn job_assignment(&self, job_id: Uuid, guard_id: Uuid) -> AppResult<Option<JobAssignment>> {
        let assignment = sqlx::query_as::<_, JobAssignment>(
            "SELECT id, job_id, guard_id, application_id, status, assigned_at \
             FROM job_assignments WHERE job_id = $1 AND guard_id = $2",
        )
        .bind(job_id)
        .bind(guard_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }

    async fn shift_assignment(&self, shift_id: Uuid, guard_id: Uuid) -> AppResult<Option<ShiftAssignment>> {
        let assignment = sqlx::query_as::<_, ShiftAssignment>(&format!(
            "SELECT {SHIFT_ASSIGNMENT_COLUMNS} FROM shift_assignments WHERE shift_id = $1 AND guard_id = $2"
        ))
        .bind(shift_id)
        .bind(guard_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }
}
