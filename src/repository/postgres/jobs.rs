use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PostgresRepository, push_order_and_page};
use crate::{
    error::{AppError, AppResult},
    models::{Job, JobFilter, JobLocation, NewJob, NewJobLocation},
    pagination::Page,
    repository::JobRepository,
};

pub(super) const JOB_COLUMNS: &str = "id, company_id, title, description, date, start_time, end_time, \
    hourly_rate_cents, total_hours, required_guards, hired_guards, status, requirements, \
    special_instructions, total_budget_cents, created_at, updated_at";

const JOB_LOCATION_COLUMNS: &str = "id, job_id, company_location_id, location_name, address, latitude, \
    longitude, hours_required, start_time, end_time, required_guards, special_requirements, created_at";

/// Shared WHERE clause for the listing and its count.
fn push_job_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
    builder.push(" WHERE TRUE");
    if let Some(company_id) = filter.company_id {
        builder.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.trim());
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.date_from {
        builder.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        builder.push(" AND date <= ").push_bind(to);
    }
    if let Some(min) = filter.min_rate {
        builder.push(" AND hourly_rate_cents >= ").push_bind(min);
    }
    if let Some(max) = filter.max_rate {
        builder.push(" AND hourly_rate_cents <= ").push_bind(max);
    }
}

async fn insert_job_location(
    conn: &mut PgConnection,
    job_id: Uuid,
    location: &NewJobLocation,
) -> Result<JobLocation, sqlx::Error> {
    sqlx::query_as::<_, JobLocation>(&format!(
        "INSERT INTO job_locations \
             (id, job_id, company_location_id, location_name, address, latitude, longitude, \
              hours_required, start_time, end_time, required_guards, special_requirements) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {JOB_LOCATION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(job_id)
    .bind(location.company_location_id)
    .bind(&location.location_name)
    .bind(&location.address)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(location.hours_required)
    .bind(location.start_time)
    .bind(location.end_time)
    .bind(location.required_guards)
    .bind(&location.special_requirements)
    .fetch_one(conn)
    .await
}

#[async_trait]
impl JobRepository for PostgresRepository {
    async fn create_job(&self, job: NewJob, location: Option<NewJobLocation>) -> AppResult<(Job, Option<JobLocation>)> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO jobs \
                 (id, company_id, title, description, date, start_time, end_time, hourly_rate_cents, \
                  total_hours, required_guards, requirements, special_instructions, total_budget_cents) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(job.company_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(job.date)
        .bind(job.start_time)
        .bind(job.end_time)
        .bind(job.hourly_rate_cents)
        .bind(job.total_hours)
        .bind(job.required_guards)
        .bind(&job.requirements)
        .bind(&job.special_instructions)
        .bind(job.total_budget_cents)
        .fetch_one(&mut *tx)
        .await?;

        let snapshot = match &location {
            Some(loc) => Some(insert_job_location(&mut tx, created.id, loc).await?),
            None => None,
        };

        tx.commit().await?;
        Ok((created, snapshot))
    }

    async fn get_job(&self, id: Uuid) -> AppResult<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn list_jobs(&self, filter: &JobFilter, page: Page) -> AppResult<(Vec<Job>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs");
        push_job_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
        push_job_filters(&mut builder, filter);
        push_order_and_page(&mut builder, filter.sort.column(), filter.order.sql(), page);
        let jobs = builder.build_query_as::<Job>().fetch_all(&self.pool).await?;

        Ok((jobs, total))
    }

    async fn update_job(&self, job: &Job, location: Option<NewJobLocation>) -> AppResult<Job> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET title = $2, description = $3, date = $4, start_time = $5, end_time = $6, \
                 hourly_rate_cents = $7, total_hours = $8, required_guards = $9, status = $10, \
                 requirements = $11, special_instructions = $12, total_budget_cents = $13, \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {JOB_COLUMNS}"
        ))
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(job.date)
        .bind(job.start_time)
        .bind(job.end_time)
        .bind(job.hourly_rate_cents)
        .bind(job.total_hours)
        .bind(job.required_guards)
        .bind(job.status)
        .bind(&job.requirements)
        .bind(&job.special_instructions)
        .bind(job.total_budget_cents)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Job"))?;

        match location {
            Some(loc) => {
                sqlx::query("DELETE FROM job_locations WHERE job_id = $1")
                    .bind(job.id)
                    .execute(&mut *tx)
                    .await?;
                insert_job_location(&mut tx, job.id, &loc).await?;
            }
            None => {
                sqlx::query(
                    "UPDATE job_locations \
                     SET start_time = $2, end_time = $3, hours_required = $4, required_guards = $5 \
                     WHERE job_id = $1",
                )
                .bind(job.id)
                .bind(updated.start_time)
                .bind(updated.end_time)
                .bind(updated.total_hours)
                .bind(updated.required_guards)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_job(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn job_locations(&self, job_ids: &[Uuid]) -> AppResult<Vec<JobLocation>> {
        if job_ids.is_empty() {
            return Ok(vec![]);
        }
        let locations = sqlx::query_as::<_, JobLocation>(&format!(
            "SELECT {JOB_LOCATION_COLUMNS} FROM job_locations WHERE job_id = ANY($1)"
        ))
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }
}
