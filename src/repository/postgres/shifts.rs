use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PostgresRepository, push_order_and_page};
use crate::{
    error::{AppError, AppResult},
    models::{NewShift, Shift, ShiftAssignment, ShiftFilter, ShiftStatus},
    pagination::Page,
    repository::ShiftRepository,
};

pub(super) const SHIFT_COLUMNS: &str = "id, company_id, company_location_id, guard_id, title, description, \
    location_name, address, latitude, longitude, start_time, end_time, days_of_week, hourly_rate_cents, \
    extra_hours, status, start_date, end_date, requirements, special_instructions, created_at, updated_at";

pub(super) const SHIFT_ASSIGNMENT_COLUMNS: &str = "id, shift_id, guard_id, application_id, status, assigned_at";

fn push_shift_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ShiftFilter) {
    builder.push(" WHERE TRUE");
    if let Some(company_id) = filter.company_id {
        builder.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(guard_id) = filter.guard_id {
        builder
            .push(" AND (guard_id = ")
            .push_bind(guard_id)
            .push(
                " OR EXISTS (SELECT 1 FROM shift_assignments sa \
                  WHERE sa.shift_id = shifts.id AND sa.status <> 'removed' AND sa.guard_id = ",
            )
            .push_bind(guard_id)
            .push("))");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.trim());
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR location_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.start_date_from {
        builder.push(" AND start_date >= ").push_bind(from);
    }
    if let Some(to) = filter.start_date_to {
        builder.push(" AND start_date <= ").push_bind(to);
    }
    if let Some(min) = filter.min_rate {
        builder.push(" AND hourly_rate_cents >= ").push_bind(min);
    }
    if let Some(max) = filter.max_rate {
        builder.push(" AND hourly_rate_cents <= ").push_bind(max);
    }
}

#[async_trait]
impl ShiftRepository for PostgresRepository {
    async fn create_shift(&self, shift: NewShift) -> AppResult<Shift> {
        let created = sqlx::query_as::<_, Shift>(&format!(
            "INSERT INTO shifts \
                 (id, company_id, company_location_id, title, description, location_name, address, \
                  latitude, longitude, start_time, end_time, days_of_week, hourly_rate_cents, \
                  start_date, end_date, requirements, special_instructions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {SHIFT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(shift.company_id)
        .bind(shift.company_location_id)
        .bind(&shift.title)
        .bind(&shift.description)
        .bind(&shift.location_name)
        .bind(&shift.address)
        .bind(shift.latitude)
        .bind(shift.longitude)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(&shift.days_of_week)
        .bind(shift.hourly_rate_cents)
        .bind(shift.start_date)
        .bind(shift.end_date)
        .bind(&shift.requirements)
        .bind(&shift.special_instructions)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_shift(&self, id: Uuid) -> AppResult<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>(&format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(shift)
    }

    async fn list_shifts(&self, filter: &ShiftFilter, page: Page) -> AppResult<(Vec<Shift>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shifts");
        push_shift_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {SHIFT_COLUMNS} FROM shifts"));
        push_shift_filters(&mut builder, filter);
        push_order_and_page(&mut builder, filter.sort.column(), filter.order.sql(), page);
        let shifts = builder.build_query_as::<Shift>().fetch_all(&self.pool).await?;

        Ok((shifts, total))
    }

    async fn update_shift(&self, shift: &Shift) -> AppResult<Shift> {
        sqlx::query_as::<_, Shift>(&format!(
            "UPDATE shifts SET company_location_id = $2, title = $3, description = $4, \
                 location_name = $5, address = $6, latitude = $7, longitude = $8, start_time = $9, \
                 end_time = $10, days_of_week = $11, hourly_rate_cents = $12, extra_hours = $13, \
                 status = $14, start_date = $15, end_date = $16, requirements = $17, \
                 special_instructions = $18, updated_at = NOW() \
             WHERE id = $1 RETURNING {SHIFT_COLUMNS}"
        ))
        .bind(shift.id)
        .bind(shift.company_location_id)
        .bind(&shift.title)
        .bind(&shift.description)
        .bind(&shift.location_name)
        .bind(&shift.address)
        .bind(shift.latitude)
        .bind(shift.longitude)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(&shift.days_of_week)
        .bind(shift.hourly_rate_cents)
        .bind(shift.extra_hours)
        .bind(shift.status)
        .bind(shift.start_date)
        .bind(shift.end_date)
        .bind(&shift.requirements)
        .bind(&shift.special_instructions)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Shift"))
    }

    async fn delete_shift(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shifts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn assign_guard(&self, shift_id: Uuid, guard_id: Uuid) -> AppResult<Shift> {
        let mut tx = self.pool.begin().await?;

        let status: Option<ShiftStatus> = sqlx::query_scalar("SELECT status FROM shifts WHERE id = $1 FOR UPDATE")
            .bind(shift_id)
            .fetch_optional(&mut *tx)
            .await?;
        match status {
            None => return Err(AppError::not_found("Shift")),
            Some(ShiftStatus::Open) => {}
            Some(_) => return Err(AppError::validation("Shift is not open for assignment")),
        }

        let shift = sqlx::query_as::<_, Shift>(&format!(
            "UPDATE shifts SET guard_id = $2, status = 'assigned', updated_at = NOW() \
             WHERE id = $1 RETURNING {SHIFT_COLUMNS}"
        ))
        .bind(shift_id)
        .bind(guard_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO shift_assignments (id, shift_id, guard_id, status) VALUES ($1, $2, $3, 'assigned') \
             ON CONFLICT (shift_id, guard_id) DO UPDATE SET status = 'assigned', assigned_at = NOW()",
        )
        .bind(Uuid::new_v4())
        .bind(shift_id)
        .bind(guard_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(shift)
    }

    async fn remove_guard(&self, shift_id: Uuid) -> AppResult<Shift> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Option<Uuid>> = sqlx::query_scalar("SELECT guard_id FROM shifts WHERE id = $1 FOR UPDATE")
            .bind(shift_id)
            .fetch_optional(&mut *tx)
            .await?;
        let guard_id = match current {
            None => return Err(AppError::not_found("Shift")),
            Some(None) => return Err(AppError::validation("No guard assigned to this shift")),
            Some(Some(guard_id)) => guard_id,
        };

        let shift = sqlx::query_as::<_, Shift>(&format!(
            "UPDATE shifts SET guard_id = NULL, status = 'open', updated_at = NOW() \
             WHERE id = $1 RETURNING {SHIFT_COLUMNS}"
        ))
        .bind(shift_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE shift_assignments SET status = 'removed' WHERE shift_id = $1 AND guard_id = $2")
            .bind(shift_id)
            .bind(guard_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(shift)
    }

    async fn shift_assignments(&self, shift_id: Uuid) -> AppResult<Vec<ShiftAssignment>> {
        let assignments = sqlx::query_as::<_, ShiftAssignment>(&format!(
            "SELECT {SHIFT_ASSIGNMENT_COLUMNS} FROM shift_assignments WHERE shift_id = $1 ORDER BY assigned_at"
        ))
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assignments)
    }
}
