use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PostgresRepository, push_order_and_page};
use crate::{
    error::AppResult,
    models::{Attendance, AttendanceFilter, AttendanceTarget, CheckIn, CheckOut},
    pagination::Page,
    repository::AttendanceRepository,
};

const ATTENDANCE_COLUMNS: &str = "id, guard_id, job_id, shift_id, date, check_in_time, check_out_time, \
    check_in_latitude, check_in_longitude, check_out_latitude, check_out_longitude, hours_worked, \
    status, notes, verified_by, verified_at, created_at, updated_at";

fn target_ids(target: AttendanceTarget) -> (Option<Uuid>, Option<Uuid>) {
    match target {
        AttendanceTarget::Job(id) => (Some(id), None),
        AttendanceTarget::Shift(id) => (None, Some(id)),
    }
}

fn push_attendance_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AttendanceFilter) {
    builder.push(" WHERE TRUE");
    if let Some(guard_id) = filter.guard_id {
        builder.push(" AND guard_id = ").push_bind(guard_id);
    }
    if let Some(company_id) = filter.company_id {
        builder
            .push(" AND (job_id IN (SELECT id FROM jobs WHERE company_id = ")
            .push_bind(company_id)
            .push(") OR shift_id IN (SELECT id FROM shifts WHERE company_id = ")
            .push_bind(company_id)
            .push("))");
    }
    if let Some(job_id) = filter.job_id {
        builder.push(" AND job_id = ").push_bind(job_id);
    }
    if let Some(shift_id) = filter.shift_id {
        builder.push(" AND shift_id = ").push_bind(shift_id);
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
}

#[async_trait]
impl AttendanceRepository for PostgresRepository {
    async fn find_attendance_for_day(
        &self,
        guard_id: Uuid,
        target: AttendanceTarget,
        date: NaiveDate,
    ) -> AppResult<Option<Attendance>> {
        let column = match target {
            AttendanceTarget::Job(_) => "job_id",
            AttendanceTarget::Shift(_) => "shift_id",
        };
        let record = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE guard_id = $1 AND date = $2 AND {column} = $3"
        ))
        .bind(guard_id)
        .bind(date)
        .bind(target.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// record_check_in
    ///
    /// Upserts against the per-day unique index. A row that already has a check-in time is
    /// left alone and nothing is returned.
    async fn record_check_in(&self, check_in: CheckIn) -> AppResult<Option<Attendance>> {
        let (job_id, shift_id) = target_ids(check_in.target);
        let conflict = match check_in.target {
            AttendanceTarget::Job(_) => "(guard_id, date, job_id) WHERE job_id IS NOT NULL",
            AttendanceTarget::Shift(_) => "(guard_id, date, shift_id) WHERE shift_id IS NOT NULL",
        };

        let record = sqlx::query_as::<_, Attendance>(&format!(
            "INSERT INTO attendance \
                 (id, guard_id, job_id, shift_id, date, check_in_time, check_in_latitude, \
                  check_in_longitude, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'checked_in', $9) \
             ON CONFLICT {conflict} DO UPDATE SET \
                 check_in_time = EXCLUDED.check_in_time, \
                 check_in_latitude = EXCLUDED.check_in_latitude, \
                 check_in_longitude = EXCLUDED.check_in_longitude, \
                 status = 'checked_in', \
                 notes = COALESCE(EXCLUDED.notes, attendance.notes), \
                 updated_at = NOW() \
             WHERE attendance.check_in_time IS NULL \
             RETURNING {ATTENDANCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(check_in.guard_id)
        .bind(job_id)
        .bind(shift_id)
        .bind(check_in.date)
        .bind(check_in.at)
        .bind(check_in.latitude)
        .bind(check_in.longitude)
        .bind(&check_in.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn record_check_out(&self, id: Uuid, check_out: CheckOut) -> AppResult<Option<Attendance>> {
        let record = sqlx::query_as::<_, Attendance>(&format!(
            "UPDATE attendance SET check_out_time = $2, check_out_latitude = $3, check_out_longitude = $4, \
                 hours_worked = $5, status = 'checked_out', notes = COALESCE($6, notes), updated_at = NOW() \
             WHERE id = $1 AND check_in_time IS NOT NULL AND check_out_time IS NULL \
             RETURNING {ATTENDANCE_COLUMNS}"
        ))
        .bind(id)
        .bind(check_out.at)
        .bind(check_out.latitude)
        .bind(check_out.longitude)
        .bind(check_out.hours_worked)
        .bind(&check_out.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_attendance(&self, id: Uuid) -> AppResult<Option<Attendance>> {
        let record = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_attendance(&self, filter: &AttendanceFilter, page: Page) -> AppResult<(Vec<Attendance>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM attendance");
        push_attendance_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance"));
        push_attendance_filters(&mut builder, filter);
        push_order_and_page(&mut builder, filter.sort.column(), filter.order.sql(), page);
        let records = builder.build_query_as::<Attendance>().fetch_all(&self.pool).await?;

        Ok((records, total))
    }

    async fn verify_attendance(&self, id: Uuid, verifier: Uuid, notes: Option<String>) -> AppResult<Option<Attendance>> {
        let record = sqlx::query_as::<_, Attendance>(&format!(
            "UPDATE attendance SET verified_by = $2, verified_at = NOW(), notes = COALESCE($3, notes), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {ATTENDANCE_COLUMNS}"
        ))
        .bind(id)
        .bind(verifier)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
