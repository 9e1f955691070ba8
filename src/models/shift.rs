use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{ApplicationWithGuard, ShiftAssignment, UserSummary, clock};
use crate::pagination::{Page, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[sqlx(type_name = "day_of_week", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// ShiftStatus
///
/// `open` → `assigned` on the first assignment. `active`, `terminated`, `resigned` and
/// `completed` are set by the company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "shift_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ShiftStatus {
    #[default]
    Open,
    Assigned,
    Active,
    Terminated,
    Resigned,
    Completed,
}

impl ShiftStatus {
    pub fn is_locked(self) -> bool {
        matches!(self, ShiftStatus::Active | ShiftStatus::Completed)
    }
}

/// Shift
///
/// A recurring weekly slot. The address and coordinates are copied from the company
/// location at creation; `guard_id` holds a direct assignment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Shift {
    pub id: Uuid,
    pub company_id: Uuid,
    pub company_location_id: Option<Uuid>,
    pub guard_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub location_name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "18:00:00")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "02:00:00")]
    pub end_time: NaiveTime,
    pub days_of_week: Vec<DayOfWeek>,
    pub hourly_rate_cents: i64,
    pub extra_hours: f64,
    pub status: ShiftStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub requirements: Vec<String>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewShift {
    pub company_id: Uuid,
    pub company_location_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub location_name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub days_of_week: Vec<DayOfWeek>,
    pub hourly_rate_cents: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub requirements: Vec<String>,
    pub special_instructions: Option<String>,
}

// --- Request Payloads ---

/// CreateShiftRequest
///
/// Either `company_location_id` or the inline `location_name`/`address` pair must be given.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateShiftRequest {
    pub title: String,
    pub description: Option<String>,
    pub location_name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "18:00")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "02:00")]
    pub end_time: NaiveTime,
    pub days_of_week: Vec<DayOfWeek>,
    pub hourly_rate_cents: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub requirements: Option<Vec<String>>,
    pub special_instructions: Option<String>,
    pub company_location_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateShiftRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(with = "clock::option", default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "clock::option", default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<DayOfWeek>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ShiftStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_location_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AssignGuardRequest {
    pub guard_id: Uuid,
}

// --- Listing & Filtering ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSort {
    #[default]
    CreatedAt,
    StartDate,
    HourlyRate,
    Title,
    Status,
}

impl ShiftSort {
    pub fn column(self) -> &'static str {
        match self {
            ShiftSort::CreatedAt => "created_at",
            ShiftSort::StartDate => "start_date",
            ShiftSort::HourlyRate => "hourly_rate_cents",
            ShiftSort::Title => "title",
            ShiftSort::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShiftQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Case-insensitive match against title, description and location name.
    pub search: Option<String>,
    pub status: Option<ShiftStatus>,
    pub start_date_from: Option<NaiveDate>,
    pub start_date_to: Option<NaiveDate>,
    pub min_rate: Option<i64>,
    pub max_rate: Option<i64>,
    pub sort_by: Option<ShiftSort>,
    pub sort_order: Option<SortOrder>,
}

/// ShiftFilter
///
/// `guard_id` matches shifts where the guard is directly assigned or holds a live
/// shift assignment.
#[derive(Debug, Clone, Default)]
pub struct ShiftFilter {
    pub company_id: Option<Uuid>,
    pub guard_id: Option<Uuid>,
    pub search: Option<String>,
    pub status: Option<ShiftStatus>,
    pub start_date_from: Option<NaiveDate>,
    pub start_date_to: Option<NaiveDate>,
    pub min_rate: Option<i64>,
    pub max_rate: Option<i64>,
    pub sort: ShiftSort,
    pub order: SortOrder,
}

impl ShiftQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }

    pub fn filter(&self) -> ShiftFilter {
        ShiftFilter {
            company_id: None,
            guard_id: None,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            status: self.status,
            start_date_from: self.start_date_from,
            start_date_to: self.start_date_to,
            min_rate: self.min_rate,
            max_rate: self.max_rate,
            sort: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        }
    }
}

// --- Views ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ShiftListing {
    #[serde(flatten)]
    pub shift: Shift,
    pub company: Option<UserSummary>,
    pub guard: Option<UserSummary>,
}

/// ShiftDetail
///
/// GET /shifts/{id} and the company view: the listing plus assignments and applications.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ShiftDetail {
    #[serde(flatten)]
    pub shift: Shift,
    pub company: Option<UserSummary>,
    pub guard: Option<UserSummary>,
    pub assignments: Vec<ShiftAssignment>,
    pub applications: Vec<ApplicationWithGuard>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{TypeInfo, postgres::PgHasArrayType};

    #[test]
    fn day_of_week_arrays_use_the_derived_postgres_type() {
        let info = <DayOfWeek as PgHasArrayType>::array_type_info();
        assert!(info.name().ends_with("day_of_week"));
        assert!(info.name().starts_with('_'));
    }
}
