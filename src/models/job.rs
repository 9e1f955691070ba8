use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{ApplicationWithGuard, UserSummary, clock};
use crate::pagination::{Page, SortOrder};

/// JobStatus
///
/// `open` until the first hire, `hiring` while partially staffed, `hired` once
/// `hired_guards >= required_guards`. The company drives the remaining transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum JobStatus {
    #[default]
    Open,
    Hiring,
    Hired,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Guards may apply while the job is still staffing.
    pub fn accepts_applications(self) -> bool {
        matches!(self, JobStatus::Open | JobStatus::Hiring)
    }

    /// Running or finished jobs can no longer be edited or deleted.
    pub fn is_locked(self) -> bool {
        matches!(self, JobStatus::InProgress | JobStatus::Completed)
    }

    /// Status after a hire, given the new hired count.
    pub fn after_hiring(hired: i32, required: i32) -> JobStatus {
        if hired >= required {
            JobStatus::Hired
        } else {
            JobStatus::Hiring
        }
    }
}

/// Job
///
/// A single-date staffing request. `total_hours` and `total_budget_cents` are derived
/// from the time window, the rate and the guard count whenever any of them change.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "08:00:00")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "16:00:00")]
    pub end_time: NaiveTime,
    pub hourly_rate_cents: i64,
    pub total_hours: f64,
    pub required_guards: i32,
    pub hired_guards: i32,
    pub status: JobStatus,
    pub requirements: Vec<String>,
    pub special_instructions: Option<String>,
    pub total_budget_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// JobLocation
///
/// Snapshot of a company location taken when the job was posted, so later edits to the
/// saved location do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct JobLocation {
    pub id: Uuid,
    pub job_id: Uuid,
    pub company_location_id: Option<Uuid>,
    pub location_name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hours_required: f64,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
    pub required_guards: i32,
    pub special_requirements: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// NewJobLocation
///
/// Insert shape for a location snapshot; the repository assigns id and job_id.
#[derive(Debug, Clone)]
pub struct NewJobLocation {
    pub company_location_id: Option<Uuid>,
    pub location_name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hours_required: f64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub required_guards: i32,
    pub special_requirements: Option<String>,
}

/// NewJob
///
/// Validated insert shape with the derived totals already computed.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub hourly_rate_cents: i64,
    pub total_hours: f64,
    pub required_guards: i32,
    pub requirements: Vec<String>,
    pub special_instructions: Option<String>,
    pub total_budget_cents: i64,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateJobRequest {
    #[schema(example = "Night watch at Riverside Warehouse")]
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "22:00")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    #[ts(type = "string")]
    #[schema(value_type = String, example = "06:00")]
    pub end_time: NaiveTime,
    #[schema(example = 2500)]
    pub hourly_rate_cents: i64,
    pub required_guards: Option<i32>,
    pub requirements: Option<Vec<String>>,
    pub special_instructions: Option<String>,
    pub company_location_id: Option<Uuid>,
}

/// UpdateJobRequest
///
/// Partial update payload (PUT /jobs/{id}). Changing the window, rate or guard count
/// recomputes the totals; a different `company_location_id` replaces the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateJobRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(with = "clock::option", default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "clock::option", default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_guards: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_location_id: Option<Uuid>,
}

impl UpdateJobRequest {
    /// True when the derived totals must be recomputed.
    pub fn changes_totals(&self) -> bool {
        self.start_time.is_some()
            || self.end_time.is_some()
            || self.hourly_rate_cents.is_some()
            || self.required_guards.is_some()
    }
}

// --- Listing & Filtering ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobSort {
    #[default]
    CreatedAt,
    Date,
    HourlyRate,
    Title,
    Status,
}

impl JobSort {
    pub fn column(self) -> &'static str {
        match self {
            JobSort::CreatedAt => "created_at",
            JobSort::Date => "date",
            JobSort::HourlyRate => "hourly_rate_cents",
            JobSort::Title => "title",
            JobSort::Status => "status",
        }
    }
}

/// JobQuery
///
/// Query parameters for GET /jobs and GET /jobs/company/mine. Rates are in cents.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Case-insensitive match against title and description.
    pub search: Option<String>,
    pub status: Option<JobStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_rate: Option<i64>,
    pub max_rate: Option<i64>,
    pub sort_by: Option<JobSort>,
    pub sort_order: Option<SortOrder>,
}

/// JobFilter
///
/// Repository-side filter. `company_id` scopes the query to one owner.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub company_id: Option<Uuid>,
    pub search: Option<String>,
    pub status: Option<JobStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_rate: Option<i64>,
    pub max_rate: Option<i64>,
    pub sort: JobSort,
    pub order: SortOrder,
}

impl JobQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }

    pub fn filter(&self, company_id: Option<Uuid>) -> JobFilter {
        JobFilter {
            company_id,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
            min_rate: self.min_rate,
            max_rate: self.max_rate,
            sort: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        }
    }
}

// --- Views ---

/// JobListing
///
/// A job enriched with its location snapshot and the posting company.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct JobListing {
    #[serde(flatten)]
    pub job: Job,
    pub location: Option<JobLocation>,
    pub company: Option<UserSummary>,
}

/// JobDetail
///
/// GET /jobs/{id}: the listing plus every application with its guard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    pub location: Option<JobLocation>,
    pub company: Option<UserSummary>,
    pub applications: Vec<ApplicationWithGuard>,
}
