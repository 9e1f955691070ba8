use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::UserSummary;
use crate::pagination::{Page, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AttendanceStatus {
    #[default]
    Pending,
    CheckedIn,
    CheckedOut,
    NoShow,
    Late,
}

/// Attendance
///
/// One row per guard, UTC day and job (or shift). `hours_worked` is filled in on check-out.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Attendance {
    pub id: Uuid,
    pub guard_id: Uuid,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub date: NaiveDate,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub hours_worked: Option<f64>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The job or shift an attendance row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceTarget {
    Job(Uuid),
    Shift(Uuid),
}

impl AttendanceTarget {
    /// Exactly one of the two ids must be present.
    pub fn from_ids(job_id: Option<Uuid>, shift_id: Option<Uuid>) -> Option<Self> {
        match (job_id, shift_id) {
            (Some(job), None) => Some(AttendanceTarget::Job(job)),
            (None, Some(shift)) => Some(AttendanceTarget::Shift(shift)),
            _ => None,
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            AttendanceTarget::Job(id) | AttendanceTarget::Shift(id) => id,
        }
    }
}

impl Attendance {
    pub fn target(&self) -> Option<AttendanceTarget> {
        AttendanceTarget::from_ids(self.job_id, self.shift_id)
    }
}

#[derive(Debug, Clone)]
pub struct CheckIn {
    pub guard_id: Uuid,
    pub target: AttendanceTarget,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckOut {
    pub at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub hours_worked: f64,
    pub notes: Option<String>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CheckInRequest {
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub notes: Option<String>,
}

pub type CheckOutRequest = CheckInRequest;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VerifyAttendanceRequest {
    pub notes: Option<String>,
}

// --- Listing & Filtering ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceSort {
    #[default]
    Date,
    CheckInTime,
    Status,
}

impl AttendanceSort {
    pub fn column(self) -> &'static str {
        match self {
            AttendanceSort::Date => "date",
            AttendanceSort::CheckInTime => "check_in_time",
            AttendanceSort::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub sort_by: Option<AttendanceSort>,
    pub sort_order: Option<SortOrder>,
}

/// AttendanceFilter
///
/// `guard_id` scopes to one guard; `company_id` scopes to rows whose job or shift the
/// company owns.
#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub guard_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub status: Option<AttendanceStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort: AttendanceSort,
    pub order: SortOrder,
}

impl AttendanceQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }

    pub fn filter(&self) -> AttendanceFilter {
        AttendanceFilter {
            guard_id: None,
            company_id: None,
            job_id: self.job_id,
            shift_id: self.shift_id,
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
            sort: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        }
    }
}

// --- Views ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AttendanceView {
    #[serde(flatten)]
    pub attendance: Attendance,
    pub guard: Option<UserSummary>,
}
