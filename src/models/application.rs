use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::UserSummary;
use crate::pagination::{Page, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    Active,
    Completed,
    Removed,
}

/// Application
///
/// A guard's bid on exactly one of a job or a shift. The database enforces one
/// application per (job, guard) and per (shift, guard).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Application {
    pub id: Uuid,
    pub guard_id: Uuid,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub status: ApplicationStatus,
    pub bid_rate_cents: i64,
    pub cover_letter: Option<String>,
    pub notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Parent of an application, used to route accept/reject to the right assignment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationTarget {
    Job(Uuid),
    Shift(Uuid),
}

impl Application {
    pub fn target(&self) -> Option<ApplicationTarget> {
        match (self.job_id, self.shift_id) {
            (Some(job), None) => Some(ApplicationTarget::Job(job)),
            (None, Some(shift)) => Some(ApplicationTarget::Shift(shift)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub guard_id: Uuid,
    pub target: ApplicationTarget,
    pub bid_rate_cents: i64,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct JobAssignment {
    pub id: Uuid,
    pub job_id: Uuid,
    pub guard_id: Uuid,
    pub application_id: Option<Uuid>,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ShiftAssignment {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub guard_id: Uuid,
    pub application_id: Option<Uuid>,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
}

/// AcceptOutcome
///
/// What an accepted application produced: the updated application and, for jobs, the
/// new hired count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AcceptOutcome {
    pub application: Application,
    pub hired_guards: Option<i32>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ApplyRequest {
    /// Defaults to the posted hourly rate.
    pub bid_rate_cents: Option<i64>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RejectApplicationRequest {
    pub reason: Option<String>,
}

// --- Listing & Filtering ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    Job,
    Shift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSort {
    #[default]
    AppliedAt,
    Status,
    BidRate,
}

impl ApplicationSort {
    pub fn column(self) -> &'static str {
        match self {
            ApplicationSort::AppliedAt => "applied_at",
            ApplicationSort::Status => "status",
            ApplicationSort::BidRate => "bid_rate_cents",
        }
    }
}

/// ApplicationQuery
///
/// Query parameters for the guard's own list and the company's per-job/per-shift lists.
/// `job_id`/`shift_id`/`type` only apply to the guard list.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApplicationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<ApplicationStatus>,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<ApplicationKind>,
    pub sort_by: Option<ApplicationSort>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub guard_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub kind: Option<ApplicationKind>,
    pub status: Option<ApplicationStatus>,
    pub sort: ApplicationSort,
    pub order: SortOrder,
}

impl ApplicationQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }

    /// Filter for a guard's own applications. Explicit ids win over `type`.
    pub fn for_guard(&self, guard_id: Uuid) -> ApplicationFilter {
        let kind = if self.job_id.is_some() || self.shift_id.is_some() {
            None
        } else {
            self.kind
        };
        ApplicationFilter {
            guard_id: Some(guard_id),
            job_id: self.job_id,
            shift_id: self.shift_id,
            kind,
            status: self.status,
            sort: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        }
    }

    pub fn for_target(&self, target: ApplicationTarget) -> ApplicationFilter {
        let (job_id, shift_id) = match target {
            ApplicationTarget::Job(id) => (Some(id), None),
            ApplicationTarget::Shift(id) => (None, Some(id)),
        };
        ApplicationFilter {
            guard_id: None,
            job_id,
            shift_id,
            kind: None,
            status: self.status,
            sort: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        }
    }
}

// --- Views ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApplicationWithGuard {
    #[serde(flatten)]
    pub application: Application,
    pub guard: Option<UserSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_ids_override_the_type_filter() {
        let job_id = Uuid::from_u128(7);
        let query = ApplicationQuery {
            job_id: Some(job_id),
            kind: Some(ApplicationKind::Shift),
            ..Default::default()
        };
        let filter = query.for_guard(Uuid::from_u128(1));
        assert_eq!(filter.job_id, Some(job_id));
        assert_eq!(filter.kind, None);

        let by_kind = ApplicationQuery {
            kind: Some(ApplicationKind::Shift),
            ..Default::default()
        }
        .for_guard(Uuid::from_u128(1));
        assert_eq!(by_kind.kind, Some(ApplicationKind::Shift));
    }
}
