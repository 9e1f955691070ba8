//! Persistence contracts.
//!
//! Handlers only see `RepositoryState = Arc<dyn Repository>`; the concrete store is
//! chosen in `main` (Postgres) or in tests (in-memory). Every method that mutates more
//! than one row runs atomically in both implementations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        AcceptOutcome, Application, ApplicationFilter, Attendance, AttendanceFilter,
        AttendanceTarget, CheckIn, CheckOut, CompanyLocation, CompanyProfile,
        CreateLocationRequest, GuardProfile, Job, JobAssignment, JobFilter, JobLocation,
        NewAccount, NewApplication, NewEscrow, NewJob, NewJobLocation, NewShift, PlatformStats,
        ReleaseResponse, Shift, ShiftAssignment, ShiftFilter, Transaction, TransactionFilter,
        User, UserStatus, UserSummary, Wallet, WalletMovement,
    },
    pagination::Page,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Writes the user, a zero-balance wallet and the role's profile together.
    /// A taken email is a `Conflict`.
    async fn create_account(&self, account: NewAccount) -> AppResult<User>;
    async fn update_user_contact(&self, id: Uuid, name: Option<String>, phone: Option<String>) -> AppResult<User>;
    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> AppResult<()>;
    async fn touch_last_login(&self, id: Uuid) -> AppResult<()>;
    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> AppResult<Option<User>>;
    async fn get_guard_profile(&self, user_id: Uuid) -> AppResult<Option<GuardProfile>>;
    async fn get_company_profile(&self, user_id: Uuid) -> AppResult<Option<CompanyProfile>>;
    async fn user_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<UserSummary>>;
}

/// Company locations are always scoped by owner; a location owned by someone else is
/// indistinguishable from a missing one.
#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create_location(&self, company_id: Uuid, req: CreateLocationRequest) -> AppResult<CompanyLocation>;
    async fn list_locations(&self, company_id: Uuid) -> AppResult<Vec<CompanyLocation>>;
    async fn get_location(&self, id: Uuid, company_id: Uuid) -> AppResult<Option<CompanyLocation>>;
    async fn save_location(&self, location: &CompanyLocation) -> AppResult<CompanyLocation>;
    async fn delete_location(&self, id: Uuid, company_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create_job(&self, job: NewJob, location: Option<NewJobLocation>) -> AppResult<(Job, Option<JobLocation>)>;
    async fn get_job(&self, id: Uuid) -> AppResult<Option<Job>>;
    async fn list_jobs(&self, filter: &JobFilter, page: Page) -> AppResult<(Vec<Job>, i64)>;
    /// Persists the edited job. With `Some(location)` the snapshot is replaced; with
    /// `None` the existing snapshot's window, hours and guard count follow the job.
    async fn update_job(&self, job: &Job, location: Option<NewJobLocation>) -> AppResult<Job>;
    async fn delete_job(&self, id: Uuid) -> AppResult<bool>;
    async fn job_locations(&self, job_ids: &[Uuid]) -> AppResult<Vec<JobLocation>>;
}

#[async_trait]
pub trait ShiftRepository: Send + Sync {
    async fn create_shift(&self, shift: NewShift) -> AppResult<Shift>;
    async fn get_shift(&self, id: Uuid) -> AppResult<Option<Shift>>;
    async fn list_shifts(&self, filter: &ShiftFilter, page: Page) -> AppResult<(Vec<Shift>, i64)>;
    async fn update_shift(&self, shift: &Shift) -> AppResult<Shift>;
    async fn delete_shift(&self, id: Uuid) -> AppResult<bool>;
    /// Sets the direct guard on an `open` shift, moves it to `assigned` and records the
    /// assignment.
    async fn assign_guard(&self, shift_id: Uuid, guard_id: Uuid) -> AppResult<Shift>;
    /// Clears the direct guard, reopens the shift and marks that guard's assignment removed.
    async fn remove_guard(&self, shift_id: Uuid) -> AppResult<Shift>;
    async fn shift_assignments(&self, shift_id: Uuid) -> AppResult<Vec<ShiftAssignment>>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// A second application by the same guard to the same job or shift is a `Conflict`.
    async fn create_application(&self, application: NewApplication) -> AppResult<Application>;
    async fn get_application(&self, id: Uuid) -> AppResult<Option<Application>>;
    async fn list_applications(&self, filter: &ApplicationFilter, page: Page) -> AppResult<(Vec<Application>, i64)>;
    async fn applications_for_jobs(&self, job_ids: &[Uuid]) -> AppResult<Vec<Application>>;
    async fn applications_for_shifts(&self, shift_ids: &[Uuid]) -> AppResult<Vec<Application>>;
    /// Flips an `applied` application to `accepted` and creates the assignment, updating
    /// the parent's counters and status. Fails if the application was processed
    /// concurrently or the job has no free slot.
    async fn accept_application(&self, id: Uuid) -> AppResult<AcceptOutcome>;
    async fn reject_application(&self, id: Uuid, reason: Option<String>) -> AppResult<Application>;
    async fn job_assignment(&self, job_id: Uuid, guard_id: Uuid) -> AppResult<Option<JobAssignment>>;
    async fn shift_assignment(&self, shift_id: Uuid, guard_id: Uuid) -> AppResult<Option<ShiftAssignment>>;
}

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn find_attendance_for_day(
        &self,
        guard_id: Uuid,
        target: AttendanceTarget,
        date: NaiveDate,
    ) -> AppResult<Option<Attendance>>;
    /// Records the check-in for the day. Returns `None` when the guard already checked in.
    async fn record_check_in(&self, check_in: CheckIn) -> AppResult<Option<Attendance>>;
    /// Returns `None` unless the row is checked in and not yet checked out.
    async fn record_check_out(&self, id: Uuid, check_out: CheckOut) -> AppResult<Option<Attendance>>;
    async fn get_attendance(&self, id: Uuid) -> AppResult<Option<Attendance>>;
    async fn list_attendance(&self, filter: &AttendanceFilter, page: Page) -> AppResult<(Vec<Attendance>, i64)>;
    async fn verify_attendance(&self, id: Uuid, verifier: Uuid, notes: Option<String>) -> AppResult<Option<Attendance>>;
}

/// Every balance change and its ledger row are written together while the wallet row is
/// locked.
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn get_or_create_wallet(&self, user_id: Uuid) -> AppResult<Wallet>;
    async fn get_wallet(&self, user_id: Uuid) -> AppResult<Option<Wallet>>;
    async fn list_transactions(&self, filter: &TransactionFilter, page: Page) -> AppResult<(Vec<Transaction>, i64)>;
    async fn get_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>>;
    async fn deposit(&self, user_id: Uuid, amount_cents: i64, description: Option<String>) -> AppResult<WalletMovement>;
    async fn withdraw(&self, user_id: Uuid, amount_cents: i64, description: Option<String>) -> AppResult<WalletMovement>;
    async fn create_escrow(&self, escrow: NewEscrow) -> AppResult<Transaction>;
    async fn release_escrow(&self, escrow_id: Uuid, now: DateTime<Utc>) -> AppResult<ReleaseResponse>;
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn platform_stats(&self) -> AppResult<PlatformStats>;
}

/// Repository
///
/// The full persistence surface. Implemented automatically for any store that provides
/// every aggregate trait.
pub trait Repository:
    UserRepository
    + LocationRepository
    + JobRepository
    + ShiftRepository
    + ApplicationRepository
    + AttendanceRepository
    + WalletRepository
    + AdminRepository
{
}

impl<T> Repository for T where
    T: UserRepository
        + LocationRepository
        + JobRepository
        + ShiftRepository
        + ApplicationRepository
        + AttendanceRepository
        + WalletRepository
        + AdminRepository
{
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
