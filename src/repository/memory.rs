//! In-memory repository.
//!
//! Backs the handler and router tests. Every method holds the single store lock for its
//! whole body, which gives the multi-row operations the same all-or-nothing behaviour as
//! the Postgres transactions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AdminRepository, ApplicationRepository, AttendanceRepository, JobRepository, LocationRepository,
    ShiftRepository, UserRepository, WalletRepository,
};
use crate::{
    error::{AppError, AppResult},
    ledger,
    models::{
        AcceptOutcome, Application, ApplicationFilter, ApplicationKind, ApplicationSort,
        ApplicationStatus, ApplicationTarget, AssignmentStatus, Attendance, AttendanceFilter,
        AttendanceSort, AttendanceStatus, AttendanceTarget, CheckIn, CheckOut, CompanyLocation,
        CompanyProfile, CreateLocationRequest, GuardProfile, Job, JobAssignment, JobFilter,
        JobLocation, JobSort, JobStatus, NewAccount, NewApplication, NewEscrow, NewJob,
        NewJobLocation, NewShift, PlatformStats, ReleaseResponse, Role, Shift, ShiftAssignment,
        ShiftFilter, ShiftSort, ShiftStatus, Transaction, TransactionFilter, TransactionSort,
        TransactionStatus, TransactionType, User, UserStatus, UserSummary, Wallet, WalletMovement,
    },
    pagination::{Page, SortOrder},
};

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    guard_profiles: HashMap<Uuid, GuardProfile>,
    company_profiles: HashMap<Uuid, CompanyProfile>,
    locations: HashMap<Uuid, CompanyLocation>,
    jobs: HashMap<Uuid, Job>,
    /// Keyed by job id; at most one snapshot per job.
    job_locations: HashMap<Uuid, JobLocation>,
    shifts: HashMap<Uuid, Shift>,
    applications: HashMap<Uuid, Application>,
    job_assignments: Vec<JobAssignment>,
    shift_assignments: Vec<ShiftAssignment>,
    attendance: HashMap<Uuid, Attendance>,
    /// Keyed by user id.
    wallets: HashMap<Uuid, Wallet>,
    transactions: Vec<Transaction>,
}

impl Store {
    fn wallet_entry(&mut self, user_id: Uuid) -> &mut Wallet {
        self.wallets.entry(user_id).or_insert_with(|| new_wallet(user_id))
    }

    fn upsert_shift_assignment(&mut self, shift_id: Uuid, guard_id: Uuid, application_id: Option<Uuid>) {
        let now = Utc::now();
        match self
            .shift_assignments
            .iter_mut()
            .find(|a| a.shift_id == shift_id && a.guard_id == guard_id)
        {
            Some(existing) => {
                existing.status = AssignmentStatus::Assigned;
                if application_id.is_some() {
                    existing.application_id = application_id;
                } else {
                    existing.assigned_at = now;
                }
            }
            None => self.shift_assignments.push(ShiftAssignment {
                id: Uuid::new_v4(),
                shift_id,
                guard_id,
                application_id,
                status: AssignmentStatus::Assigned,
                assigned_at: now,
            }),
        }
    }
}

/// MemoryRepository
///
/// A process-local implementation of every repository trait. Cloning shares the store.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_wallet(user_id: Uuid) -> Wallet {
    let now = Utc::now();
    Wallet {
        id: Uuid::new_v4(),
        user_id,
        balance_cents: 0,
        currency: "USD".to_string(),
        is_active: true,
        last_updated: now,
        created_at: now,
    }
}

fn ledger_row(kind: TransactionType, status: TransactionStatus, amount_cents: i64) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        from_user_id: None,
        to_user_id: None,
        job_id: None,
        shift_id: None,
        amount_cents,
        kind,
        status,
        description: None,
        reference_id: None,
        escrow_release_date: None,
        processed_at: None,
        failure_reason: None,
        created_at: Utc::now(),
    }
}

fn matches_search(fields: &[Option<&str>], needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Sorts with `id` as the tie-breaker, then cuts the requested page.
fn sort_and_page<T: Clone>(
    mut rows: Vec<T>,
    order: SortOrder,
    page: Page,
    id: impl Fn(&T) -> Uuid,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> (Vec<T>, i64) {
    rows.sort_by(|a, b| {
        let ordering = cmp(a, b).then_with(|| id(a).cmp(&id(b)));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    let total = rows.len() as i64;
    (page.slice(&rows), total)
}

fn in_range(date: NaiveDate, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    from.is_none_or(|from| date >= from) && to.is_none_or(|to| date <= to)
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.store.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let store = self.store.lock().await;
        Ok(store.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_account(&self, account: NewAccount) -> AppResult<User> {
        let mut store = self.store.lock().await;
        if store.users.values().any(|u| u.email == account.email) {
            return Err(AppError::Conflict("User with this email already exists".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: account.name.clone(),
            email: account.email,
            password_hash: account.password_hash,
            phone: account.phone,
            role: account.role,
            status: account.status,
            email_verified: false,
            phone_verified: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        store.wallets.insert(user.id, new_wallet(user.id));
        match user.role {
            Role::Agency => {
                store.company_profiles.insert(
                    user.id,
                    CompanyProfile {
                        id: Uuid::new_v4(),
                        user_id: user.id,
                        company_name: account.name,
                        created_at: now,
                        ..Default::default()
                    },
                );
            }
            Role::Guard => {
                store.guard_profiles.insert(
                    user.id,
                    GuardProfile {
                        id: Uuid::new_v4(),
                        user_id: user.id,
                        availability: true,
                        created_at: now,
                        ..Default::default()
                    },
                );
            }
            Role::Admin => {}
        }
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user_contact(&self, id: Uuid, name: Option<String>, phone: Option<String>) -> AppResult<User> {
        let mut store = self.store.lock().await;
        let user = store.users.get_mut(&id).ok_or_else(|| AppError::not_found("User"))?;
        if let Some(name) = name {
            user.name = name;
        }
        if phone.is_some() {
            user.phone = phone;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        if let Some(user) = self.store.lock().await.users.get_mut(&id) {
            user.password_hash = password_hash;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid) -> AppResult<()> {
        if let Some(user) = self.store.lock().await.users.get_mut(&id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> AppResult<Option<User>> {
        let mut store = self.store.lock().await;
        Ok(store.users.get_mut(&id).map(|user| {
            user.status = status;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn get_guard_profile(&self, user_id: Uuid) -> AppResult<Option<GuardProfile>> {
        Ok(self.store.lock().await.guard_profiles.get(&user_id).cloned())
    }

    async fn get_company_profile(&self, user_id: Uuid) -> AppResult<Option<CompanyProfile>> {
        Ok(self.store.lock().await.company_profiles.get(&user_id).cloned())
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<UserSummary>> {
        let store = self.store.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.users.get(id))
            .map(UserSummary::from)
            .collect())
    }
}

#[async_trait]
impl LocationRepository for MemoryRepository {
    async fn create_location(&self, company_id: Uuid, req: CreateLocationRequest) -> AppResult<CompanyLocation> {
        let now = Utc::now();
        let location = CompanyLocation {
            id: Uuid::new_v4(),
            company_id,
            location_name: req.location_name,
            address: req.address,
            latitude: req.latitude,
            longitude: req.longitude,
            special_requirements: req.special_requirements,
            created_at: now,
            updated_at: now,
        };
        self.store.lock().await.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn list_locations(&self, company_id: Uuid) -> AppResult<Vec<CompanyLocation>> {
        let store = self.store.lock().await;
        let mut locations: Vec<_> = store
            .locations
            .values()
            .filter(|l| l.company_id == company_id)
            .cloned()
            .collect();
        locations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(locations)
    }

    async fn get_location(&self, id: Uuid, company_id: Uuid) -> AppResult<Option<CompanyLocation>> {
        let store = self.store.lock().await;
        Ok(store.locations.get(&id).filter(|l| l.company_id == company_id).cloned())
    }

    async fn save_location(&self, location: &CompanyLocation) -> AppResult<CompanyLocation> {
        let mut store = self.store.lock().await;
        let stored = store
            .locations
            .get_mut(&location.id)
            .filter(|l| l.company_id == location.company_id)
            .ok_or_else(|| AppError::not_found("Location"))?;
        *stored = location.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_location(&self, id: Uuid, company_id: Uuid) -> AppResult<bool> {
        let mut store = self.store.lock().await;
        let owned = store.locations.get(&id).is_some_and(|l| l.company_id == company_id);
        if !owned {
            return Ok(false);
        }
        store.locations.remove(&id);
        for snapshot in store.job_locations.values_mut() {
            if snapshot.company_location_id == Some(id) {
                snapshot.company_location_id = None;
            }
        }
        for shift in store.shifts.values_mut() {
            if shift.company_location_id == Some(id) {
                shift.company_location_id = None;
            }
        }
        Ok(true)
    }
}

fn snapshot(job_id: Uuid, location: NewJobLocation) -> JobLocation {
    JobLocation {
        id: Uuid::new_v4(),
        job_id,
        company_location_id: location.company_location_id,
        location_name: location.location_name,
        address: location.address,
        latitude: location.latitude,
        longitude: location.longitude,
        hours_required: location.hours_required,
        start_time: location.start_time,
        end_time: location.end_time,
        required_guards: location.required_guards,
        special_requirements: location.special_requirements,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl JobRepository for MemoryRepository {
    async fn create_job(&self, job: NewJob, location: Option<NewJobLocation>) -> AppResult<(Job, Option<JobLocation>)> {
        let now = Utc::now();
        let created = Job {
            id: Uuid::new_v4(),
            company_id: job.company_id,
            title: job.title,
            description: job.description,
            date: job.date,
            start_time: job.start_time,
            end_time: job.end_time,
            hourly_rate_cents: job.hourly_rate_cents,
            total_hours: job.total_hours,
            required_guards: job.required_guards,
            hired_guards: 0,
            status: JobStatus::Open,
            requirements: job.requirements,
            special_instructions: job.special_instructions,
            total_budget_cents: job.total_budget_cents,
            created_at: now,
            updated_at: now,
        };

        let mut store = self.store.lock().await;
        let snapshot = location.map(|loc| snapshot(created.id, loc));
        if let Some(snap) = &snapshot {
            store.job_locations.insert(created.id, snap.clone());
        }
        store.jobs.insert(created.id, created.clone());
        Ok((created, snapshot))
    }

    async fn get_job(&self, id: Uuid) -> AppResult<Option<Job>> {
        Ok(self.store.lock().await.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter, page: Page) -> AppResult<(Vec<Job>, i64)> {
        let store = self.store.lock().await;
        let rows: Vec<Job> = store
            .jobs
            .values()
            .filter(|j| filter.company_id.is_none_or(|c| j.company_id == c))
            .filter(|j| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|s| matches_search(&[Some(j.title.as_str()), j.description.as_deref()], s))
            })
            .filter(|j| filter.status.is_none_or(|s| j.status == s))
            .filter(|j| in_range(j.date, filter.date_from, filter.date_to))
            .filter(|j| filter.min_rate.is_none_or(|min| j.hourly_rate_cents >= min))
            .filter(|j| filter.max_rate.is_none_or(|max| j.hourly_rate_cents <= max))
            .cloned()
            .collect();

        Ok(sort_and_page(rows, filter.order, page, |j| j.id, |a, b| match filter.sort {
            JobSort::CreatedAt => a.created_at.cmp(&b.created_at),
            JobSort::Date => a.date.cmp(&b.date),
            JobSort::HourlyRate => a.hourly_rate_cents.cmp(&b.hourly_rate_cents),
            JobSort::Title => a.title.cmp(&b.title),
            JobSort::Status => (a.status as u8).cmp(&(b.status as u8)),
        }))
    }

    async fn update_job(&self, job: &Job, location: Option<NewJobLocation>) -> AppResult<Job> {
        let mut store = self.store.lock().await;
        let stored = store.jobs.get_mut(&job.id).ok_or_else(|| AppError::not_found("Job"))?;
        // The hired counter only moves through accept_application.
        let hired_guards = stored.hired_guards;
        *stored = job.clone();
        stored.hired_guards = hired_guards;
        stored.updated_at = Utc::now();
        let updated = stored.clone();

        match location {
            Some(loc) => {
                store.job_locations.insert(job.id, snapshot(job.id, loc));
            }
            None => {
                if let Some(snap) = store.job_locations.get_mut(&job.id) {
                    snap.start_time = updated.start_time;
                    snap.end_time = updated.end_time;
                    snap.hours_required = updated.total_hours;
                    snap.required_guards = updated.required_guards;
                }
            }
        }
        Ok(updated)
    }

    async fn delete_job(&self, id: Uuid) -> AppResult<bool> {
        let mut store = self.store.lock().await;
        if store.jobs.remove(&id).is_none() {
            return Ok(false);
        }
        store.job_locations.remove(&id);
        store.applications.retain(|_, a| a.job_id != Some(id));
        store.job_assignments.retain(|a| a.job_id != id);
        store.attendance.retain(|_, a| a.job_id != Some(id));
        for row in store.transactions.iter_mut().filter(|t| t.job_id == Some(id)) {
            row.job_id = None;
        }
        Ok(true)
    }

    async fn job_locations(&self, job_ids: &[Uuid]) -> AppResult<Vec<JobLocation>> {
        let store = self.store.lock().await;
        Ok(job_ids
            .iter()
            .filter_map(|id| store.job_locations.get(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ShiftRepository for MemoryRepository {
    async fn create_shift(&self, shift: NewShift) -> AppResult<Shift> {
        let now = Utc::now();
        let created = Shift {
            id: Uuid::new_v4(),
            company_id: shift.company_id,
            company_location_id: shift.company_location_id,
            guard_id: None,
            title: shift.title,
            description: shift.description,
            location_name: shift.location_name,
            address: shift.address,
            latitude: shift.latitude,
            longitude: shift.longitude,
            start_time: shift.start_time,
            end_time: shift.end_time,
            days_of_week: shift.days_of_week,
            hourly_rate_cents: shift.hourly_rate_cents,
            extra_hours: 0.0,
            status: ShiftStatus::Open,
            start_date: shift.start_date,
            end_date: shift.end_date,
            requirements: shift.requirements,
            special_instructions: shift.special_instructions,
            created_at: now,
            updated_at: now,
        };
        self.store.lock().await.shifts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_shift(&self, id: Uuid) -> AppResult<Option<Shift>> {
        Ok(self.store.lock().await.shifts.get(&id).cloned())
    }

    async fn list_shifts(&self, filter: &ShiftFilter, page: Page) -> AppResult<(Vec<Shift>, i64)> {
        let store = self.store.lock().await;
        let holds_shift = |shift: &Shift, guard_id: Uuid| {
            shift.guard_id == Some(guard_id)
                || store.shift_assignments.iter().any(|a| {
                    a.shift_id == shift.id && a.guard_id == guard_id && a.status != AssignmentStatus::Removed
                })
        };

        let rows: Vec<Shift> = store
            .shifts
            .values()
            .filter(|s| filter.company_id.is_none_or(|c| s.company_id == c))
            .filter(|s| filter.guard_id.is_none_or(|g| holds_shift(s, g)))
            .filter(|s| {
                filter.search.as_deref().is_none_or(|q| {
                    matches_search(
                        &[Some(s.title.as_str()), s.description.as_deref(), Some(s.location_name.as_str())],
                        q,
                    )
                })
            })
            .filter(|s| filter.status.is_none_or(|st| s.status == st))
            .filter(|s| in_range(s.start_date, filter.start_date_from, filter.start_date_to))
            .filter(|s| filter.min_rate.is_none_or(|min| s.hourly_rate_cents >= min))
            .filter(|s| filter.max_rate.is_none_or(|max| s.hourly_rate_cents <= max))
            .cloned()
            .collect();

        Ok(sort_and_page(rows, filter.order, page, |s| s.id, |a, b| match filter.sort {
            ShiftSort::CreatedAt => a.created_at.cmp(&b.created_at),
            ShiftSort::StartDate => a.start_date.cmp(&b.start_date),
            ShiftSort::HourlyRate => a.hourly_rate_cents.cmp(&b.hourly_rate_cents),
            ShiftSort::Title => a.title.cmp(&b.title),
            ShiftSort::Status => (a.status as u8).cmp(&(b.status as u8)),
        }))
    }

    async fn update_shift(&self, shift: &Shift) -> AppResult<Shift> {
        let mut store = self.store.lock().await;
        let stored = store.shifts.get_mut(&shift.id).ok_or_else(|| AppError::not_found("Shift"))?;
        // The direct guard only moves through assign_guard/remove_guard.
        let guard_id = stored.guard_id;
        *stored = shift.clone();
        stored.guard_id = guard_id;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_shift(&self, id: Uuid) -> AppResult<bool> {
        let mut store = self.store.lock().await;
        if store.shifts.remove(&id).is_none() {
            return Ok(false);
        }
        store.applications.retain(|_, a| a.shift_id != Some(id));
        store.shift_assignments.retain(|a| a.shift_id != id);
        store.attendance.retain(|_, a| a.shift_id != Some(id));
        for row in store.transactions.iter_mut().filter(|t| t.shift_id == Some(id)) {
            row.shift_id = None;
        }
        Ok(true)
    }

    async fn assign_guard(&self, shift_id: Uuid, guard_id: Uuid) -> AppResult<Shift> {
        let mut store = self.store.lock().await;
        let shift = store.shifts.get_mut(&shift_id).ok_or_else(|| AppError::not_found("Shift"))?;
        if shift.status != ShiftStatus::Open {
            return Err(AppError::validation("Shift is not open for assignment"));
        }
        shift.guard_id = Some(guard_id);
        shift.status = ShiftStatus::Assigned;
        shift.updated_at = Utc::now();
        let shift = shift.clone();

        store.upsert_shift_assignment(shift_id, guard_id, None);
        Ok(shift)
    }

    async fn remove_guard(&self, shift_id: Uuid) -> AppResult<Shift> {
        let mut store = self.store.lock().await;
        let shift = store.shifts.get_mut(&shift_id).ok_or_else(|| AppError::not_found("Shift"))?;
        let guard_id = shift
            .guard_id
            .take()
            .ok_or_else(|| AppError::validation("No guard assigned to this shift"))?;
        shift.status = ShiftStatus::Open;
        shift.updated_at = Utc::now();
        let shift = shift.clone();

        for assignment in store
            .shift_assignments
            .iter_mut()
            .filter(|a| a.shift_id == shift_id && a.guard_id == guard_id)
        {
            assignment.status = AssignmentStatus::Removed;
        }
        Ok(shift)
    }

    async fn shift_assignments(&self, shift_id: Uuid) -> AppResult<Vec<ShiftAssignment>> {
        let store = self.store.lock().await;
        let mut assignments: Vec<_> = store
            .shift_assignments
            .iter()
            .filter(|a| a.shift_id == shift_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.assigned_at);
        Ok(assignments)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryRepository {
    async fn create_application(&self, application: NewApplication) -> AppResult<Application> {
        let (job_id, shift_id, duplicate) = match application.target {
            ApplicationTarget::Job(id) => (Some(id), None, "You have already applied for this job"),
            ApplicationTarget::Shift(id) => (None, Some(id), "You have already applied for this shift"),
        };

        let mut store = self.store.lock().await;
        let exists = store.applications.values().any(|a| {
            a.guard_id == application.guard_id && a.target() == Some(application.target)
        });
        if exists {
            return Err(AppError::Conflict(duplicate.to_string()));
        }

        let created = Application {
            id: Uuid::new_v4(),
            guard_id: application.guard_id,
            job_id,
            shift_id,
            status: ApplicationStatus::Applied,
            bid_rate_cents: application.bid_rate_cents,
            cover_letter: application.cover_letter,
            notes: None,
            applied_at: Utc::now(),
            responded_at: None,
        };
        store.applications.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_application(&self, id: Uuid) -> AppResult<Option<Application>> {
        Ok(self.store.lock().await.applications.get(&id).cloned())
    }

    async fn list_applications(&self, filter: &ApplicationFilter, page: Page) -> AppResult<(Vec<Application>, i64)> {
        let store = self.store.lock().await;
        let rows: Vec<Application> = store
            .applications
            .values()
            .filter(|a| filter.guard_id.is_none_or(|g| a.guard_id == g))
            .filter(|a| filter.job_id.is_none_or(|j| a.job_id == Some(j)))
            .filter(|a| filter.shift_id.is_none_or(|s| a.shift_id == Some(s)))
            .filter(|a| match filter.kind {
                Some(ApplicationKind::Job) => a.job_id.is_some(),
                Some(ApplicationKind::Shift) => a.shift_id.is_some(),
                None => true,
            })
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();

        Ok(sort_and_page(rows, filter.order, page, |a| a.id, |a, b| match filter.sort {
            ApplicationSort::AppliedAt => a.applied_at.cmp(&b.applied_at),
            ApplicationSort::Status => (a.status as u8).cmp(&(b.status as u8)),
            ApplicationSort::BidRate => a.bid_rate_cents.cmp(&b.bid_rate_cents),
        }))
    }

    async fn applications_for_jobs(&self, job_ids: &[Uuid]) -> AppResult<Vec<Application>> {
        let store = self.store.lock().await;
        let mut rows: Vec<_> = store
            .applications
            .values()
            .filter(|a| a.job_id.is_some_and(|j| job_ids.contains(&j)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(rows)
    }

    async fn applications_for_shifts(&self, shift_ids: &[Uuid]) -> AppResult<Vec<Application>> {
        let store = self.store.lock().await;
        let mut rows: Vec<_> = store
            .applications
            .values()
            .filter(|a| a.shift_id.is_some_and(|s| shift_ids.contains(&s)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(rows)
    }

    async fn accept_application(&self, id: Uuid) -> AppResult<AcceptOutcome> {
        let mut store = self.store.lock().await;
        let store = &mut *store;

        let application = store
            .applications
            .get(&id)
            .filter(|a| a.status == ApplicationStatus::Applied)
            .cloned()
            .ok_or_else(|| AppError::validation("Application is not in applied status"))?;
        let target = application
            .target()
            .ok_or_else(|| AppError::Internal(format!("application {id} has no job or shift")))?;

        // Every check runs before the first write, so a refusal leaves the store untouched.
        let hired_guards = match target {
            ApplicationTarget::Job(job_id) => {
                let job = store.jobs.get_mut(&job_id).ok_or_else(|| AppError::not_found("Job"))?;
                let existing = store
                    .job_assignments
                    .iter()
                    .any(|a| a.job_id == job_id && a.guard_id == application.guard_id);
                let mut assigned = store
                    .job_assignments
                    .iter()
                    .filter(|a| a.job_id == job_id && a.status != AssignmentStatus::Removed)
                    .count() as i32;

                if !existing {
                    if assigned >= job.required_guards {
                        return Err(AppError::validation("Job is fully staffed"));
                    }
                    store.job_assignments.push(JobAssignment {
                        id: Uuid::new_v4(),
                        job_id,
                        guard_id: application.guard_id,
                        application_id: Some(application.id),
                        status: AssignmentStatus::Assigned,
                        assigned_at: Utc::now(),
                    });
                    assigned += 1;
                }

                job.hired_guards = job.hired_guards.max(assigned);
                job.status = JobStatus::after_hiring(job.hired_guards, job.required_guards);
                job.updated_at = Utc::now();
                Some(job.hired_guards)
            }
            ApplicationTarget::Shift(shift_id) => {
                let shift = store.shifts.get_mut(&shift_id).ok_or_else(|| AppError::not_found("Shift"))?;
                if shift.status == ShiftStatus::Open {
                    shift.status = ShiftStatus::Assigned;
                    shift.updated_at = Utc::now();
                }
                store.upsert_shift_assignment(shift_id, application.guard_id, Some(application.id));
                None
            }
        };

        let stored = store
            .applications
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Application"))?;
        stored.status = ApplicationStatus::Accepted;
        stored.responded_at = Some(Utc::now());

        Ok(AcceptOutcome {
            application: stored.clone(),
            hired_guards,
        })
    }

    async fn reject_application(&self, id: Uuid, reason: Option<String>) -> AppResult<Application> {
        let mut store = self.store.lock().await;
        let application = store
            .applications
            .get_mut(&id)
            .filter(|a| a.status == ApplicationStatus::Applied)
            .ok_or_else(|| AppError::validation("Application is not in applied status"))?;
        application.status = ApplicationStatus::Rejected;
        application.responded_at = Some(Utc::now());
        if reason.is_some() {
            application.notes = reason;
        }
        Ok(application.clone())
    }

    async fn job_assignment(&self, job_id: Uuid, guard_id: Uuid) -> AppResult<Option<JobAssignment>> {
        let store = self.store.lock().await;
        Ok(store
            .job_assignments
            .iter()
            .find(|a| a.job_id == job_id && a.guard_id == guard_id)
            .cloned())
    }

    async fn shift_assignment(&self, shift_id: Uuid, guard_id: Uuid) -> AppResult<Option<ShiftAssignment>> {
        let store = self.store.lock().await;
        Ok(store
            .shift_assignments
            .iter()
            .find(|a| a.shift_id == shift_id && a.guard_id == guard_id)
            .cloned())
    }
}

#[async_trait]
impl AttendanceRepository for MemoryRepository {
    async fn find_attendance_for_day(
        &self,
        guard_id: Uuid,
        target: AttendanceTarget,
        date: NaiveDate,
    ) -> AppResult<Option<Attendance>> {
        let store = self.store.lock().await;
        Ok(store
            .attendance
            .values()
            .find(|a| a.guard_id == guard_id && a.date == date && a.target() == Some(target))
            .cloned())
    }

    async fn record_check_in(&self, check_in: CheckIn) -> AppResult<Option<Attendance>> {
        let mut store = self.store.lock().await;
        let existing = store.attendance.values_mut().find(|a| {
            a.guard_id == check_in.guard_id && a.date == check_in.date && a.target() == Some(check_in.target)
        });

        if let Some(record) = existing {
            if record.check_in_time.is_some() {
                return Ok(None);
            }
            record.check_in_time = Some(check_in.at);
            record.check_in_latitude = Some(check_in.latitude);
            record.check_in_longitude = Some(check_in.longitude);
            record.status = AttendanceStatus::CheckedIn;
            if check_in.notes.is_some() {
                record.notes = check_in.notes;
            }
            record.updated_at = Utc::now();
            return Ok(Some(record.clone()));
        }

        let (job_id, shift_id) = match check_in.target {
            AttendanceTarget::Job(id) => (Some(id), None),
            AttendanceTarget::Shift(id) => (None, Some(id)),
        };
        let now = Utc::now();
        let record = Attendance {
            id: Uuid::new_v4(),
            guard_id: check_in.guard_id,
            job_id,
            shift_id,
            date: check_in.date,
            check_in_time: Some(check_in.at),
            check_out_time: None,
            check_in_latitude: Some(check_in.latitude),
            check_in_longitude: Some(check_in.longitude),
            check_out_latitude: None,
            check_out_longitude: None,
            hours_worked: None,
            status: AttendanceStatus::CheckedIn,
            notes: check_in.notes,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        store.attendance.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn record_check_out(&self, id: Uuid, check_out: CheckOut) -> AppResult<Option<Attendance>> {
        let mut store = self.store.lock().await;
        let Some(record) = store
            .attendance
            .get_mut(&id)
            .filter(|a| a.check_in_time.is_some() && a.check_out_time.is_none())
        else {
            return Ok(None);
        };
        record.check_out_time = Some(check_out.at);
        record.check_out_latitude = Some(check_out.latitude);
        record.check_out_longitude = Some(check_out.longitude);
        record.hours_worked = Some(check_out.hours_worked);
        record.status = AttendanceStatus::CheckedOut;
        if check_out.notes.is_some() {
            record.notes = check_out.notes;
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn get_attendance(&self, id: Uuid) -> AppResult<Option<Attendance>> {
        Ok(self.store.lock().await.attendance.get(&id).cloned())
    }

    async fn list_attendance(&self, filter: &AttendanceFilter, page: Page) -> AppResult<(Vec<Attendance>, i64)> {
        let store = self.store.lock().await;
        let owned_by = |record: &Attendance, company_id: Uuid| match record.target() {
            Some(AttendanceTarget::Job(id)) => store.jobs.get(&id).is_some_and(|j| j.company_id == company_id),
            Some(AttendanceTarget::Shift(id)) => store.shifts.get(&id).is_some_and(|s| s.company_id == company_id),
            None => false,
        };

        let rows: Vec<Attendance> = store
            .attendance
            .values()
            .filter(|a| filter.guard_id.is_none_or(|g| a.guard_id == g))
            .filter(|a| filter.company_id.is_none_or(|c| owned_by(a, c)))
            .filter(|a| filter.job_id.is_none_or(|j| a.job_id == Some(j)))
            .filter(|a| filter.shift_id.is_none_or(|s| a.shift_id == Some(s)))
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .filter(|a| in_range(a.date, filter.date_from, filter.date_to))
            .cloned()
            .collect();

        Ok(sort_and_page(rows, filter.order, page, |a| a.id, |a, b| match filter.sort {
            AttendanceSort::Date => a.date.cmp(&b.date),
            AttendanceSort::CheckInTime => a.check_in_time.cmp(&b.check_in_time),
            AttendanceSort::Status => (a.status as u8).cmp(&(b.status as u8)),
        }))
    }

    async fn verify_attendance(&self, id: Uuid, verifier: Uuid, notes: Option<String>) -> AppResult<Option<Attendance>> {
        let mut store = self.store.lock().await;
        Ok(store.attendance.get_mut(&id).map(|record| {
            let now = Utc::now();
            record.verified_by = Some(verifier);
            record.verified_at = Some(now);
            if notes.is_some() {
                record.notes = notes;
            }
            record.updated_at = now;
            record.clone()
        }))
    }
}

#[async_trait]
impl WalletRepository for MemoryRepository {
    async fn get_or_create_wallet(&self, user_id: Uuid) -> AppResult<Wallet> {
        let mut store = self.store.lock().await;
        Ok(store.wallet_entry(user_id).clone())
    }

    async fn get_wallet(&self, user_id: Uuid) -> AppResult<Option<Wallet>> {
        Ok(self.store.lock().await.wallets.get(&user_id).cloned())
    }

    async fn list_transactions(&self, filter: &TransactionFilter, page: Page) -> AppResult<(Vec<Transaction>, i64)> {
        let store = self.store.lock().await;
        let rows: Vec<Transaction> = store
            .transactions
            .iter()
            .filter(|t| t.from_user_id == Some(filter.user_id) || t.to_user_id == Some(filter.user_id))
            .filter(|t| filter.kind.is_none_or(|k| t.kind == k))
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| in_range(t.created_at.date_naive(), filter.date_from, filter.date_to))
            .cloned()
            .collect();

        Ok(sort_and_page(rows, filter.order, page, |t| t.id, |a, b| match filter.sort {
            TransactionSort::CreatedAt => a.created_at.cmp(&b.created_at),
            TransactionSort::Amount => a.amount_cents.cmp(&b.amount_cents),
        }))
    }

    async fn get_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        let store = self.store.lock().await;
        Ok(store.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn deposit(&self, user_id: Uuid, amount_cents: i64, description: Option<String>) -> AppResult<WalletMovement> {
        let mut store = self.store.lock().await;
        let wallet = store.wallet_entry(user_id);
        wallet.balance_cents = ledger::credit(wallet.balance_cents, amount_cents)?;
        wallet.last_updated = Utc::now();
        let wallet = wallet.clone();

        let transaction = Transaction {
            to_user_id: Some(user_id),
            description: Some(description.unwrap_or_else(|| "Wallet deposit".to_string())),
            processed_at: Some(Utc::now()),
            ..ledger_row(TransactionType::Deposit, TransactionStatus::Success, amount_cents)
        };
        store.transactions.push(transaction.clone());
        Ok(WalletMovement { wallet, transaction })
    }

    async fn withdraw(&self, user_id: Uuid, amount_cents: i64, description: Option<String>) -> AppResult<WalletMovement> {
        let mut store = self.store.lock().await;
        let wallet = store.wallets.get_mut(&user_id).ok_or_else(|| AppError::not_found("Wallet"))?;
        wallet.balance_cents = ledger::debit(wallet.balance_cents, amount_cents)?;
        wallet.last_updated = Utc::now();
        let wallet = wallet.clone();

        let transaction = Transaction {
            from_user_id: Some(user_id),
            description: Some(description.unwrap_or_else(|| "Wallet withdrawal".to_string())),
            ..ledger_row(TransactionType::Withdrawal, TransactionStatus::Pending, amount_cents)
        };
        store.transactions.push(transaction.clone());
        Ok(WalletMovement { wallet, transaction })
    }

    async fn create_escrow(&self, escrow: NewEscrow) -> AppResult<Transaction> {
        let mut store = self.store.lock().await;
        let payer = store
            .wallets
            .get_mut(&escrow.from_user_id)
            .ok_or_else(|| AppError::not_found("Wallet"))?;
        payer.balance_cents = ledger::debit(payer.balance_cents, escrow.amount_cents)?;
        payer.last_updated = Utc::now();

        let transaction = Transaction {
            from_user_id: Some(escrow.from_user_id),
            to_user_id: Some(escrow.to_user_id),
            job_id: escrow.job_id,
            shift_id: escrow.shift_id,
            description: Some(escrow.description.unwrap_or_else(|| "Escrow payment".to_string())),
            escrow_release_date: Some(escrow.release_date),
            processed_at: Some(Utc::now()),
            ..ledger_row(TransactionType::Escrow, TransactionStatus::Success, escrow.amount_cents)
        };
        store.transactions.push(transaction.clone());
        store.wallet_entry(escrow.to_user_id);
        Ok(transaction)
    }

    async fn release_escrow(&self, escrow_id: Uuid, now: DateTime<Utc>) -> AppResult<ReleaseResponse> {
        let mut store = self.store.lock().await;
        let escrow = store
            .transactions
            .iter()
            .find(|t| t.id == escrow_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Transaction"))?;
        let released = store
            .transactions
            .iter()
            .any(|t| t.kind == TransactionType::Release && t.reference_id == Some(escrow_id));
        ledger::check_releasable(&escrow, released, now)?;

        let recipient = escrow
            .to_user_id
            .ok_or_else(|| AppError::Internal(format!("escrow {escrow_id} has no recipient")))?;
        let wallet = store.wallet_entry(recipient);
        wallet.balance_cents = ledger::credit(wallet.balance_cents, escrow.amount_cents)?;
        wallet.last_updated = now;

        let release = Transaction {
            to_user_id: Some(recipient),
            job_id: escrow.job_id,
            shift_id: escrow.shift_id,
            description: Some("Escrow release".to_string()),
            reference_id: Some(escrow.id),
            processed_at: Some(now),
            ..ledger_row(TransactionType::Release, TransactionStatus::Success, escrow.amount_cents)
        };
        store.transactions.push(release.clone());
        Ok(ReleaseResponse { escrow, release })
    }
}

#[async_trait]
impl AdminRepository for MemoryRepository {
    async fn platform_stats(&self) -> AppResult<PlatformStats> {
        let store = self.store.lock().await;

        let escrow_held_cents = store
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionType::Escrow && t.status == TransactionStatus::Success)
            .filter(|e| {
                !store
                    .transactions
                    .iter()
                    .any(|r| r.kind == TransactionType::Release && r.reference_id == Some(e.id))
            })
            .map(|e| e.amount_cents)
            .sum();

        Ok(PlatformStats {
            total_guards: store.users.values().filter(|u| u.role == Role::Guard).count() as i64,
            total_agencies: store.users.values().filter(|u| u.role == Role::Agency).count() as i64,
            pending_users: store.users.values().filter(|u| u.status == UserStatus::Pending).count() as i64,
            open_jobs: store.jobs.values().filter(|j| j.status.accepts_applications()).count() as i64,
            open_shifts: store.shifts.values().filter(|s| s.status == ShiftStatus::Open).count() as i64,
            escrow_held_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::{Duration, NaiveTime};

    async fn account(repo: &MemoryRepository, email: &str, role: Role) -> User {
        repo.create_account(NewAccount {
            name: "Test Account".into(),
            email: email.into(),
            password_hash: "hash".into(),
            phone: None,
            role,
            status: UserStatus::Active,
        })
        .await
        .unwrap()
    }

    async fn job_for(repo: &MemoryRepository, company_id: Uuid, required_guards: i32) -> Job {
        let new_job = NewJob {
            company_id,
            title: "Gate patrol".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            hourly_rate_cents: 2_000,
            total_hours: 8.0,
            required_guards,
            requirements: vec![],
            special_instructions: None,
            total_budget_cents: 16_000 * i64::from(required_guards),
        };
        repo.create_job(new_job, None).await.unwrap().0
    }

    #[tokio::test]
    async fn registering_opens_wallet_and_profile() {
        let repo = MemoryRepository::new();
        let guard = account(&repo, "g@example.com", Role::Guard).await;
        let agency = account(&repo, "a@example.com", Role::Agency).await;

        assert_eq!(repo.get_wallet(guard.id).await.unwrap().unwrap().balance_cents, 0);
        assert!(repo.get_guard_profile(guard.id).await.unwrap().is_some());
        assert!(repo.get_company_profile(agency.id).await.unwrap().is_some());
        assert!(repo.get_company_profile(guard.id).await.unwrap().is_none());

        let duplicate = repo
            .create_account(NewAccount {
                name: "Again".into(),
                email: "g@example.com".into(),
                password_hash: "hash".into(),
                phone: None,
                role: Role::Guard,
                status: UserStatus::Active,
            })
            .await
            .unwrap_err();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn accept_stops_at_required_guards() {
        let repo = MemoryRepository::new();
        let company = account(&repo, "c@example.com", Role::Agency).await;
        let first = account(&repo, "g1@example.com", Role::Guard).await;
        let second = account(&repo, "g2@example.com", Role::Guard).await;
        let job = job_for(&repo, company.id, 1).await;

        let apply = |guard_id| NewApplication {
            guard_id,
            target: ApplicationTarget::Job(job.id),
            bid_rate_cents: 2_000,
            cover_letter: None,
        };
        let a1 = repo.create_application(apply(first.id)).await.unwrap();
        let a2 = repo.create_application(apply(second.id)).await.unwrap();

        let outcome = repo.accept_application(a1.id).await.unwrap();
        assert_eq!(outcome.hired_guards, Some(1));
        assert_eq!(repo.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Hired);

        let err = repo.accept_application(a2.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Job is fully staffed");
        let untouched = repo.get_application(a2.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, ApplicationStatus::Applied);

        let again = repo.accept_application(a1.id).await.unwrap_err();
        assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn second_application_to_same_job_conflicts() {
        let repo = MemoryRepository::new();
        let company = account(&repo, "c@example.com", Role::Agency).await;
        let guard = account(&repo, "g@example.com", Role::Guard).await;
        let job = job_for(&repo, company.id, 2).await;

        let apply = || NewApplication {
            guard_id: guard.id,
            target: ApplicationTarget::Job(job.id),
            bid_rate_cents: 2_000,
            cover_letter: None,
        };
        repo.create_application(apply()).await.unwrap();
        let err = repo.create_application(apply()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn check_in_happens_once_per_day() {
        let repo = MemoryRepository::new();
        let guard = Uuid::new_v4();
        let check_in = CheckIn {
            guard_id: guard,
            target: AttendanceTarget::Shift(Uuid::new_v4()),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            at: Utc::now(),
            latitude: 51.5,
            longitude: -0.12,
            notes: None,
        };

        let first = repo.record_check_in(check_in.clone()).await.unwrap();
        assert!(first.is_some());
        assert!(repo.record_check_in(check_in).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn escrow_moves_funds_once() {
        let repo = MemoryRepository::new();
        let payer = account(&repo, "c@example.com", Role::Agency).await;
        let payee = account(&repo, "g@example.com", Role::Guard).await;
        repo.deposit(payer.id, 10_000, None).await.unwrap();

        let now = Utc::now();
        let escrow = repo
            .create_escrow(NewEscrow {
                from_user_id: payer.id,
                to_user_id: payee.id,
                amount_cents: 4_000,
                job_id: None,
                shift_id: None,
                description: None,
                release_date: now - Duration::minutes(1),
            })
            .await
            .unwrap();
        assert_eq!(repo.get_wallet(payer.id).await.unwrap().unwrap().balance_cents, 6_000);
        assert_eq!(repo.platform_stats().await.unwrap().escrow_held_cents, 4_000);

        let released = repo.release_escrow(escrow.id, now).await.unwrap();
        assert_eq!(released.release.reference_id, Some(escrow.id));
        assert_eq!(repo.get_wallet(payee.id).await.unwrap().unwrap().balance_cents, 4_000);
        assert_eq!(repo.platform_stats().await.unwrap().escrow_held_cents, 0);

        let err = repo.release_escrow(escrow.id, now).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(repo.get_wallet(payee.id).await.unwrap().unwrap().balance_cents, 4_000);
    }

    #[tokio::test]
    async fn overdraft_leaves_balance_untouched() {
        let repo = MemoryRepository::new();
        let user = account(&repo, "g@example.com", Role::Guard).await;
        repo.deposit(user.id, 500, None).await.unwrap();

        let err = repo.withdraw(user.id, 501, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient balance");
        assert_eq!(repo.get_wallet(user.id).await.unwrap().unwrap().balance_cents, 500);
    }

    /// Recomputes a balance from the ledger: deposits and releases credit the receiver,
    /// withdrawals and escrows debit the sender.
    async fn ledger_balance(repo: &MemoryRepository, user_id: Uuid) -> i64 {
        let filter = TransactionFilter {
            user_id,
            kind: None,
            status: None,
            date_from: None,
            date_to: None,
            sort: TransactionSort::default(),
            order: SortOrder::default(),
        };
        let (rows, _) = repo.list_transactions(&filter, Page::new(Some(1), Some(100))).await.unwrap();
        rows.iter()
            .map(|t| match t.kind {
                TransactionType::Deposit | TransactionType::Release if t.to_user_id == Some(user_id) => t.amount_cents,
                TransactionType::Withdrawal | TransactionType::Escrow if t.from_user_id == Some(user_id) => {
                    -t.amount_cents
                }
                _ => 0,
            })
            .sum()
    }

    #[tokio::test]
    async fn balances_match_ledger_after_mixed_movements() {
        let repo = MemoryRepository::new();
        let company = account(&repo, "c@example.com", Role::Agency).await;
        let guard = account(&repo, "g@example.com", Role::Guard).await;
        let now = Utc::now();

        repo.deposit(company.id, 25_000, None).await.unwrap();
        repo.deposit(guard.id, 1_000, None).await.unwrap();
        repo.withdraw(company.id, 3_000, None).await.unwrap();
        let mut escrows = Vec::new();
        for amount_cents in [7_500, 4_200] {
            let escrow = repo
                .create_escrow(NewEscrow {
                    from_user_id: company.id,
                    to_user_id: guard.id,
                    amount_cents,
                    job_id: None,
                    shift_id: None,
                    description: None,
                    release_date: now - Duration::minutes(1),
                })
                .await
                .unwrap();
            escrows.push(escrow.id);
        }
        repo.release_escrow(escrows[0], now).await.unwrap();
        repo.withdraw(guard.id, 8_000, None).await.unwrap();
        assert!(repo.withdraw(guard.id, 1_000_000, None).await.is_err());
        assert!(repo.release_escrow(escrows[0], now).await.is_err());

        for (user_id, expected) in [(company.id, 10_300), (guard.id, 500)] {
            let wallet = repo.get_wallet(user_id).await.unwrap().unwrap();
            assert_eq!(wallet.balance_cents, expected);
            assert_eq!(ledger_balance(&repo, user_id).await, wallet.balance_cents);
        }
    }
}
