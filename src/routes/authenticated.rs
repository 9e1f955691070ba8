use crate::{
    AppState,
    handlers::{applications, attendance, auth, jobs, locations, shifts, wallet},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every handler here receives a validated `AuthUser`. Routes that share a path with a
/// public GET (e.g. `/jobs/{id}`) are merged by method in `create_router`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        .route("/auth/me", get(auth::get_profile).put(auth::update_profile))
        .route("/auth/password", put(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        // --- Company Locations (agency/admin, owner-scoped) ---
        .route(
            "/company-locations",
            get(locations::list_locations).post(locations::create_location),
        )
        .route(
            "/company-locations/{id}",
            get(locations::get_location)
                .put(locations::update_location)
                .delete(locations::delete_location),
        )
        // --- Jobs ---
        .route("/jobs", post(jobs::create_job))
        .route("/jobs/{id}", put(jobs::update_job).delete(jobs::delete_job))
        .route("/jobs/company/mine", get(jobs::company_jobs))
        .route("/jobs/{id}/apply", post(applications::apply_for_job))
        .route("/jobs/{id}/applications", get(applications::job_applications))
        // --- Shifts ---
        .route("/shifts", post(shifts::create_shift))
        .route("/shifts/{id}", put(shifts::update_shift).delete(shifts::delete_shift))
        // POST assigns a guard directly, DELETE unassigns.
        .route(
            "/shifts/{id}/assign",
            post(shifts::assign_guard).delete(shifts::remove_guard),
        )
        .route("/shifts/company/mine", get(shifts::company_shifts))
        .route("/shifts/guard/mine", get(shifts::guard_shifts))
        .route("/shifts/{id}/apply", post(applications::apply_for_shift))
        .route("/shifts/{id}/applications", get(applications::shift_applications))
        // --- Applications ---
        .route("/applications/mine", get(applications::guard_applications))
        .route("/applications/{id}/accept", put(applications::accept_application))
        .route("/applications/{id}/reject", put(applications::reject_application))
        // --- Attendance ---
        .route("/attendance", get(attendance::list_attendance))
        .route("/attendance/check-in", post(attendance::check_in))
        .route("/attendance/check-out", post(attendance::check_out))
        .route("/attendance/{id}", get(attendance::get_attendance))
        .route("/attendance/{id}/verify", put(attendance::verify_attendance))
        // --- Wallet ---
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/transactions", get(wallet::list_transactions))
        .route("/wallet/add-funds", post(wallet::add_funds))
        .route("/wallet/withdraw", post(wallet::withdraw))
        .route("/wallet/escrow", post(wallet::create_escrow))
        // Admin-only; checked in the handler.
        .route(
            "/wallet/escrow/{transaction_id}/release",
            post(wallet::release_escrow),
        )
}
