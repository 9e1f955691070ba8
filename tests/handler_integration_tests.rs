use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use guard_market::{
    AppError, AppState,
    auth::AuthUser,
    config::AppConfig,
    extract::{Json, Path, Query},
    handlers::{admin, applications, attendance, auth, jobs, locations, shifts, wallet},
    models::{JobQuery, NewAccount, Role, UserStatus},
    repository::{MemoryRepository, UserRepository, WalletRepository},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

// --- TEST UTILITIES ---

fn create_test_state() -> AppState {
    AppState {
        repo: Arc::new(MemoryRepository::new()),
        config: AppConfig {
            // Escrows become releasable immediately.
            escrow_hold_days: 0,
            ..AppConfig::default()
        },
    }
}

/// Seeds an active account directly through the repository.
async fn seed_user(state: &AppState, name: &str, role: Role) -> AuthUser {
    let user = state
        .repo
        .create_account(NewAccount {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            password_hash: "unused".to_string(),
            phone: None,
            role,
            status: UserStatus::Active,
        })
        .await
        .unwrap();
    AuthUser { id: user.id, role }
}

fn payload<T: DeserializeOwned>(value: Value) -> Json<T> {
    Json(serde_json::from_value(value).unwrap())
}

async fn body_json(response: impl IntoResponse) -> (StatusCode, Value) {
    let response: Response = response.into_response();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (parts.status, serde_json::from_slice(&bytes).unwrap())
}

fn status_of<T>(result: Result<T, AppError>) -> StatusCode {
    match result {
        Ok(_) => panic!("expected the handler to fail"),
        Err(e) => e.status(),
    }
}

fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}

fn job_body() -> Value {
    json!({
        "title": "Night watch",
        "date": "2026-11-02",
        "start_time": "22:00",
        "end_time": "06:00",
        "hourly_rate_cents": 2500,
        "required_guards": 1
    })
}

async fn post_job(state: &AppState, agency: AuthUser, body: Value) -> Uuid {
    let response = jobs::create_job(agency, State(state.clone()), payload(body))
        .await
        .unwrap();
    let (status, json) = body_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    id_of(&json["data"])
}

async fn apply(state: &AppState, guard: AuthUser, job_id: Uuid) -> Uuid {
    let response = applications::apply_for_job(guard, State(state.clone()), Path(job_id), payload(json!({})))
        .await
        .unwrap();
    let (_, json) = body_json(response).await;
    id_of(&json["data"])
}

// --- AUTH ---

#[tokio::test]
async fn register_opens_pending_guard_with_wallet() {
    let state = create_test_state();

    let response = auth::register(
        State(state.clone()),
        payload(json!({
            "name": "Sam Guard",
            "email": "  Sam@Example.com ",
            "password": "hunter22"
        })),
    )
    .await
    .unwrap();
    let (status, json) = body_json(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["user"]["email"], "sam@example.com");
    assert_eq!(json["data"]["user"]["role"], "guard");
    assert_eq!(json["data"]["user"]["status"], "pending");
    assert!(json["data"]["user"].get("password_hash").is_none());
    assert!(!json["data"]["token"].as_str().unwrap().is_empty());

    let user_id = id_of(&json["data"]["user"]);
    let wallet = state.repo.get_wallet(user_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_cents, 0);
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let state = create_test_state();
    let body = json!({"name": "Sam", "email": "sam@example.com", "password": "hunter22"});

    auth::register(State(state.clone()), payload(body.clone())).await.unwrap();
    let result = auth::register(State(state), payload(body)).await;

    assert_eq!(status_of(result), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_respects_password_and_account_status() {
    let state = create_test_state();
    let response = auth::register(
        State(state.clone()),
        payload(json!({"name": "Ada Agency", "email": "ada@example.com", "password": "hunter22", "role": "agency"})),
    )
    .await
    .unwrap();
    let (_, json) = body_json(response).await;
    let user_id = id_of(&json["data"]["user"]);

    let wrong = auth::login(
        State(state.clone()),
        payload(json!({"email": "ada@example.com", "password": "wrong-pass"})),
    )
    .await;
    assert_eq!(status_of(wrong), StatusCode::UNAUTHORIZED);

    let pending = auth::login(
        State(state.clone()),
        payload(json!({"email": "ada@example.com", "password": "hunter22"})),
    )
    .await;
    assert_eq!(status_of(pending), StatusCode::FORBIDDEN);

    state.repo.set_user_status(user_id, UserStatus::Active).await.unwrap();
    let response = auth::login(
        State(state.clone()),
        payload(json!({"email": "ADA@example.com", "password": "hunter22"})),
    )
    .await
    .unwrap();
    let (status, json) = body_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["status"], "active");
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let state = create_test_state();
    let response = auth::register(
        State(state.clone()),
        payload(json!({"name": "Root", "email": "root@example.com", "password": "hunter22", "role": "admin"})),
    )
    .await
    .unwrap();
    let (_, json) = body_json(response).await;
    let admin = AuthUser {
        id: id_of(&json["data"]["user"]),
        role: Role::Admin,
    };

    let wrong = auth::change_password(
        admin,
        State(state.clone()),
        payload(json!({"current_password": "nope-nope", "new_password": "fresh-secret"})),
    )
    .await;
    assert_eq!(status_of(wrong), StatusCode::BAD_REQUEST);

    auth::change_password(
        admin,
        State(state.clone()),
        payload(json!({"current_password": "hunter22", "new_password": "fresh-secret"})),
    )
    .await
    .unwrap();

    let login = auth::login(
        State(state),
        payload(json!({"email": "root@example.com", "password": "fresh-secret"})),
    )
    .await;
    assert!(login.is_ok());
}

// --- LOCATIONS & JOBS ---

#[tokio::test]
async fn location_is_invisible_to_other_agencies() {
    let state = create_test_state();
    let owner = seed_user(&state, "Owner", Role::Agency).await;
    let other = seed_user(&state, "Other", Role::Agency).await;

    let response = locations::create_location(
        owner,
        State(state.clone()),
        payload(json!({"location_name": "Dock 4", "address": "1 Harbour Rd", "latitude": 51.5, "longitude": -0.1})),
    )
    .await
    .unwrap();
    let (status, json) = body_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    let location_id = id_of(&json["data"]);

    let result = locations::get_location(other, State(state.clone()), Path(location_id)).await;
    assert_eq!(status_of(result), StatusCode::NOT_FOUND);

    let guard = seed_user(&state, "Guard", Role::Guard).await;
    let result = locations::list_locations(guard, State(state)).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_job_computes_totals_and_snapshots_location() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let response = locations::create_location(
        agency,
        State(state.clone()),
        payload(json!({"location_name": "Warehouse", "address": "9 Mill Lane"})),
    )
    .await
    .unwrap();
    let (_, json) = body_json(response).await;
    let location_id = id_of(&json["data"]);

    let mut body = job_body();
    body["required_guards"] = json!(2);
    body["company_location_id"] = json!(location_id);
    let response = jobs::create_job(agency, State(state.clone()), payload(body)).await.unwrap();
    let (_, json) = body_json(response).await;

    // 22:00 to 06:00 crosses midnight: 8h x 25.00 x 2 guards.
    assert_eq!(json["data"]["total_hours"], 8.0);
    assert_eq!(json["data"]["total_budget_cents"], 40_000);
    assert_eq!(json["data"]["status"], "open");
    assert_eq!(json["data"]["location"]["location_name"], "Warehouse");
    assert_eq!(json["data"]["location"]["required_guards"], 2);
    assert_eq!(json["data"]["company"]["name"], "Agency");
}

#[tokio::test]
async fn create_job_with_foreign_location_writes_nothing() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let rival = seed_user(&state, "Rival", Role::Agency).await;
    let response = locations::create_location(
        rival,
        State(state.clone()),
        payload(json!({"location_name": "Rival HQ", "address": "2 High St"})),
    )
    .await
    .unwrap();
    let (_, json) = body_json(response).await;

    let mut body = job_body();
    body["company_location_id"] = json["data"]["id"].clone();
    let result = jobs::create_job(agency, State(state.clone()), payload(body)).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let listed = jobs::list_jobs(State(state), Query(JobQuery::default())).await.unwrap();
    let (_, json) = body_json(listed).await;
    assert_eq!(json["pagination"]["totalItems"], 0);
}

#[tokio::test]
async fn guards_cannot_post_jobs_and_strangers_cannot_edit_them() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let rival = seed_user(&state, "Rival", Role::Agency).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;

    let result = jobs::create_job(guard, State(state.clone()), payload(job_body())).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);

    let job_id = post_job(&state, agency, job_body()).await;
    let result = jobs::update_job(rival, State(state.clone()), Path(job_id), payload(json!({"title": "Mine now"}))).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);

    let result = jobs::delete_job(agency, State(state.clone()), Path(Uuid::new_v4())).await;
    assert_eq!(status_of(result), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_job_recomputes_budget_and_locks_when_running() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let job_id = post_job(&state, agency, job_body()).await;

    let response = jobs::update_job(
        agency,
        State(state.clone()),
        Path(job_id),
        payload(json!({"hourly_rate_cents": 3000, "required_guards": 3})),
    )
    .await
    .unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["total_budget_cents"], 72_000);

    jobs::update_job(agency, State(state.clone()), Path(job_id), payload(json!({"status": "in_progress"})))
        .await
        .unwrap();
    let result = jobs::update_job(agency, State(state.clone()), Path(job_id), payload(json!({"title": "Too late"}))).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
    let result = jobs::delete_job(agency, State(state), Path(job_id)).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_jobs_filters_and_paginates() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    for (title, rate) in [("Gate patrol", 1800), ("Night watch", 2500), ("Event crowd control", 3200)] {
        let mut body = job_body();
        body["title"] = json!(title);
        body["hourly_rate_cents"] = json!(rate);
        post_job(&state, agency, body).await;
    }

    let query: JobQuery = serde_json::from_value(json!({"min_rate": 2000, "limit": 1})).unwrap();
    let response = jobs::list_jobs(State(state.clone()), Query(query)).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["pagination"]["totalItems"], 2);
    assert_eq!(json["pagination"]["totalPages"], 2);
    assert_eq!(json["pagination"]["hasNextPage"], true);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let query: JobQuery = serde_json::from_value(json!({"search": "WATCH"})).unwrap();
    let response = jobs::list_jobs(State(state), Query(query)).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"][0]["title"], "Night watch");
}

// --- APPLICATIONS ---

#[tokio::test]
async fn accept_fills_job_and_refuses_extra_guards() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let first = seed_user(&state, "First", Role::Guard).await;
    let second = seed_user(&state, "Second", Role::Guard).await;
    let job_id = post_job(&state, agency, job_body()).await;

    let first_app = apply(&state, first, job_id).await;
    let second_app = apply(&state, second, job_id).await;

    let response = applications::accept_application(agency, State(state.clone()), Path(first_app))
        .await
        .unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["hired_guards"], 1);
    assert_eq!(json["data"]["application"]["status"], "accepted");

    let result = applications::accept_application(agency, State(state.clone()), Path(second_app)).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let response = jobs::get_job(State(state.clone()), Path(job_id)).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["status"], "hired");
    assert_eq!(json["data"]["hired_guards"], 1);
    assert_eq!(json["data"]["applications"].as_array().unwrap().len(), 2);

    // A hired job no longer takes applications.
    let late = seed_user(&state, "Late", Role::Guard).await;
    let result = applications::apply_for_job(late, State(state), Path(job_id), payload(json!({}))).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn application_defaults_bid_and_rejects_duplicates() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;
    let job_id = post_job(&state, agency, job_body()).await;

    let response = applications::apply_for_job(guard, State(state.clone()), Path(job_id), payload(json!({})))
        .await
        .unwrap();
    let (status, json) = body_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["bid_rate_cents"], 2500);

    let again = applications::apply_for_job(guard, State(state.clone()), Path(job_id), payload(json!({}))).await;
    assert_eq!(status_of(again), StatusCode::CONFLICT);

    let result = applications::apply_for_job(agency, State(state), Path(job_id), payload(json!({}))).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_the_owner_processes_applications() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let rival = seed_user(&state, "Rival", Role::Agency).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;
    let job_id = post_job(&state, agency, job_body()).await;
    let application_id = apply(&state, guard, job_id).await;

    let result = applications::reject_application(
        rival,
        State(state.clone()),
        Path(application_id),
        payload(json!({"reason": "no"})),
    )
    .await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);

    let response = applications::reject_application(
        agency,
        State(state.clone()),
        Path(application_id),
        payload(json!({"reason": "Roster is full"})),
    )
    .await
    .unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["status"], "rejected");
    assert_eq!(json["data"]["notes"], "Roster is full");

    let result = applications::accept_application(agency, State(state), Path(application_id)).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
}

// --- SHIFTS ---

fn shift_body() -> Value {
    json!({
        "title": "Lobby desk",
        "location_name": "Tower A",
        "address": "10 Market St",
        "start_time": "18:00",
        "end_time": "02:00",
        "days_of_week": ["monday", "friday", "monday"],
        "hourly_rate_cents": 2200,
        "start_date": "2026-11-01"
    })
}

#[tokio::test]
async fn create_shift_validates_dates_and_dedupes_days() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;

    let mut bad = shift_body();
    bad["end_date"] = json!("2026-10-01");
    let result = shifts::create_shift(agency, State(state.clone()), payload(bad)).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let mut no_address = shift_body();
    no_address["address"] = json!("   ");
    let result = shifts::create_shift(agency, State(state.clone()), payload(no_address)).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let response = shifts::create_shift(agency, State(state), payload(shift_body())).await.unwrap();
    let (status, json) = body_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["days_of_week"], json!(["monday", "friday"]));
    assert_eq!(json["data"]["status"], "open");
}

#[tokio::test]
async fn assign_and_remove_guard_round_trip() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;
    let response = shifts::create_shift(agency, State(state.clone()), payload(shift_body())).await.unwrap();
    let (_, json) = body_json(response).await;
    let shift_id = id_of(&json["data"]);

    // Agencies are not guards.
    let result = shifts::assign_guard(agency, State(state.clone()), Path(shift_id), payload(json!({"guard_id": agency.id}))).await;
    assert_eq!(status_of(result), StatusCode::NOT_FOUND);

    let response = shifts::assign_guard(agency, State(state.clone()), Path(shift_id), payload(json!({"guard_id": guard.id})))
        .await
        .unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["status"], "assigned");
    assert_eq!(json["data"]["guard"]["name"], "Guard");

    let response = shifts::guard_shifts(guard, State(state.clone()), Query(Default::default())).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["pagination"]["totalItems"], 1);

    let response = shifts::remove_guard(agency, State(state.clone()), Path(shift_id)).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["status"], "open");
    assert!(json["data"]["guard_id"].is_null());

    let result = shifts::remove_guard(agency, State(state.clone()), Path(shift_id)).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let response = shifts::guard_shifts(guard, State(state), Query(Default::default())).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["pagination"]["totalItems"], 0);
}

// --- ATTENDANCE ---

#[tokio::test]
async fn check_in_requires_assignment_and_happens_once() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;
    let job_id = post_job(&state, agency, job_body()).await;
    let here = json!({"job_id": job_id, "latitude": 51.5, "longitude": -0.12});

    let result = attendance::check_in(guard, State(state.clone()), payload(json!({"latitude": 1.0, "longitude": 1.0}))).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let result = attendance::check_in(guard, State(state.clone()), payload(here.clone())).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);

    let application_id = apply(&state, guard, job_id).await;
    applications::accept_application(agency, State(state.clone()), Path(application_id))
        .await
        .unwrap();

    let response = attendance::check_in(guard, State(state.clone()), payload(here.clone())).await.unwrap();
    let (status, json) = body_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["status"], "checked_in");
    let attendance_id = id_of(&json["data"]);

    let again = attendance::check_in(guard, State(state.clone()), payload(here.clone())).await;
    assert_eq!(status_of(again), StatusCode::BAD_REQUEST);

    let response = attendance::check_out(guard, State(state.clone()), payload(here.clone())).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["status"], "checked_out");
    assert!(json["data"]["hours_worked"].is_number());

    let again = attendance::check_out(guard, State(state.clone()), payload(here)).await;
    assert_eq!(status_of(again), StatusCode::BAD_REQUEST);

    let response = attendance::verify_attendance(agency, State(state.clone()), Path(attendance_id), payload(json!({})))
        .await
        .unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["verified_by"], json!(agency.id));
    assert_eq!(json["data"]["guard"]["name"], "Guard");
}

#[tokio::test]
async fn attendance_records_are_scoped_by_role() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let rival = seed_user(&state, "Rival", Role::Agency).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;
    let outsider = seed_user(&state, "Outsider", Role::Guard).await;
    let job_id = post_job(&state, agency, job_body()).await;
    let application_id = apply(&state, guard, job_id).await;
    applications::accept_application(agency, State(state.clone()), Path(application_id))
        .await
        .unwrap();
    let response = attendance::check_in(
        guard,
        State(state.clone()),
        payload(json!({"job_id": job_id, "latitude": 0.0, "longitude": 0.0})),
    )
    .await
    .unwrap();
    let (_, json) = body_json(response).await;
    let attendance_id = id_of(&json["data"]);

    for (viewer, expected) in [(guard, 1), (outsider, 0), (agency, 1), (rival, 0)] {
        let response = attendance::list_attendance(viewer, State(state.clone()), Query(Default::default()))
            .await
            .unwrap();
        let (_, json) = body_json(response).await;
        assert_eq!(json["pagination"]["totalItems"], expected);
    }

    let result = attendance::get_attendance(outsider, State(state.clone()), Path(attendance_id)).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);
    let result = attendance::get_attendance(rival, State(state.clone()), Path(attendance_id)).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);
    let result = attendance::verify_attendance(rival, State(state), Path(attendance_id), payload(json!({}))).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);
}

// --- WALLET ---

#[tokio::test]
async fn escrow_is_released_once_by_an_admin() {
    let state = create_test_state();
    let agency = seed_user(&state, "Agency", Role::Agency).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;
    let root = seed_user(&state, "Root", Role::Admin).await;

    let response = wallet::add_funds(agency, State(state.clone()), payload(json!({"amount_cents": 10_000})))
        .await
        .unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["wallet"]["balance_cents"], 10_000);
    assert_eq!(json["data"]["transaction"]["type"], "deposit");

    let result = wallet::create_escrow(
        agency,
        State(state.clone()),
        payload(json!({"to_user_id": agency.id, "amount_cents": 100})),
    )
    .await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let result = wallet::create_escrow(
        agency,
        State(state.clone()),
        payload(json!({"to_user_id": guard.id, "amount_cents": 50_000})),
    )
    .await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    let response = wallet::create_escrow(
        agency,
        State(state.clone()),
        payload(json!({"to_user_id": guard.id, "amount_cents": 4_000})),
    )
    .await
    .unwrap();
    let (status, json) = body_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    let escrow_id = id_of(&json["data"]["transaction"]);

    let result = wallet::release_escrow(agency, State(state.clone()), Path(escrow_id)).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);

    wallet::release_escrow(root, State(state.clone()), Path(escrow_id)).await.unwrap();
    let again = wallet::release_escrow(root, State(state.clone()), Path(escrow_id)).await;
    assert_eq!(status_of(again), StatusCode::CONFLICT);

    let payer = state.repo.get_wallet(agency.id).await.unwrap().unwrap();
    let payee = state.repo.get_wallet(guard.id).await.unwrap().unwrap();
    assert_eq!(payer.balance_cents, 6_000);
    assert_eq!(payee.balance_cents, 4_000);

    let response = wallet::list_transactions(guard, State(state), Query(Default::default())).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["pagination"]["totalItems"], 2);
}

#[tokio::test]
async fn withdraw_rejects_non_positive_and_overdrawn_amounts() {
    let state = create_test_state();
    let guard = seed_user(&state, "Guard", Role::Guard).await;

    let result = wallet::withdraw(guard, State(state.clone()), payload(json!({"amount_cents": 0}))).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
    let result = wallet::withdraw(guard, State(state.clone()), payload(json!({"amount_cents": 1}))).await;
    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);

    wallet::add_funds(guard, State(state.clone()), payload(json!({"amount_cents": 500}))).await.unwrap();
    let response = wallet::withdraw(guard, State(state), payload(json!({"amount_cents": 200}))).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["wallet"]["balance_cents"], 300);
    assert_eq!(json["data"]["transaction"]["status"], "pending");
}

// --- ADMIN ---

#[tokio::test]
async fn admin_activates_accounts_and_reads_stats() {
    let state = create_test_state();
    let root = seed_user(&state, "Root", Role::Admin).await;
    let guard = seed_user(&state, "Guard", Role::Guard).await;

    let result = admin::platform_stats(guard, State(state.clone())).await;
    assert_eq!(status_of(result), StatusCode::FORBIDDEN);

    let response = admin::set_user_status(root, State(state.clone()), Path(guard.id), payload(json!({"status": "suspended"})))
        .await
        .unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["status"], "suspended");

    let result = admin::set_user_status(root, State(state.clone()), Path(Uuid::new_v4()), payload(json!({"status": "active"}))).await;
    assert_eq!(status_of(result), StatusCode::NOT_FOUND);

    let response = admin::platform_stats(root, State(state)).await.unwrap();
    let (_, json) = body_json(response).await;
    assert_eq!(json["data"]["total_guards"], 1);
    assert_eq!(json["data"]["open_jobs"], 0);
}
