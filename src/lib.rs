use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Identity, configuration and the shared error/response types.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod pagination;

// Business rules that need no I/O.
pub mod domain;
pub mod ledger;

// Data shapes, persistence and HTTP handlers.
pub mod handlers;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler and `ToSchema`
/// payload. Served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::login, handlers::auth::get_profile,
        handlers::auth::update_profile, handlers::auth::change_password, handlers::auth::logout,
        handlers::locations::list_locations, handlers::locations::create_location,
        handlers::locations::get_location, handlers::locations::update_location,
        handlers::locations::delete_location,
        handlers::jobs::create_job, handlers::jobs::list_jobs, handlers::jobs::get_job,
        handlers::jobs::update_job, handlers::jobs::delete_job, handlers::jobs::company_jobs,
        handlers::shifts::create_shift, handlers::shifts::list_shifts, handlers::shifts::get_shift,
        handlers::shifts::update_shift, handlers::shifts::delete_shift,
        handlers::shifts::assign_guard, handlers::shifts::remove_guard,
        handlers::shifts::company_shifts, handlers::shifts::guard_shifts,
        handlers::applications::apply_for_job, handlers::applications::apply_for_shift,
        handlers::applications::job_applications, handlers::applications::shift_applications,
        handlers::applications::accept_application, handlers::applications::reject_application,
        handlers::applications::guard_applications,
        handlers::attendance::check_in, handlers::attendance::check_out,
        handlers::attendance::list_attendance, handlers::attendance::get_attendance,
        handlers::attendance::verify_attendance,
        handlers::wallet::get_wallet, handlers::wallet::list_transactions,
        handlers::wallet::add_funds, handlers::wallet::withdraw,
        handlers::wallet::create_escrow, handlers::wallet::release_escrow,
        handlers::admin::set_user_status, handlers::admin::platform_stats
    ),
    components(
        schemas(
            models::Role, models::UserStatus, models::VerificationStatus, models::User,
            models::UserSummary, models::GuardProfile, models::CompanyProfile,
            models::RegisterRequest, models::LoginRequest, models::UpdateProfileRequest,
            models::ChangePasswordRequest, models::SetUserStatusRequest, models::AuthResponse,
            models::ProfileResponse, models::PlatformStats,
            models::CompanyLocation, models::CreateLocationRequest, models::UpdateLocationRequest,
            models::JobStatus, models::Job, models::JobLocation, models::CreateJobRequest,
            models::UpdateJobRequest, models::JobSort, models::JobListing, models::JobDetail,
            models::DayOfWeek, models::ShiftStatus, models::Shift, models::CreateShiftRequest,
            models::UpdateShiftRequest, models::AssignGuardRequest, models::ShiftSort,
            models::ShiftListing, models::ShiftDetail,
            models::ApplicationStatus, models::AssignmentStatus, models::Application,
            models::JobAssignment, models::ShiftAssignment, models::AcceptOutcome,
            models::ApplyRequest, models::RejectApplicationRequest, models::ApplicationKind,
            models::ApplicationSort, models::ApplicationWithGuard,
            models::AttendanceStatus, models::Attendance, models::CheckInRequest,
            models::VerifyAttendanceRequest, models::AttendanceSort, models::AttendanceView,
            models::TransactionType, models::TransactionStatus, models::Wallet,
            models::Transaction, models::AmountRequest, models::EscrowRequest,
            models::WalletMovement, models::EscrowResponse, models::ReleaseResponse,
            models::TransactionSort,
            pagination::PaginationMeta, pagination::SortOrder,
        )
    ),
    tags(
        (name = "guard-market", description = "Security guard staffing marketplace API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container handed to every handler: the persistence layer and the
/// immutable configuration. Cloning is cheap (an `Arc` and a small struct).
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// The `AuthUser` extractor only needs the repository and the config, so it pulls them
// out of the state individually.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the `AuthUser` extractor in front of every protected route. A failed
/// extraction rejects the request with 401 before the handler is reached.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the public, authenticated and admin routers under `/api`, mounts the
/// Swagger UI and wraps everything in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly
    let api = Router::new()
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Routes: Nested under '/admin', authenticated here and role-checked in
        // the handlers.
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing, spans carry the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request carries its method, uri
/// and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
