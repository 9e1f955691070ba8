use axum::{extract::State, response::Response};

use crate::{
    AppState,
    auth::{AuthUser, hash_password, issue_token, verify_password},
    domain,
    error::{AppError, AppResult},
    extract::Json,
    models::{
        AuthResponse, ChangePasswordRequest, LoginRequest, NewAccount, ProfileResponse,
        RegisterRequest, Role, UpdateProfileRequest, User, UserStatus,
    },
    pagination::{created, done, ok},
    repository::UserRepository,
};

/// register
///
/// [Public Route] Opens an account. The user row, a zero-balance wallet and the role's
/// profile are written together. Admin accounts start `active`; everyone else starts
/// `pending` until an administrator activates them.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(State(state): State<AppState>, Json(payload): Json<RegisterRequest>) -> AppResult<Response> {
    domain::validate_name(&payload.name)?;
    let email = domain::normalize_email(&payload.email)?;
    domain::validate_password(&payload.password)?;

    let role = payload.role.unwrap_or_default();
    let status = match role {
        Role::Admin => UserStatus::Active,
        Role::Agency | Role::Guard => UserStatus::Pending,
    };

    let user = state
        .repo
        .create_account(NewAccount {
            name: payload.name.trim().to_string(),
            email,
            password_hash: hash_password(&payload.password)?,
            phone: domain::non_empty(payload.phone),
            role,
            status,
        })
        .await?;

    let token = issue_token(user.id, user.role, &state.config)?;
    Ok(created("User registered successfully", AuthResponse { user, token }))
}

/// login
///
/// [Public Route] Exchanges credentials for a token. Unknown emails and wrong passwords
/// get the same answer; suspended and pending accounts are refused with 403.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account suspended or pending")
    )
)]
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> AppResult<Response> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let email = payload.email.trim().to_lowercase();
    let user = state.repo.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !verify_password(&payload.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "failed login attempt");
        return Err(invalid());
    }

    match user.status {
        UserStatus::Active => {}
        UserStatus::Suspended => return Err(AppError::forbidden("Account is suspended")),
        UserStatus::Pending => return Err(AppError::forbidden("Account is pending approval")),
    }

    state.repo.touch_last_login(user.id).await?;
    let token = issue_token(user.id, user.role, &state.config)?;
    Ok(ok("Login successful", AuthResponse { user, token }))
}

async fn load_user(state: &AppState, id: uuid::Uuid) -> AppResult<User> {
    state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// get_profile
///
/// [Authenticated Route] The caller's account plus the profile that matches the role.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Current user", body = ProfileResponse))
)]
pub async fn get_profile(AuthUser { id, role }: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    let user = load_user(&state, id).await?;
    let (guard_profile, company_profile) = match role {
        Role::Guard => (state.repo.get_guard_profile(id).await?, None),
        Role::Agency => (None, state.repo.get_company_profile(id).await?),
        Role::Admin => (None, None),
    };

    Ok(ok(
        "Profile retrieved successfully",
        ProfileResponse {
            user,
            guard_profile,
            company_profile,
        },
    ))
}

/// update_profile
///
/// [Authenticated Route] Changes name and/or phone. Blank values are ignored.
#[utoipa::path(
    put,
    path = "/api/auth/me",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile updated", body = User))
)]
pub async fn update_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Response> {
    let name = domain::non_empty(payload.name);
    if let Some(name) = &name {
        domain::validate_name(name)?;
    }
    let phone = domain::non_empty(payload.phone);

    let user = state.repo.update_user_contact(id, name, phone).await?;
    Ok(ok("Profile updated successfully", user))
}

/// change_password
///
/// [Authenticated Route] Requires the current password.
#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Current password is incorrect")
    )
)]
pub async fn change_password(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Response> {
    domain::validate_password(&payload.new_password)?;
    let user = load_user(&state, id).await?;
    if !verify_password(&payload.current_password, &user.password_hash) {
        return Err(AppError::validation("Current password is incorrect"));
    }

    state
        .repo
        .set_password_hash(id, hash_password(&payload.new_password)?)
        .await?;
    tracing::info!(user_id = %id, "password changed");
    Ok(done("Password changed successfully"))
}

/// logout
///
/// [Authenticated Route] Tokens are stateless; the client discards its copy.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(_user: AuthUser) -> Response {
    done("Logged out successfully")
}
