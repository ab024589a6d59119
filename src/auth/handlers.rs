use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{PublicUser, RegisterRequest, TokenRequest, TokenResponse, UpdateMeRequest},
        jwt::{AuthUser, JwtKeys},
        password::hash_password,
        repo_types::UserChanges,
        services::{
            authenticate, check_email, check_name, check_password, create_user, email_taken,
            normalize_email, UserExtra, EMAIL_TAKEN,
        },
    },
    error::{AppError, AppResult, FieldErrors},
    extract::Payload,
    state::AppState,
};

const REQUIRED: &str = "This field is required.";
const INVALID_CREDENTIALS: &str = "Unable to authenticate with provided credentials";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/user/create", post(register))
        .route("/user/token", post(obtain_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/user/me", get(get_me).patch(update_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let mut errors = FieldErrors::new();
    match payload.email.as_deref() {
        Some(email) => check_email(&mut errors, email),
        None => errors.add("email", REQUIRED),
    }
    match payload.name.as_deref() {
        Some(name) => check_name(&mut errors, name),
        None => errors.add("name", REQUIRED),
    }
    match payload.password.as_deref() {
        Some(password) => check_password(&mut errors, password),
        None => errors.add("password", REQUIRED),
    }

    let email = normalize_email(payload.email.as_deref().unwrap_or_default());
    if errors.get("email").is_none() && state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        errors.add("email", EMAIL_TAKEN);
    }
    errors.into_result()?;

    let user = create_user(
        state.users.as_ref(),
        &email,
        payload.password.as_deref().unwrap_or_default(),
        UserExtra {
            name: payload.name.unwrap_or_default().trim().to_string(),
            ..UserExtra::default()
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn obtain_token(
    State(state): State<AppState>,
    Payload(payload): Payload<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let mut errors = FieldErrors::new();
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if email.trim().is_empty() {
        errors.add("email", "This field may not be blank.");
    }
    if password.is_empty() {
        errors.add("password", "This field may not be blank.");
    }
    errors.into_result()?;

    let Some(user) = authenticate(state.users.as_ref(), &email, &password).await? else {
        return Err(AppError::field("non_field_errors", INVALID_CREDENTIALS));
    };

    let token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found."))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(payload): Payload<UpdateMeRequest>,
) -> AppResult<Json<PublicUser>> {
    let current = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found."))?;

    let mut errors = FieldErrors::new();
    let mut changes = UserChanges::default();

    if let Some(email) = payload.email.as_deref() {
        check_email(&mut errors, email);
        let email = normalize_email(email);
        if errors.get("email").is_none() && email != current.email {
            if state.users.find_by_email(&email).await?.is_some() {
                errors.add("email", EMAIL_TAKEN);
            } else {
                changes.email = Some(email);
            }
        }
    }
    if let Some(name) = payload.name.as_deref() {
        check_name(&mut errors, name);
        changes.name = Some(name.trim().to_string());
    }
    if let Some(password) = payload.password.as_deref() {
        check_password(&mut errors, password);
        if errors.get("password").is_none() {
            changes.password_hash = Some(hash_password(password)?);
        }
    }
    errors.into_result()?;

    let user = state
        .users
        .update(user_id, changes)
        .await
        .map_err(email_taken)?
        .ok_or_else(|| AppError::unauthorized("User not found."))?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}
