use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, EmailRequest, LoginRequest, MessageResponse, PasswordRequest,
            RegisterRequest, RegisterResponse,
        },
        extractors::AuthUser,
        services::Delivery,
    },
    error::{AuthError, Result},
    state::AppState,
    users::repo_types::{Profile, User},
};

const MIN_PASSWORD_LEN: usize = 8;
const MIN_NAME_LEN: usize = 3;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn check_email(email: &str) -> Result<()> {
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::BadRequest("Invalid email".into()));
    }
    Ok(())
}

pub(crate) fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::BadRequest("Password too short".into()));
    }
    Ok(())
}

pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(AuthError::BadRequest("Name too short".into()));
    }
    Ok(())
}

pub(crate) fn check_profile(profile: &Profile) -> Result<()> {
    check_name(&profile.first_name)?;
    check_name(&profile.last_name)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/current", get(current))
        .route("/auth/send-activation-link", post(send_activation_link))
        .route("/auth/activate/:token", get(activate))
        .route("/auth/send-reset-password-link", post(send_reset_password_link))
        .route("/auth/reset-password/:token", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    payload.email = payload.email.trim().to_string();
    check_email(&payload.email)?;
    check_password(&payload.password)?;
    check_profile(&payload.profile)?;

    let reg = state.auth.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: reg.user,
            activation_link_sent: reg.activation == Delivery::Sent,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let email = payload.email.trim();
    check_email(email)?;
    let token = state.auth.login(email, &payload.password).await?;
    Ok(Json(AuthResponse {
        access_token: Some(token),
    }))
}

/// Tokens are stateless, so logging out only tells the client to drop its copy.
pub async fn logout() -> Json<AuthResponse> {
    Json(AuthResponse { access_token: None })
}

#[instrument(skip_all)]
pub async fn current(AuthUser(caller): AuthUser) -> Json<User> {
    Json(caller.0)
}

#[instrument(skip(state, payload))]
pub async fn send_activation_link(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<StatusCode> {
    let email = payload.email.trim();
    check_email(email)?;
    state.auth.send_activation_link(email).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>> {
    let outcome = state.auth.activate_account(&token).await?;
    Ok(Json(MessageResponse {
        message: outcome.message(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn send_reset_password_link(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<StatusCode> {
    let email = payload.email.trim();
    check_email(email)?;
    state.auth.send_password_reset_link(email).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<PasswordRequest>,
) -> Result<Json<MessageResponse>> {
    check_password(&payload.password)?;
    state.auth.reset_password(&token, &payload.password).await?;
    Ok(Json(MessageResponse {
        message: "Password updated",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("bob@x.com"));
        assert!(!is_valid_email("bob@x"));
        assert!(!is_valid_email("bob x@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(check_password("pw12345678").is_ok());
        assert!(check_password("short").is_err());
        assert!(check_password("ąęółśżźć").is_ok());
    }
}
