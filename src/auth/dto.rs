use serde::{Deserialize, Serialize};

use crate::users::repo_types::{Profile, User};

/// Request body for user registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for the activation and reset link endpoints.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Request body for consuming a reset token.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

/// Response returned after login or logout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub user: User,
    pub activation_link_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
