use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::RoleSet;
use crate::users::repo_types::User;

/// Version of the claim layout written into every token.
pub const CLAIMS_VERSION: u8 = 1;

/// Purpose of a token. A token only verifies as the kind it was issued for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Session,
    Activation,
    PasswordReset,
}

/// Claims of a bearer session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: Uuid, // user ID
    pub email: String,
    pub roles: RoleSet,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
}

impl From<&User> for SessionClaims {
    fn from(user: &User) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            roles: user.roles.clone(),
            first_name: user.profile.first_name.clone(),
            last_name: user.profile.last_name.clone(),
        }
    }
}

/// Claims of activation and password-reset tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailClaims {
    pub email: String,
}

/// Signed JWT payload: registered claims plus the kind-specific claims.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<C> {
    pub v: u8,          // claim layout version
    pub kind: TokenKind,
    pub iss: String,    // issuer
    pub aud: String,    // audience
    pub iat: i64,       // issued at (unix timestamp)
    pub exp: i64,       // expires at (unix timestamp)
    #[serde(flatten)]
    pub claims: C,
}
