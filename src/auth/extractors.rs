use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::{
    guard::{bearer_token, AuthenticatedUser, Guard},
    roles::Role,
};
use crate::error::AuthError;

fn bearer_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned)
}

/// Extracts the bearer token and resolves it to the current user.
pub struct AuthUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Guard: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guard = Guard::from_ref(state);
        let bearer = bearer_from(&parts.headers);
        let user = guard.authenticate(bearer.as_deref()).await?;
        Ok(AuthUser(user))
    }
}

/// Middleware state: the roles a group of routes requires.
#[derive(Clone)]
pub struct RequireRoles {
    guard: Guard,
    roles: &'static [Role],
}

impl RequireRoles {
    pub fn new(guard: Guard, roles: &'static [Role]) -> Self {
        Self { guard, roles }
    }
}

/// Runs the guard before the inner handler; the caller is stored in the
/// request extensions as an [`AuthenticatedUser`].
pub async fn require_roles(
    State(gate): State<RequireRoles>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let bearer = bearer_from(req.headers());
    if let Some(caller) = gate.guard.authorize(bearer.as_deref(), gate.roles).await? {
        req.extensions_mut().insert(caller);
    }
    Ok(next.run(req).await)
}
