use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    jwt::JwtKeys,
    roles::{grants_any, Role},
    services::log_token_failure,
};
use crate::{
    error::{AuthError, Result},
    users::{repo_types::User, store::UserStore},
};

/// A caller whose session token verified and whose account was re-read from
/// the store for this request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Access-control decision for protected operations.
///
/// Roles are taken from the freshly loaded user, not from the token, so role
/// changes and deactivation apply before the token expires.
#[derive(Clone)]
pub struct Guard {
    keys: JwtKeys,
    store: Arc<dyn UserStore>,
}

impl Guard {
    pub fn new(keys: JwtKeys, store: Arc<dyn UserStore>) -> Self {
        Self { keys, store }
    }

    /// Resolves a bearer token to its current, active user.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<AuthenticatedUser> {
        let token = bearer.ok_or_else(|| AuthError::unauthorized("Missing bearer token"))?;
        let claims = self.keys.verify_session(token).map_err(log_token_failure)?;

        let Some(user) = self.store.find_by_id(claims.sub).await? else {
            warn!(user_id = %claims.sub, "token subject no longer exists");
            return Err(AuthError::unauthorized("Invalid credentials"));
        };
        if !user.is_active {
            warn!(user_id = %user.id, "token subject is deactivated");
            return Err(AuthError::unauthorized("Account is not active"));
        }
        Ok(AuthenticatedUser(user))
    }

    /// Allows an operation declaring `required` roles.
    ///
    /// Returns `None` when the operation declares no roles (no token needed),
    /// otherwise the caller, provided it holds at least one required role.
    pub async fn authorize(
        &self,
        bearer: Option<&str>,
        required: &[Role],
    ) -> Result<Option<AuthenticatedUser>> {
        if required.is_empty() {
            return Ok(None);
        }
        let caller = self.authenticate(bearer).await?;
        if !grants_any(&caller.0.roles, required) {
            warn!(user_id = %caller.0.id, ?required, "insufficient role");
            return Err(AuthError::unauthorized("Insufficient role"));
        }
        debug!(user_id = %caller.0.id, ?required, "access granted");
        Ok(Some(caller))
    }
}

/// Token part of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        auth::{
            claims::{SessionClaims, TokenKind},
            roles::RoleSet,
            services::tests::{active_user, harness, register_request, Harness},
        },
        users::repo_types::UserChanges,
    };

    fn guard(h: &Harness) -> Guard {
        Guard::new(h.keys.clone(), h.store.clone())
    }

    async fn session_for(h: &Harness, email: &str) -> String {
        h.service.login(email, "pw12345678").await.unwrap()
    }

    async fn set_roles(h: &Harness, user: &User, roles: RoleSet) {
        let changes = UserChanges {
            roles: Some(roles),
            ..Default::default()
        };
        h.store.update(user.id, changes).await.unwrap();
    }

    #[tokio::test]
    async fn no_required_roles_allows_anonymous() {
        let h = harness();
        assert!(guard(&h).authorize(None, &[]).await.unwrap().is_none());
        assert!(guard(&h).authorize(Some("junk"), &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_denied() {
        let h = harness();
        let g = guard(&h);
        assert!(matches!(
            g.authorize(None, &[Role::Admin]).await.unwrap_err(),
            AuthError::Unauthorized(_)
        ));
        assert!(matches!(
            g.authorize(Some("junk"), &[Role::Admin]).await.unwrap_err(),
            AuthError::InvalidToken
        ));
    }

    #[tokio::test]
    async fn expired_token_is_denied_as_expired() {
        let h = harness();
        let user = active_user(&h, "bob@x.com", "pw12345678").await;
        let token = h
            .keys
            .issue(TokenKind::Session, &SessionClaims::from(&user), Duration::ZERO)
            .unwrap();
        let err = guard(&h).authorize(Some(&token), &[Role::User]).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn role_gating() {
        let h = harness();
        let user = active_user(&h, "bob@x.com", "pw12345678").await;
        let g = guard(&h);

        let token = session_for(&h, "bob@x.com").await;
        assert!(matches!(
            g.authorize(Some(&token), &[Role::Admin]).await.unwrap_err(),
            AuthError::Unauthorized(_)
        ));

        set_roles(&h, &user, RoleSet::from([Role::Admin, Role::User])).await;
        let token = session_for(&h, "bob@x.com").await;
        let caller = g.authorize(Some(&token), &[Role::Admin]).await.unwrap().unwrap();
        assert_eq!(caller.0.id, user.id);
    }

    #[tokio::test]
    async fn roles_are_re_resolved_from_the_store() {
        let h = harness();
        let user = active_user(&h, "bob@x.com", "pw12345678").await;
        let g = guard(&h);
        let token = session_for(&h, "bob@x.com").await;

        // promotion applies to an already issued token
        set_roles(&h, &user, RoleSet::from([Role::Admin])).await;
        assert!(g.authorize(Some(&token), &[Role::Admin]).await.is_ok());

        // and so does demotion
        set_roles(&h, &user, RoleSet::from([Role::User])).await;
        assert!(g.authorize(Some(&token), &[Role::Admin]).await.is_err());
    }

    #[tokio::test]
    async fn deactivated_or_deleted_subject_is_denied() {
        let h = harness();
        let user = active_user(&h, "bob@x.com", "pw12345678").await;
        let g = guard(&h);
        let token = session_for(&h, "bob@x.com").await;

        let changes = UserChanges {
            is_active: Some(false),
            ..Default::default()
        };
        h.store.update(user.id, changes).await.unwrap();
        assert!(matches!(
            g.authenticate(Some(&token)).await.unwrap_err(),
            AuthError::Unauthorized(_)
        ));

        h.store.delete(user.id).await.unwrap();
        assert!(matches!(
            g.authenticate(Some(&token)).await.unwrap_err(),
            AuthError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn lifecycle_tokens_are_not_bearer_tokens() {
        let h = harness();
        h.service
            .register(register_request("bob@x.com", "pw12345678"))
            .await
            .unwrap();
        let activation = h.notifier.last_token_for("bob@x.com").unwrap();
        let err = guard(&h).authenticate(Some(&activation)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
