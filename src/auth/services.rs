use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use super::{
    claims::SessionClaims,
    dto::RegisterRequest,
    jwt::JwtKeys,
    password::PasswordHasher,
    roles::default_roles,
};
use crate::{
    error::{AuthError, Result},
    notify::{Notification, Notifier},
    users::{
        repo_types::{NewUser, User, UserChanges},
        store::UserStore,
    },
};

/// Whether the activation link went out during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed,
}

#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub activation: Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    AlreadyActive,
}

impl ActivationOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ActivationOutcome::Activated => "Account activated",
            ActivationOutcome::AlreadyActive => "Account already activated",
        }
    }
}

/// Account lifecycle: registration, login, activation and password reset.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    keys: JwtKeys,
    hasher: PasswordHasher,
    base_url: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        keys: JwtKeys,
        hasher: PasswordHasher,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            keys,
            hasher,
            base_url: base_url.into(),
        }
    }

    async fn user_by_email(&self, email: &str) -> Result<User> {
        self.store
            .find_by_email(email)
            .await?
            .ok_or_else(AuthError::user_not_found)
    }

    /// Creates an inactive `USER` account and sends its activation link.
    ///
    /// A failed delivery does not undo the account; it is reported in the
    /// returned [`Registration`] and the link can be requested again.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<Registration> {
        if self.store.find_by_email(&req.email).await?.is_some() {
            warn!("email already registered");
            return Err(AuthError::Conflict("User already exists".into()));
        }
        if req.password != req.password_confirmation {
            warn!("password confirmation mismatch");
            return Err(AuthError::unauthorized("Passwords do not match"));
        }

        let password_hash = self.hasher.hash_blocking(&req.password).await?;
        // The store's unique constraint settles concurrent registrations.
        let user = self
            .store
            .create(NewUser {
                email: req.email,
                password_hash,
                profile: req.profile,
                roles: default_roles(),
                is_active: false,
            })
            .await?;
        info!(user_id = %user.id, "user registered");

        let activation = match self.deliver_activation(&user).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "activation link not delivered");
                Delivery::Failed
            }
        };
        Ok(Registration { user, activation })
    }

    /// Verifies credentials of an active account and issues a session token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let Some(user) = self.store.find_by_email(email).await? else {
            warn!("login unknown email");
            return Err(AuthError::user_not_found());
        };

        if !self.hasher.verify_blocking(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::unauthorized("Invalid credentials"));
        }
        if !user.is_active {
            warn!(user_id = %user.id, "login on inactive account");
            return Err(AuthError::unauthorized("Activate your account first."));
        }

        let token = self.keys.issue_session(&SessionClaims::from(&user))?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    #[instrument(skip(self))]
    pub async fn send_activation_link(&self, email: &str) -> Result<()> {
        let user = self.user_by_email(email).await?;
        if user.is_active {
            return Err(AuthError::unauthorized("Account already activated"));
        }
        self.deliver_activation(&user).await
    }

    async fn deliver_activation(&self, user: &User) -> Result<()> {
        let token = self.keys.issue_activation(&user.email)?;
        let link = format!("{}/auth/activate/{}", self.base_url, token);
        self.notifier
            .send(Notification::activation(&user.email, &link))
            .await
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "activation notification failed");
                AuthError::Internal(e.context("deliver activation link"))
            })
    }

    /// Marks the account behind an activation token active. Idempotent.
    #[instrument(skip(self, token))]
    pub async fn activate_account(&self, token: &str) -> Result<ActivationOutcome> {
        let claims = self.keys.verify_activation(token).map_err(log_token_failure)?;
        let user = self.user_by_email(&claims.email).await?;
        if user.is_active {
            info!(user_id = %user.id, "account already active");
            return Ok(ActivationOutcome::AlreadyActive);
        }

        let changes = UserChanges {
            is_active: Some(true),
            ..Default::default()
        };
        self.store.update(user.id, changes).await?;
        info!(user_id = %user.id, "account activated");
        Ok(ActivationOutcome::Activated)
    }

    #[instrument(skip(self))]
    pub async fn send_password_reset_link(&self, email: &str) -> Result<()> {
        let user = self.user_by_email(email).await?;
        let token = self.keys.issue_reset(&user.email)?;
        let link = format!("{}/auth/reset-password/{}", self.base_url, token);
        self.notifier
            .send(Notification::password_reset(&user.email, &link))
            .await
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "reset notification failed");
                AuthError::Internal(e.context("deliver reset link"))
            })?;
        info!(user_id = %user.id, "password reset link sent");
        Ok(())
    }

    /// Replaces the password hash of the account behind a reset token.
    /// Activation state is left as it is.
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let claims = self.keys.verify_reset(token).map_err(log_token_failure)?;
        let user = self.user_by_email(&claims.email).await?;
        let password_hash = self.hasher.hash_blocking(new_password).await?;
        let changes = UserChanges {
            password_hash: Some(password_hash),
            ..Default::default()
        };
        self.store.update(user.id, changes).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }
}

/// Logs which token failure happened; callers only ever see one message.
pub(crate) fn log_token_failure(e: AuthError) -> AuthError {
    match &e {
        AuthError::Expired => warn!("token expired"),
        AuthError::InvalidToken => warn!("token invalid"),
        _ => {}
    }
    e
}
