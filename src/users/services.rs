use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, Pagination, UpdateUserRequest},
    repo_types::{NewUser, User, UserChanges},
    store::UserStore,
};
use crate::{
    auth::{password::PasswordHasher, roles::default_roles},
    error::{AuthError, Result},
};

const MAX_PAGE: i64 = 100;

/// Administrative user management.
#[derive(Clone)]
pub struct UserAdmin {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
}

impl UserAdmin {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    pub async fn list(&self, page: Pagination) -> Result<Vec<User>> {
        let limit = page.limit.clamp(1, MAX_PAGE);
        Ok(self.store.list(limit, page.offset.max(0)).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(AuthError::user_not_found)
    }

    /// Same defaults as self-registration: role `USER`, not active.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn create(&self, req: CreateUserRequest) -> Result<User> {
        let password_hash = self.hasher.hash_blocking(&req.password).await?;
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
        info!(user_id = %user.id, "user created by admin");
        Ok(user)
    }

    #[instrument(skip(self, req))]
    pub async fn update(&self, id: Uuid, req: UpdateUserRequest) -> Result<User> {
        let password_hash = match &req.password {
            Some(p) => Some(self.hasher.hash_blocking(p).await?),
            None => None,
        };
        let changes = UserChanges {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            date_of_birth: req.date_of_birth,
            sex: req.sex,
            roles: req.roles,
            is_active: req.is_active,
        };
        let user = self.store.update(id, changes).await?;
        info!(user_id = %user.id, "user updated by admin");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<User> {
        let user = self.store.delete(id).await?;
        info!(user_id = %user.id, "user deleted by admin");
        Ok(user)
    }
}
