use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo_types::{NewUser, User, UserChanges},
    store::{StoreError, UserStore},
};

/// Process-local credential store, used when no database is configured.
///
/// Records are kept in insertion order; all writes happen under one lock so
/// the email uniqueness check and the insert are a single step.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            profile: new.profile,
            roles: new.roles,
            is_active: new.is_active,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        changes.apply_to(user);
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let idx = users
            .iter()
            .position(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        Ok(users.remove(idx))
    }
}
