use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserChanges};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence contract for user records.
///
/// Implementations must enforce email uniqueness atomically in `create` and
/// `update`; callers treat their own existence checks as a fast path only.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<User, StoreError>;
}
