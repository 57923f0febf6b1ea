use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    repo_types::{NewUser, Profile, Sex, User, UserChanges},
    store::{StoreError, UserStore},
};
use crate::auth::roles::{Role, RoleSet};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, date_of_birth, \
                            sex, roles, is_active, created_at";

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    date_of_birth: Date,
    sex: String,
    roles: Vec<String>,
    is_active: bool,
    created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> anyhow::Result<Self> {
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<anyhow::Result<RoleSet>>()
            .with_context(|| format!("roles of user {}", row.id))?;
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            profile: Profile {
                first_name: row.first_name,
                last_name: row.last_name,
                date_of_birth: row.date_of_birth,
                sex: Sex::parse(&row.sex)?,
            },
            roles,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

fn role_tags(roles: &RoleSet) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

fn store_err(e: sqlx::Error, what: &'static str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Backend(anyhow::Error::new(e).context(what)),
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, StoreError> {
    row.map(User::try_from).transpose().map_err(StoreError::Backend)
}

/// Credential store backed by the Postgres `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| store_err(e, "find user by id"))?;
        into_user(row)
    }

    /// Find a user by email (exact match).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| store_err(e, "find user by email"))?;
        into_user(row)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .map_err(|e| store_err(e, "list users"))?;
        rows.into_iter()
            .map(|r| User::try_from(r).map_err(StoreError::Backend))
            .collect()
    }

    /// Insert a user; the UNIQUE constraint on `email` decides duplicates.
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users
                (email, password_hash, first_name, last_name, date_of_birth, sex, roles, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.profile.first_name)
        .bind(&new.profile.last_name)
        .bind(new.profile.date_of_birth)
        .bind(new.profile.sex.as_str())
        .bind(role_tags(&new.roles))
        .bind(new.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(|e| store_err(e, "insert user"))?;
        User::try_from(row).map_err(StoreError::Backend)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                email         = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                first_name    = COALESCE($4, first_name),
                last_name     = COALESCE($5, last_name),
                date_of_birth = COALESCE($6, date_of_birth),
                sex           = COALESCE($7, sex),
                roles         = COALESCE($8, roles),
                is_active     = COALESCE($9, is_active)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.date_of_birth)
        .bind(changes.sex.map(|s| s.as_str()))
        .bind(changes.roles.as_ref().map(role_tags))
        .bind(changes.is_active)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| store_err(e, "update user"))?;
        into_user(row)?.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| store_err(e, "delete user"))?;
        into_user(row)?.ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn row(roles: &[&str], sex: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "row@x.com".into(),
            password_hash: "h".into(),
            first_name: "Row".into(),
            last_name: "Person".into(),
            date_of_birth: date!(2000 - 01 - 01),
            sex: sex.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            is_active: true,
            created_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    #[test]
    fn row_converts_roles_into_set() {
        let user = User::try_from(row(&["USER", "ADMIN", "USER"], "MALE")).unwrap();
        assert_eq!(user.roles, RoleSet::from([Role::User, Role::Admin]));
        assert_eq!(user.profile.sex, Sex::Male);
    }

    #[test]
    fn row_with_unknown_role_is_rejected() {
        assert!(User::try_from(row(&["ROOT"], "MALE")).is_err());
        assert!(User::try_from(row(&["USER"], "robot")).is_err());
    }

    #[test]
    fn role_tags_are_sorted_and_unique() {
        let tags = role_tags(&RoleSet::from([Role::Doctor, Role::User]));
        assert_eq!(tags, ["USER", "DOCTOR"]);
    }
}
