use serde::Deserialize;
use time::Date;

use super::repo_types::{iso_date, Profile, Sex};
use crate::auth::roles::RoleSet;

/// Body of `POST /users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Body of `PATCH /users/:id`; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub sex: Option<Sex>,
    pub roles: Option<RoleSet>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}
