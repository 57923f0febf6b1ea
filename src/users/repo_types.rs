use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::roles::RoleSet;

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "MALE",
            Sex::Female => "FEMALE",
            Sex::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "MALE" => Ok(Sex::Male),
            "FEMALE" => Ok(Sex::Female),
            "OTHER" => Ok(Sex::Other),
            other => anyhow::bail!("unknown sex {other:?}"),
        }
    }
}

/// Profile attributes supplied at registration or by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "iso_date")]
    pub date_of_birth: Date,
    pub sex: Sex,
}

/// User record held by the credential store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,                    // assigned by the store, immutable
    pub email: String,               // unique, case-sensitive
    #[serde(skip_serializing)]
    pub password_hash: String,       // Argon2 PHC string, not exposed in JSON
    #[serde(flatten)]
    pub profile: Profile,
    pub roles: RoleSet,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for `UserStore::create`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
    pub roles: RoleSet,
    pub is_active: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<Date>,
    pub sex: Option<Sex>,
    pub roles: Option<RoleSet>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    /// Applies the changes to an in-memory record.
    pub fn apply_to(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(first_name) = self.first_name {
            user.profile.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.profile.last_name = last_name;
        }
        if let Some(dob) = self.date_of_birth {
            user.profile.date_of_birth = dob;
        }
        if let Some(sex) = self.sex {
            user.profile.sex = sex;
        }
        if let Some(roles) = self.roles {
            user.roles = roles;
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::default_roles;
    use time::macros::{date, datetime};

    fn sample() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ann@x.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            profile: Profile {
                first_name: "Ann".into(),
                last_name: "Smith".into(),
                date_of_birth: date!(1990 - 06 - 11),
                sex: Sex::Female,
            },
            roles: default_roles(),
            is_active: false,
            created_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    #[test]
    fn json_hides_password_hash() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["firstName"], "Ann");
        assert_eq!(json["dateOfBirth"], "1990-06-11");
        assert_eq!(json["sex"], "FEMALE");
        assert_eq!(json["roles"], serde_json::json!(["USER"]));
        assert_eq!(json["isActive"], false);
    }

    #[test]
    fn apply_changes_touches_only_given_fields() {
        let mut user = sample();
        UserChanges {
            is_active: Some(true),
            last_name: Some("Jones".into()),
            ..Default::default()
        }
        .apply_to(&mut user);
        assert!(user.is_active);
        assert_eq!(user.profile.last_name, "Jones");
        assert_eq!(user.profile.first_name, "Ann");
        assert_eq!(user.email, "ann@x.com");
    }
}
