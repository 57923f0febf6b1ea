use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Role tags a user can hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Doctor => "DOCTOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "DOCTOR" => Ok(Role::Doctor),
            other => anyhow::bail!("unknown role tag {other:?}"),
        }
    }
}

pub type RoleSet = BTreeSet<Role>;

/// Role set given to every newly registered account.
pub fn default_roles() -> RoleSet {
    RoleSet::from([Role::User])
}

/// True when `held` grants at least one of `required`.
pub fn grants_any(held: &RoleSet, required: &[Role]) -> bool {
    required.iter().any(|r| held.contains(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_tags() {
        for role in [Role::User, Role::Admin, Role::Doctor] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_as_uppercase_tags() {
        let roles = RoleSet::from([Role::Admin, Role::User]);
        let json = serde_json::to_string(&roles).unwrap();
        assert_eq!(json, r#"["USER","ADMIN"]"#);
    }

    #[test]
    fn grants_any_needs_an_intersection() {
        let user = default_roles();
        let admin = RoleSet::from([Role::Admin, Role::User]);
        assert!(!grants_any(&user, &[Role::Admin]));
        assert!(grants_any(&admin, &[Role::Admin]));
        assert!(grants_any(&user, &[Role::Admin, Role::User]));
        assert!(!grants_any(&admin, &[]));
    }
}
