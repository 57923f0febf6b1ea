use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub activation_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-memory credential store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    /// Prefix of the activation and reset links sent to users.
    pub app_base_url: String,
}

/// Upper bound for every token TTL: one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

impl JwtConfig {
    /// Rejects TTLs that are not positive or exceed [`MAX_TTL_MINUTES`].
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.secret.is_empty(), "JWT_SECRET must not be empty");
        for (name, ttl) in [
            ("JWT_TTL_MINUTES", self.ttl_minutes),
            ("ACTIVATION_TTL_MINUTES", self.activation_ttl_minutes),
            ("RESET_TTL_MINUTES", self.reset_ttl_minutes),
        ] {
            anyhow::ensure!(
                ttl > 0 && ttl <= MAX_TTL_MINUTES,
                "{name} must be between 1 and {MAX_TTL_MINUTES}, got {ttl}"
            );
        }
        Ok(())
    }
}

/// Unset means `default`; a value that does not parse is an error.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={v:?}: {e}")),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let ttl_minutes = env_or("JWT_TTL_MINUTES", 60)?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "appsick".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "appsick-users".into()),
            ttl_minutes,
            activation_ttl_minutes: env_or("ACTIVATION_TTL_MINUTES", ttl_minutes)?,
            reset_ttl_minutes: env_or("RESET_TTL_MINUTES", 60)?,
        };
        jwt.validate()?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_or("ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: env_or("ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080/api/v1".into())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url,
            jwt,
            password,
            app_base_url,
        })
    }

    /// Configuration used by unit tests: cheap hashing, short-lived tokens.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                activation_ttl_minutes: 5,
                reset_ttl_minutes: 60,
            },
            password: PasswordConfig {
                memory_kib: 256,
                iterations: 1,
                parallelism: 1,
            },
            app_base_url: "http://localhost:8080/api/v1".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        AppConfig::for_tests().jwt.validate().expect("test ttls are in range");
    }

    #[test]
    fn ttl_out_of_range_is_rejected() {
        for bad in [0, -5, MAX_TTL_MINUTES + 1, 5_000_000_000] {
            let mut jwt = AppConfig::for_tests().jwt;
            jwt.ttl_minutes = bad;
            assert!(jwt.validate().is_err(), "session ttl {bad} accepted");

            let mut jwt = AppConfig::for_tests().jwt;
            jwt.reset_ttl_minutes = bad;
            assert!(jwt.validate().is_err(), "reset ttl {bad} accepted");
        }
        let mut jwt = AppConfig::for_tests().jwt;
        jwt.activation_ttl_minutes = MAX_TTL_MINUTES;
        assert!(jwt.validate().is_ok());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut jwt = AppConfig::for_tests().jwt;
        jwt.secret.clear();
        assert!(jwt.validate().is_err());
    }

    #[test]
    fn env_or_reports_unparsable_values() {
        std::env::set_var("APPSICK_TEST_TTL_GARBAGE", "sixty");
        std::env::set_var("APPSICK_TEST_TTL_NUMBER", " 15 ");
        std::env::remove_var("APPSICK_TEST_TTL_UNSET");

        let err = env_or::<i64>("APPSICK_TEST_TTL_GARBAGE", 60).unwrap_err();
        assert!(err.to_string().contains("APPSICK_TEST_TTL_GARBAGE"));
        assert_eq!(env_or::<i64>("APPSICK_TEST_TTL_NUMBER", 60).unwrap(), 15);
        assert_eq!(env_or::<i64>("APPSICK_TEST_TTL_UNSET", 60).unwrap(), 60);
    }
}
