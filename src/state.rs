use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::{
    auth::{guard::Guard, jwt::JwtKeys, password::PasswordHasher, services::AuthService},
    config::AppConfig,
    notify::{LogNotifier, Notifier},
    users::{memory::InMemoryUserStore, repo::PgUserStore, services::UserAdmin, store::UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub guard: Guard,
    pub users: UserAdmin,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("using postgres credential store");
                Arc::new(PgUserStore::new(db))
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(InMemoryUserStore::new())
            }
        };

        Self::from_parts(config, store, Arc::new(LogNotifier))
    }

    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::from(&config.jwt);
        let hasher = PasswordHasher::new(&config.password)?;
        let auth = AuthService::new(
            store.clone(),
            notifier,
            keys.clone(),
            hasher.clone(),
            config.app_base_url.clone(),
        );
        Ok(Self {
            auth: Arc::new(auth),
            guard: Guard::new(keys, store.clone()),
            users: UserAdmin::new(store, hasher),
        })
    }
}

impl FromRef<AppState> for Guard {
    fn from_ref(state: &AppState) -> Self {
        state.guard.clone()
    }
}
