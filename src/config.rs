// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    db::{MemoryEntityStore, PgEntityStore, SharedStore},
    services::{AuthService, PersonnelService, TaskService, UserService, WeaponService},
};

/// Settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string());
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().context("DB_MAX_CONNECTIONS must be a positive integer")?,
            None => 5,
        };
        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => raw.parse().context("BCRYPT_COST must be an integer between 4 and 31")?,
            None => bcrypt::DEFAULT_COST,
        };

        Ok(Self { bind_addr, database_url, db_max_connections, bcrypt_cost })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub task_service: TaskService,
    pub weapon_service: WeaponService,
    pub personnel_service: PersonnelService,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let store: SharedStore = match &config.database_url {
            Some(database_url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await
                    .context("failed to connect to the database")?;
                tracing::info!("✅ Database connection established");

                let store = PgEntityStore::new(pool);
                store.migrate().await?;
                tracing::info!("✅ Database migrations applied");
                Arc::new(store)
            }
            None => {
                tracing::warn!("⚠️ DATABASE_URL not set; using the in-memory store");
                Arc::new(MemoryEntityStore::new())
            }
        };

        Ok(Self::from_store(store, config.bcrypt_cost))
    }

    /// Wires every service onto one store.
    pub fn from_store(store: SharedStore, bcrypt_cost: u32) -> Self {
        Self {
            auth_service: AuthService::new(store.clone()),
            user_service: UserService::new(store.clone(), bcrypt_cost),
            task_service: TaskService::new(store.clone()),
            weapon_service: WeaponService::new(store.clone()),
            personnel_service: PersonnelService::new(store),
        }
    }
}
