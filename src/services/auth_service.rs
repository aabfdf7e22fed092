// src/services/auth_service.rs

use bcrypt::{hash, verify};

use crate::{
    common::error::AppError,
    db::SharedStore,
    models::{
        auth::{IdentitySummary, LoginResponse},
        user::{Role, User},
    },
};

/// Hashes off the async runtime; bcrypt is CPU bound.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password, cost))
        .await
        .map_err(|e| anyhow::anyhow!("hashing task failed: {}", e))??;
    Ok(hashed)
}

async fn verify_password(password: &str, hashed: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let hashed = hashed.to_owned();
    let valid = tokio::task::spawn_blocking(move || verify(&password, &hashed))
        .await
        .map_err(|e| anyhow::anyhow!("verification task failed: {}", e))??;
    Ok(valid)
}

#[derive(Clone)]
pub struct AuthService {
    store: SharedStore,
}

impl AuthService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn login(&self, id: &str, password: &str) -> Result<LoginResponse, AppError> {
        let user = self
            .store
            .get_user(id.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let Some(hashed) = user.password_hash.as_deref() else {
            tracing::warn!("🔒 Login for '{}' refused: no password set", user.id);
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(password, hashed).await? {
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!("🔑 '{}' logged in as {:?}", user.id, user.role);
        Ok(LoginResponse {
            message: "Login successful".to_string(),
            user: IdentitySummary::from(&user),
        })
    }

    /// Resolves the acting sub-admin named by a request.
    pub async fn resolve_sub_admin(&self, id: &str) -> Result<User, AppError> {
        match self.store.get_user(id).await? {
            Some(user) if user.role == Role::SubAdmin => Ok(user),
            _ => Err(AppError::Unauthorized(format!("'{}' is not a sub-admin", id))),
        }
    }
}
