// src/middleware/actor.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::{common::error::AppError, config::AppState, models::user::User, services::scoper::Actor};

/// Header naming the sub-admin a request acts as.
pub const SUB_ADMIN_HEADER: &str = "x-sub-admin-id";

/// The resolved sub-admin, placed in the request extensions by
/// [`sub_admin_guard`].
#[derive(Debug, Clone)]
pub struct SubAdminContext(pub User);

impl SubAdminContext {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn actor(&self) -> Actor {
        Actor::SubAdmin(self.0.id.clone())
    }
}

// Guard for every /api/subadmin route
pub async fn sub_admin_guard(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let sub_admin_id = request
        .headers()
        .get(SUB_ADMIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized(format!("The {} header is required", SUB_ADMIN_HEADER)))?;

    let user = app_state.auth_service.resolve_sub_admin(&sub_admin_id).await?;
    tracing::debug!("Acting as sub-admin '{}'", user.id);

    request.extensions_mut().insert(SubAdminContext(user));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for SubAdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SubAdminContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("No sub-admin resolved for this request".to_string()))
    }
}
