// src/handlers/users.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    db::UserFilter,
    models::{
        outcome::Outcome,
        user::{CreateUserPayload, UpdateUserPayload, User},
    },
};

// ---
// Admin: users
// ---

#[utoipa::path(
    post,
    path = "/api/admin/user",
    tag = "Admin",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "User created", body = Outcome<User>),
        (status = 400, description = "Invalid payload or subAdminId"),
        (status = 409, description = "Duplicate id, email or service number")
    )
)]
pub async fn create_user(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state.user_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/admin/user",
    tag = "Admin",
    responses((status = 200, description = "Every user, oldest first", body = Vec<User>))
)]
pub async fn list_users(State(app_state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = app_state.user_service.list(&UserFilter::default()).await?;
    Ok(Json(users))
}

#[utoipa::path(
    put,
    path = "/api/admin/user/{id}",
    tag = "Admin",
    request_body = UpdateUserPayload,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User updated", body = Outcome<User>),
        (status = 400, description = "Invalid payload or duty combination"),
        (status = 404, description = "User or task not found"),
        (status = 409, description = "Concurrent modification or duplicate value")
    )
)]
pub async fn update_user(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<Outcome<User>>, AppError> {
    payload.validate()?;
    let outcome = app_state.user_service.update(&id, payload).await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    delete,
    path = "/api/admin/user/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted; tasks and weapons released", body = Outcome<User>),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Outcome<User>>, AppError> {
    let outcome = app_state.user_service.delete(&id).await?;
    Ok(Json(outcome))
}

// ---
// Admin: personnel listings
// ---

#[utoipa::path(
    get,
    path = "/api/admin/personnel",
    tag = "Admin",
    responses((status = 200, description = "On-duty personnel", body = Vec<User>))
)]
pub async fn available_personnel(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(app_state.user_service.on_duty_personnel().await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/free",
    tag = "Admin",
    responses((status = 200, description = "On-duty personnel without a task", body = Vec<User>))
)]
pub async fn free_personnel(State(app_state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(app_state.user_service.free_personnel().await?))
}
