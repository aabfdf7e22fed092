// src/handlers/tasks.rs

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
    middleware::actor::SubAdminContext,
    models::{
        outcome::Outcome,
        task::{CreateTaskPayload, Task, UpdateTaskPayload},
    },
    services::scoper::Actor,
};

// =============================================================================
//  ADMIN
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/admin/task",
    tag = "Admin",
    request_body = CreateTaskPayload,
    responses(
        (status = 201, description = "Task created and members tasked", body = Outcome<Task>),
        (status = 400, description = "Invalid payload or assignees"),
        (status = 409, description = "Duplicate id or concurrent modification")
    )
)]
pub async fn admin_create_task(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state.task_service.create(&Actor::Admin, payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/admin/task",
    tag = "Admin",
    responses((status = 200, description = "Every task, newest first", body = Vec<Task>))
)]
pub async fn admin_list_tasks(State(app_state): State<AppState>) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(app_state.task_service.list(&Actor::Admin).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/task/{id}",
    tag = "Admin",
    request_body = UpdateTaskPayload,
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task updated", body = Outcome<Task>),
        (status = 400, description = "Invalid payload or assignees"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn admin_update_task(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<Outcome<Task>>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.task_service.update(&Actor::Admin, &id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/task/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted and members freed", body = Outcome<Task>),
        (status = 404, description = "Task not found")
    )
)]
pub async fn admin_delete_task(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Outcome<Task>>, AppError> {
    Ok(Json(app_state.task_service.delete(&Actor::Admin, &id).await?))
}

// =============================================================================
//  SUB-ADMIN
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/subadmin/task",
    tag = "Sub-admin",
    request_body = CreateTaskPayload,
    responses(
        (status = 201, description = "Task created", body = Outcome<Task>),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Assignees outside your command")
    ),
    security(("sub_admin_id" = []))
)]
pub async fn create_task(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state.task_service.create(&sub_admin.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/subadmin/tasks",
    tag = "Sub-admin",
    responses((status = 200, description = "Tasks you created, newest first", body = Vec<Task>)),
    security(("sub_admin_id" = []))
)]
pub async fn list_tasks(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(app_state.task_service.list(&sub_admin.actor()).await?))
}

#[utoipa::path(
    put,
    path = "/api/subadmin/task/{id}",
    tag = "Sub-admin",
    request_body = UpdateTaskPayload,
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task updated", body = Outcome<Task>),
        (status = 403, description = "Not your task, or assignees outside your command"),
        (status = 404, description = "Task not found")
    ),
    security(("sub_admin_id" = []))
)]
pub async fn update_task(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<Outcome<Task>>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.task_service.update(&sub_admin.actor(), &id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/subadmin/task/{id}",
    tag = "Sub-admin",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted", body = Outcome<Task>),
        (status = 403, description = "Not your task"),
        (status = 404, description = "Task not found")
    ),
    security(("sub_admin_id" = []))
)]
pub async fn delete_task(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
    Path(id): Path<String>,
) -> Result<Json<Outcome<Task>>, AppError> {
    Ok(Json(app_state.task_service.delete(&sub_admin.actor(), &id).await?))
}
