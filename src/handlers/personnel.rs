// src/handlers/personnel.rs

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::SubAdminContext,
    models::{
        outcome::Outcome,
        user::{PersonnelView, UpdatePersonnelPayload, User},
    },
};

#[utoipa::path(
    get,
    path = "/api/subadmin/personnel",
    tag = "Sub-admin",
    responses((status = 200, description = "Your personnel with their current task", body = Vec<PersonnelView>)),
    security(("sub_admin_id" = []))
)]
pub async fn my_personnel(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
) -> Result<Json<Vec<PersonnelView>>, AppError> {
    Ok(Json(app_state.personnel_service.my_personnel(sub_admin.id()).await?))
}

#[utoipa::path(
    put,
    path = "/api/subadmin/personnel/{id}/update",
    tag = "Sub-admin",
    request_body = UpdatePersonnelPayload,
    params(("id" = String, Path, description = "Personnel id")),
    responses(
        (status = 200, description = "Duty fields applied and tasks synced", body = Outcome<User>),
        (status = 400, description = "Tasked without a task"),
        (status = 403, description = "Personnel or task outside your command"),
        (status = 404, description = "Personnel or task not found")
    ),
    security(("sub_admin_id" = []))
)]
pub async fn update_personnel(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePersonnelPayload>,
) -> Result<Json<Outcome<User>>, AppError> {
    let outcome = app_state
        .personnel_service
        .update_duty(sub_admin.id(), &id, payload.duty)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    put,
    path = "/api/subadmin/personnel/{id}/clear-task",
    tag = "Sub-admin",
    params(("id" = String, Path, description = "Personnel id")),
    responses(
        (status = 200, description = "Personnel freed", body = Outcome<User>),
        (status = 403, description = "Personnel outside your command"),
        (status = 404, description = "Personnel not found")
    ),
    security(("sub_admin_id" = []))
)]
pub async fn clear_personnel_task(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
    Path(id): Path<String>,
) -> Result<Json<Outcome<User>>, AppError> {
    Ok(Json(app_state.personnel_service.clear_task(sub_admin.id(), &id).await?))
}
