// src/handlers/weapons.rs

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
        weapon::{AssignWeaponPayload, CreateWeaponPayload, UpdateWeaponPayload, Weapon},
    },
};

// ---
// Admin
// ---

#[utoipa::path(
    post,
    path = "/api/admin/weapon",
    tag = "Admin",
    request_body = CreateWeaponPayload,
    responses(
        (status = 201, description = "Weapon added", body = Outcome<Weapon>),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Duplicate id")
    )
)]
pub async fn create_weapon(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateWeaponPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state.weapon_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/admin/weapon",
    tag = "Admin",
    responses((status = 200, description = "Every weapon", body = Vec<Weapon>))
)]
pub async fn list_weapons(State(app_state): State<AppState>) -> Result<Json<Vec<Weapon>>, AppError> {
    Ok(Json(app_state.weapon_service.list().await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/weapon/{id}",
    tag = "Admin",
    request_body = UpdateWeaponPayload,
    params(("id" = String, Path, description = "Weapon id")),
    responses(
        (status = 200, description = "Weapon updated; holders reconciled", body = Outcome<Weapon>),
        (status = 404, description = "Weapon not found")
    )
)]
pub async fn update_weapon(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateWeaponPayload>,
) -> Result<Json<Outcome<Weapon>>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.weapon_service.update(&id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/weapon/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Weapon id")),
    responses(
        (status = 200, description = "Weapon deleted", body = Outcome<Weapon>),
        (status = 404, description = "Weapon not found")
    )
)]
pub async fn delete_weapon(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Outcome<Weapon>>, AppError> {
    Ok(Json(app_state.weapon_service.delete(&id).await?))
}

// ---
// Sub-admin
// ---

#[utoipa::path(
    get,
    path = "/api/subadmin/weapon/available",
    tag = "Sub-admin",
    responses((status = 200, description = "Unassigned weapons and those held by your personnel", body = Vec<Weapon>)),
    security(("sub_admin_id" = []))
)]
pub async fn available_weapons(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
) -> Result<Json<Vec<Weapon>>, AppError> {
    Ok(Json(app_state.weapon_service.available_for(sub_admin.id()).await?))
}

#[utoipa::path(
    post,
    path = "/api/subadmin/weapon/{id}/assign",
    tag = "Sub-admin",
    request_body = AssignWeaponPayload,
    params(("id" = String, Path, description = "Weapon id")),
    responses(
        (status = 200, description = "Weapon assigned", body = Outcome<Weapon>),
        (status = 403, description = "Weapon or personnel outside your command"),
        (status = 404, description = "Weapon or personnel not found")
    ),
    security(("sub_admin_id" = []))
)]
pub async fn assign_weapon(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
    Path(id): Path<String>,
    Json(payload): Json<AssignWeaponPayload>,
) -> Result<Json<Outcome<Weapon>>, AppError> {
    payload.validate()?;
    let outcome = app_state
        .weapon_service
        .assign(sub_admin.id(), &id, payload.personnel_id.trim())
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    put,
    path = "/api/subadmin/weapon/{id}/unassign",
    tag = "Sub-admin",
    params(("id" = String, Path, description = "Weapon id")),
    responses(
        (status = 200, description = "Weapon unassigned", body = Outcome<Weapon>),
        (status = 403, description = "Weapon held outside your command"),
        (status = 404, description = "Weapon not found")
    ),
    security(("sub_admin_id" = []))
)]
pub async fn unassign_weapon(
    State(app_state): State<AppState>,
    sub_admin: SubAdminContext,
    Path(id): Path<String>,
) -> Result<Json<Outcome<Weapon>>, AppError> {
    Ok(Json(app_state.weapon_service.unassign(sub_admin.id(), &id).await?))
}
