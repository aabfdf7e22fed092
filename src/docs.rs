// src/docs.rs

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,

        // --- Admin: users ---
        handlers::users::create_user,
        handlers::users::list_users,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::available_personnel,
        handlers::users::free_personnel,

        // --- Admin: weapons ---
        handlers::weapons::create_weapon,
        handlers::weapons::list_weapons,
        handlers::weapons::update_weapon,
        handlers::weapons::delete_weapon,

        // --- Admin: tasks ---
        handlers::tasks::admin_create_task,
        handlers::tasks::admin_list_tasks,
        handlers::tasks::admin_update_task,
        handlers::tasks::admin_delete_task,

        // --- Sub-admin ---
        handlers::personnel::my_personnel,
        handlers::personnel::update_personnel,
        handlers::personnel::clear_personnel_task,
        handlers::tasks::create_task,
        handlers::tasks::list_tasks,
        handlers::tasks::update_task,
        handlers::tasks::delete_task,
        handlers::weapons::available_weapons,
        handlers::weapons::assign_weapon,
        handlers::weapons::unassign_weapon,
    ),
    components(
        schemas(
            // --- Records ---
            models::EntityKind,
            models::user::Role,
            models::user::DutyStatus,
            models::user::Availability,
            models::user::User,
            models::user::PersonnelView,
            models::task::TaskStatus,
            models::task::Task,
            models::task::TaskSummary,
            models::weapon::Weapon,
            models::outcome::ConsistencyWarning,

            // --- Payloads ---
            models::auth::LoginPayload,
            models::auth::IdentitySummary,
            models::auth::LoginResponse,
            models::user::CreateUserPayload,
            models::user::UpdateUserPayload,
            models::user::DutyChange,
            models::user::UpdatePersonnelPayload,
            models::task::CreateTaskPayload,
            models::task::UpdateTaskPayload,
            models::weapon::CreateWeaponPayload,
            models::weapon::UpdateWeaponPayload,
            models::weapon::AssignWeaponPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Login"),
        (name = "Admin", description = "Unrestricted management of users, tasks and weapons"),
        (name = "Sub-admin", description = "Operations scoped to the acting sub-admin's personnel")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "sub_admin_id",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-sub-admin-id"))),
        );
    }
}
