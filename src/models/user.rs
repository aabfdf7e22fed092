// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::common::serde_helpers::{double_option, double_option_id, trimmed};
use crate::models::task::TaskSummary;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    SubAdmin,
    Personnel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "duty_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DutyStatus {
    #[default]
    OnDuty,
    OnLeave,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "availability", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Tasked,
    #[default]
    Free,
}

// --- Record ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[schema(example = "U1")]
    pub id: String,
    #[schema(example = "Ravi Kumar")]
    pub name: String,
    pub email: Option<String>,

    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub password_hash: Option<String>,

    pub role: Role,
    #[schema(example = "Constable")]
    pub rank: Option<String>,
    pub service_number: Option<String>,

    pub admin_id: Option<String>,
    pub sub_admin_id: Option<String>,

    // Mirrors Weapon.assignedTo. Only the reconciler writes these.
    pub weapons_assigned: Vec<String>,
    pub status: DutyStatus,
    pub availability: Availability,
    pub current_task_id: Option<String>,

    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_personnel(&self) -> bool {
        self.role == Role::Personnel
    }

    pub fn is_under(&self, sub_admin_id: &str) -> bool {
        self.is_personnel() && self.sub_admin_id.as_deref() == Some(sub_admin_id)
    }

    pub fn holds_weapon(&self, weapon_id: &str) -> bool {
        self.weapons_assigned.iter().any(|w| w == weapon_id)
    }
}

/// Personnel as seen by their sub-admin, with the current task resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonnelView {
    #[serde(flatten)]
    pub user: User,
    pub current_task: Option<TaskSummary>,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "id is required"))]
    #[schema(example = "U1")]
    pub id: String,

    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    #[validate(email(message = "invalid e-mail"))]
    pub email: Option<String>,

    pub password: Option<String>,

    pub role: Role,
    pub rank: Option<String>,
    pub service_number: Option<String>,
    pub admin_id: Option<String>,
    pub sub_admin_id: Option<String>,

    #[serde(default)]
    pub status: Option<DutyStatus>,
}

/// Partial update from the admin user screen. Absent fields are left alone.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: Option<String>,

    #[validate(email(message = "invalid e-mail"))]
    pub email: Option<String>,

    pub password: Option<String>,
    pub role: Option<Role>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub rank: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub service_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option_id")]
    #[schema(value_type = Option<String>)]
    pub admin_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option_id")]
    #[schema(value_type = Option<String>)]
    pub sub_admin_id: Option<Option<String>>,

    // Duty fields are routed through the reconciler.
    #[serde(flatten)]
    pub duty: DutyChange,
}

/// The three linked duty fields. Applied in declaration order:
/// `status`, then `availability`, then `currentTaskId`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DutyChange {
    pub status: Option<DutyStatus>,
    pub availability: Option<Availability>,
    #[serde(default, deserialize_with = "double_option_id")]
    #[schema(value_type = Option<String>)]
    pub current_task_id: Option<Option<String>>,
}

impl DutyChange {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.availability.is_none() && self.current_task_id.is_none()
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersonnelPayload {
    #[serde(flatten)]
    pub duty: DutyChange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(serde_json::to_string(&Role::SubAdmin).unwrap(), r#""sub-admin""#);
        assert_eq!(serde_json::to_string(&DutyStatus::OnLeave).unwrap(), r#""onleave""#);
        assert_eq!(serde_json::to_string(&Availability::Tasked).unwrap(), r#""tasked""#);
    }

    #[test]
    fn duty_change_distinguishes_null_task() {
        let change: DutyChange =
            serde_json::from_str(r#"{"status":"onleave","currentTaskId":null}"#).unwrap();
        assert_eq!(change.status, Some(DutyStatus::OnLeave));
        assert_eq!(change.availability, None);
        assert_eq!(change.current_task_id, Some(None));
    }
}
