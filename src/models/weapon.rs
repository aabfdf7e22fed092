// src/models/weapon.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::common::serde_helpers::{double_option, double_option_id, trimmed};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    #[schema(example = "W1")]
    pub id: String,
    #[schema(example = "INSAS")]
    pub name: String,
    #[serde(rename = "type")]
    #[schema(example = "Rifle")]
    pub weapon_type: String,
    pub description: Option<String>,

    // Holder's user id. Mirrored by User.weaponsAssigned.
    pub assigned_to: Option<String>,
    pub is_operational: bool,
    pub added_by: Option<String>,

    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Weapon {
    pub fn is_held_by(&self, user_id: &str) -> bool {
        self.assigned_to.as_deref() == Some(user_id)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWeaponPayload {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "id is required"))]
    #[schema(example = "W1")]
    pub id: String,

    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub weapon_type: String,
    pub description: Option<String>,

    pub assigned_to: Option<String>,
    pub is_operational: Option<bool>,
    pub added_by: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWeaponPayload {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: Option<String>,

    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type cannot be empty"))]
    pub weapon_type: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    // Absent: keep the holder. null or "": unassign.
    #[serde(default, deserialize_with = "double_option_id")]
    #[schema(value_type = Option<String>)]
    pub assigned_to: Option<Option<String>>,

    pub is_operational: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub added_by: Option<Option<String>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignWeaponPayload {
    #[validate(length(min = 1, message = "personnelId is required"))]
    pub personnel_id: String,
}
