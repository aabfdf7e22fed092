// src/models/task.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::common::serde_helpers::{double_option, trimmed};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[schema(example = "T1")]
    pub id: String,
    #[schema(example = "Perimeter patrol")]
    pub title: String,
    pub description: Option<String>,

    // Creator: a sub-admin or admin user id
    pub assigned_by: String,
    pub assigned_to: Vec<String>,

    pub status: TaskStatus,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.assigned_to.iter().any(|u| u == user_id)
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
        }
    }
}

/// Task detail embedded in personnel listings.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: TaskStatus,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_window"))]
pub struct CreateTaskPayload {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "id is required"))]
    #[schema(example = "T1")]
    pub id: String,

    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub description: Option<String>,

    // Required for admins; sub-admins always create as themselves.
    pub assigned_by: Option<String>,
    #[serde(default)]
    pub assigned_to: Vec<String>,

    pub status: Option<TaskStatus>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_update_window"))]
pub struct UpdateTaskPayload {
    #[validate(length(min = 1, message = "title cannot be empty"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    pub assigned_by: Option<String>,
    pub assigned_to: Option<Vec<String>>,

    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub end_time: Option<Option<DateTime<Utc>>>,
}

fn check_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            let mut err = ValidationError::new("time_range");
            err.message = Some("endTime must not be before startTime".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

fn validate_create_window(payload: &CreateTaskPayload) -> Result<(), ValidationError> {
    check_window(payload.start_time, payload.end_time)
}

// Only checks the window when both ends arrive together; the merged
// record is checked again by the task service.
fn validate_update_window(payload: &UpdateTaskPayload) -> Result<(), ValidationError> {
    check_window(payload.start_time.flatten(), payload.end_time.flatten())
}

/// Rejects a stored or merged task whose window is inverted.
pub fn ensure_window(task: &Task) -> Result<(), ValidationError> {
    check_window(task.start_time, task.end_time)
}
