// src/models/outcome.rs

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::EntityKind;

/// A compensating write the reconciler could not perform because the related
/// record was missing. The primary write still committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyWarning {
    pub kind: String,
    pub entity: EntityKind,
    pub id: String,
    pub detail: String,
}

impl ConsistencyWarning {
    pub fn missing(entity: EntityKind, id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: "partial-consistency".to_string(),
            entity,
            id: id.into(),
            detail: detail.into(),
        }
    }
}

/// Result of a mutation: the primary record plus any consistency warnings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Outcome<T> {
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConsistencyWarning>,
}

impl<T> Outcome<T> {
    pub fn new(message: impl Into<String>, data: T, warnings: Vec<ConsistencyWarning>) -> Self {
        Self { message: message.into(), data, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
