pub mod auth;
pub mod outcome;
pub mod task;
pub mod user;
pub mod weapon;

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Task,
    Weapon,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::User => "User",
            EntityKind::Task => "Task",
            EntityKind::Weapon => "Weapon",
        };
        f.write_str(name)
    }
}
