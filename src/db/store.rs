// src/db/store.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::error::AppError,
    models::{
        task::Task,
        user::{Availability, DutyStatus, Role, User},
        weapon::Weapon,
        EntityKind,
    },
};

pub type SharedStore = Arc<dyn EntityStore>;

/// Persistence for the three collections. Every record is addressed by its
/// domain id. Writes only happen through [`EntityStore::commit`].
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;
    async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError>;
    async fn get_weapon(&self, id: &str) -> Result<Option<Weapon>, AppError>;

    /// Users matching every set field of the filter, oldest first.
    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>, AppError>;
    /// Tasks matching the filter, newest first.
    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError>;
    async fn find_weapons(&self, filter: &WeaponFilter) -> Result<Vec<Weapon>, AppError>;

    /// Applies every change or none of them. A replace, delete or verify whose
    /// expected version no longer matches fails the whole set with `Conflict`.
    async fn commit(&self, changes: ChangeSet) -> Result<(), AppError>;
}

// =============================================================================
//  FILTERS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub ids: Option<Vec<String>>,
    pub role: Option<Role>,
    pub status: Option<DutyStatus>,
    pub availability: Option<Availability>,
    pub sub_admin_id: Option<String>,
}

impl UserFilter {
    pub fn personnel() -> Self {
        Self { role: Some(Role::Personnel), ..Self::default() }
    }

    pub fn personnel_of(sub_admin_id: &str) -> Self {
        Self { sub_admin_id: Some(sub_admin_id.to_string()), ..Self::personnel() }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.ids.as_ref().is_none_or(|ids| ids.contains(&user.id))
            && self.role.is_none_or(|role| user.role == role)
            && self.status.is_none_or(|status| user.status == status)
            && self.availability.is_none_or(|a| user.availability == a)
            && self
                .sub_admin_id
                .as_ref()
                .is_none_or(|s| user.sub_admin_id.as_ref() == Some(s))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub assigned_by: Option<String>,
    /// Tasks whose `assignedTo` contains this user id.
    pub member: Option<String>,
}

impl TaskFilter {
    pub fn containing(user_id: &str) -> Self {
        Self { member: Some(user_id.to_string()), ..Self::default() }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.assigned_by.as_ref().is_none_or(|by| &task.assigned_by == by)
            && self.member.as_ref().is_none_or(|m| task.has_member(m))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum WeaponFilter {
    #[default]
    All,
    /// Held by any of these users.
    HeldBy(Vec<String>),
    /// Unassigned, or held by any of these users.
    AvailableTo(Vec<String>),
}

impl WeaponFilter {
    pub fn matches(&self, weapon: &Weapon) -> bool {
        let held_by_any =
            |ids: &[String]| weapon.assigned_to.as_ref().is_some_and(|h| ids.contains(h));
        match self {
            WeaponFilter::All => true,
            WeaponFilter::HeldBy(ids) => held_by_any(ids),
            WeaponFilter::AvailableTo(ids) => {
                weapon.assigned_to.as_deref().is_none_or(str::is_empty) || held_by_any(ids)
            }
        }
    }
}

// =============================================================================
//  CHANGE SET
// =============================================================================

/// One staged write. Replaced documents already carry their bumped version;
/// `expected_version` is the version that was read.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    InsertUser(User),
    InsertTask(Task),
    InsertWeapon(Weapon),
    ReplaceUser { expected_version: i64, user: User },
    ReplaceTask { expected_version: i64, task: Task },
    ReplaceWeapon { expected_version: i64, weapon: Weapon },
    Delete { entity: EntityKind, id: String, expected_version: i64 },
    /// Writes nothing; fails the set unless the record is still at this version.
    Verify { entity: EntityKind, id: String, expected_version: i64 },
}

impl Change {
    pub fn target(&self) -> (EntityKind, &str) {
        match self {
            Change::InsertUser(u) | Change::ReplaceUser { user: u, .. } => (EntityKind::User, &u.id),
            Change::InsertTask(t) | Change::ReplaceTask { task: t, .. } => (EntityKind::Task, &t.id),
            Change::InsertWeapon(w) | Change::ReplaceWeapon { weapon: w, .. } => {
                (EntityKind::Weapon, &w.id)
            }
            Change::Delete { entity, id, .. } | Change::Verify { entity, id, .. } => (*entity, id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// False when the set only verifies versions.
    pub fn has_writes(&self) -> bool {
        self.changes.iter().any(|c| !matches!(c, Change::Verify { .. }))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }
}

pub(crate) fn stale(entity: EntityKind, id: &str) -> AppError {
    AppError::Conflict(format!(
        "{} '{}' was modified by another request; reload and retry",
        entity, id
    ))
}

pub(crate) fn duplicate(entity: EntityKind, what: &str, value: &str) -> AppError {
    AppError::Conflict(format!("{} with {} '{}' already exists", entity, what, value))
}
