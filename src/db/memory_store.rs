// src/db/memory_store.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    common::error::AppError,
    db::store::{duplicate, stale, Change, ChangeSet, EntityStore, TaskFilter, UserFilter, WeaponFilter},
    models::{task::Task, user::User, weapon::Weapon, EntityKind},
};

#[derive(Debug, Default, Clone)]
struct Collections {
    users: HashMap<String, User>,
    tasks: HashMap<String, Task>,
    weapons: HashMap<String, Weapon>,
}

impl Collections {
    fn version_of(&self, entity: EntityKind, id: &str) -> Option<i64> {
        match entity {
            EntityKind::User => self.users.get(id).map(|u| u.version),
            EntityKind::Task => self.tasks.get(id).map(|t| t.version),
            EntityKind::Weapon => self.weapons.get(id).map(|w| w.version),
        }
    }

    fn check_user_uniques(&self, user: &User) -> Result<(), AppError> {
        for other in self.users.values().filter(|o| o.id != user.id) {
            if let (Some(a), Some(b)) = (&user.email, &other.email) {
                if a == b {
                    return Err(duplicate(EntityKind::User, "email", a));
                }
            }
            if let (Some(a), Some(b)) = (&user.service_number, &other.service_number) {
                if a == b {
                    return Err(duplicate(EntityKind::User, "service number", a));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, change: Change) -> Result<(), AppError> {
        let (entity, id) = change.target();
        let current = self.version_of(entity, id);

        match change {
            Change::InsertUser(user) => {
                if current.is_some() {
                    return Err(duplicate(EntityKind::User, "id", &user.id));
                }
                self.check_user_uniques(&user)?;
                self.users.insert(user.id.clone(), user);
            }
            Change::InsertTask(task) => {
                if current.is_some() {
                    return Err(duplicate(EntityKind::Task, "id", &task.id));
                }
                self.tasks.insert(task.id.clone(), task);
            }
            Change::InsertWeapon(weapon) => {
                if current.is_some() {
                    return Err(duplicate(EntityKind::Weapon, "id", &weapon.id));
                }
                self.weapons.insert(weapon.id.clone(), weapon);
            }
            Change::ReplaceUser { expected_version, user } => {
                if current != Some(expected_version) {
                    return Err(stale(EntityKind::User, &user.id));
                }
                self.check_user_uniques(&user)?;
                self.users.insert(user.id.clone(), user);
            }
            Change::ReplaceTask { expected_version, task } => {
                if current != Some(expected_version) {
                    return Err(stale(EntityKind::Task, &task.id));
                }
                self.tasks.insert(task.id.clone(), task);
            }
            Change::ReplaceWeapon { expected_version, weapon } => {
                if current != Some(expected_version) {
                    return Err(stale(EntityKind::Weapon, &weapon.id));
                }
                self.weapons.insert(weapon.id.clone(), weapon);
            }
            Change::Delete { entity, id, expected_version } => {
                if current != Some(expected_version) {
                    return Err(stale(entity, &id));
                }
                match entity {
                    EntityKind::User => {
                        self.users.remove(&id);
                    }
                    EntityKind::Task => {
                        self.tasks.remove(&id);
                    }
                    EntityKind::Weapon => {
                        self.weapons.remove(&id);
                    }
                }
            }
            Change::Verify { entity, id, expected_version } => {
                if current != Some(expected_version) {
                    return Err(stale(entity, &id));
                }
            }
        }
        Ok(())
    }
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    inner: RwLock<Collections>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        Ok(self.inner.read().await.tasks.get(id).cloned())
    }

    async fn get_weapon(&self, id: &str) -> Result<Option<Weapon>, AppError> {
        Ok(self.inner.read().await.weapons.get(id).cloned())
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>, AppError> {
        let guard = self.inner.read().await;
        let mut users: Vec<User> =
            guard.users.values().filter(|u| filter.matches(u)).cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let guard = self.inner.read().await;
        let mut tasks: Vec<Task> =
            guard.tasks.values().filter(|t| filter.matches(t)).cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn find_weapons(&self, filter: &WeaponFilter) -> Result<Vec<Weapon>, AppError> {
        let guard = self.inner.read().await;
        let mut weapons: Vec<Weapon> =
            guard.weapons.values().filter(|w| filter.matches(w)).cloned().collect();
        weapons.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(weapons)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), AppError> {
        let mut guard = self.inner.write().await;

        // Apply to a scratch copy so a failing change leaves nothing behind.
        let mut scratch = guard.clone();
        for change in changes.changes {
            scratch.apply(change)?;
        }
        *guard = scratch;
        Ok(())
    }
}
