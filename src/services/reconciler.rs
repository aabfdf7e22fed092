// src/services/reconciler.rs

//! Keeps the mirrored references between users, tasks and weapons in step.
//!
//! A [`Reconciler`] stages every record an operation touches, lets the
//! operation mutate the staged copies and finally commits the difference as one
//! [`ChangeSet`]. Nothing else in the crate writes `currentTaskId`,
//! `availability`, `Task.assignedTo`, `Weapon.assignedTo` or
//! `User.weaponsAssigned`.
//!
//! Related records that have gone missing never abort an operation; they are
//! reported as [`ConsistencyWarning`]s next to the committed result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    common::error::AppError,
    db::{Change, ChangeSet, EntityStore, TaskFilter, WeaponFilter},
    models::{
        outcome::ConsistencyWarning,
        task::{ensure_window, Task, UpdateTaskPayload},
        user::{Availability, DutyChange, DutyStatus, Role, UpdateUserPayload, User},
        weapon::{UpdateWeaponPayload, Weapon},
        EntityKind,
    },
};

// =============================================================================
//  STAGING
// =============================================================================

/// A document the reconciler can stage, diff and emit.
trait Document: Clone + PartialEq {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn version(&self) -> i64;
    fn bump(&mut self, now: DateTime<Utc>);
    fn insert(self) -> Change;
    fn replace(self, expected_version: i64) -> Change;
}

impl Document for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> i64 {
        self.version
    }
    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
    fn insert(self) -> Change {
        Change::InsertUser(self)
    }
    fn replace(self, expected_version: i64) -> Change {
        Change::ReplaceUser { expected_version, user: self }
    }
}

impl Document for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> i64 {
        self.version
    }
    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
    fn insert(self) -> Change {
        Change::InsertTask(self)
    }
    fn replace(self, expected_version: i64) -> Change {
        Change::ReplaceTask { expected_version, task: self }
    }
}

impl Document for Weapon {
    const KIND: EntityKind = EntityKind::Weapon;

    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> i64 {
        self.version
    }
    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
    fn insert(self) -> Change {
        Change::InsertWeapon(self)
    }
    fn replace(self, expected_version: i64) -> Change {
        Change::ReplaceWeapon { expected_version, weapon: self }
    }
}

#[derive(Debug, Clone)]
struct Staged<T> {
    original: Option<T>,
    current: Option<T>,
    // Read for an authorization check; verified at commit even when unchanged.
    pinned: bool,
}

impl<T: Clone> Staged<T> {
    fn loaded(doc: Option<T>) -> Self {
        Self { original: doc.clone(), current: doc, pinned: false }
    }
}

fn seal_collection<T: Document>(
    staged: BTreeMap<String, Staged<T>>,
    now: DateTime<Utc>,
    changes: &mut ChangeSet,
) -> BTreeMap<String, T> {
    let mut live = BTreeMap::new();
    for (id, entry) in staged {
        let pinned = entry.pinned;
        match (entry.original, entry.current) {
            (None, Some(doc)) => {
                changes.push(doc.clone().insert());
                live.insert(id, doc);
            }
            (Some(original), Some(mut doc)) => {
                if doc != original {
                    doc.bump(now);
                    changes.push(doc.clone().replace(original.version()));
                } else if pinned {
                    changes.push(Change::Verify {
                        entity: T::KIND,
                        id: id.clone(),
                        expected_version: original.version(),
                    });
                }
                live.insert(id, doc);
            }
            (Some(original), None) => changes.push(Change::Delete {
                entity: T::KIND,
                id: original.id().to_string(),
                expected_version: original.version(),
            }),
            (None, None) => {}
        }
    }
    live
}

/// Records as they stand after a successful commit.
#[derive(Debug, Default)]
pub struct Committed {
    users: BTreeMap<String, User>,
    tasks: BTreeMap<String, Task>,
    weapons: BTreeMap<String, Weapon>,
    pub warnings: Vec<ConsistencyWarning>,
}

impl Committed {
    pub fn take_user(&mut self, id: &str) -> Option<User> {
        self.users.remove(id)
    }

    pub fn take_task(&mut self, id: &str) -> Option<Task> {
        self.tasks.remove(id)
    }

    pub fn take_weapon(&mut self, id: &str) -> Option<Weapon> {
        self.weapons.remove(id)
    }
}

// =============================================================================
//  DUTY RULES
// =============================================================================

/// Resulting `(status, availability, currentTaskId)` after applying a duty
/// change. Fields are applied `status`, then `availability`, then
/// `currentTaskId`; later fields overwrite what earlier ones implied.
pub fn resolve_duty(
    user: &User,
    change: &DutyChange,
) -> Result<(DutyStatus, Availability, Option<String>), AppError> {
    let mut status = user.status;
    let mut availability = user.availability;
    let mut current = user.current_task_id.clone();

    if let Some(next) = change.status {
        status = next;
        if next == DutyStatus::OnLeave {
            current = None;
            availability = Availability::Free;
        }
    }

    if let Some(next) = change.availability {
        availability = next;
        if next == Availability::Free {
            current = None;
        }
    }

    if let Some(next) = &change.current_task_id {
        current = next.clone();
        availability = if current.is_some() { Availability::Tasked } else { Availability::Free };
    }

    if availability == Availability::Tasked && current.is_none() {
        return Err(AppError::Validation(
            "availability 'tasked' requires a currentTaskId".to_string(),
        ));
    }

    Ok((status, availability, current))
}

// =============================================================================
//  RECONCILER
// =============================================================================

pub struct Reconciler<'s> {
    store: &'s dyn EntityStore,
    now: DateTime<Utc>,
    users: BTreeMap<String, Staged<User>>,
    tasks: BTreeMap<String, Staged<Task>>,
    weapons: BTreeMap<String, Staged<Weapon>>,
    warnings: Vec<ConsistencyWarning>,
}

impl<'s> Reconciler<'s> {
    pub fn new(store: &'s dyn EntityStore) -> Self {
        Self {
            store,
            now: Utc::now(),
            users: BTreeMap::new(),
            tasks: BTreeMap::new(),
            weapons: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    // --- staging helpers ---

    async fn user(&mut self, id: &str) -> Result<Option<&mut User>, AppError> {
        if !self.users.contains_key(id) {
            let found = self.store.get_user(id).await?;
            self.users.insert(id.to_string(), Staged::loaded(found));
        }
        Ok(self.users.get_mut(id).and_then(|s| s.current.as_mut()))
    }

    async fn task(&mut self, id: &str) -> Result<Option<&mut Task>, AppError> {
        if !self.tasks.contains_key(id) {
            let found = self.store.get_task(id).await?;
            self.tasks.insert(id.to_string(), Staged::loaded(found));
        }
        Ok(self.tasks.get_mut(id).and_then(|s| s.current.as_mut()))
    }

    async fn weapon(&mut self, id: &str) -> Result<Option<&mut Weapon>, AppError> {
        if !self.weapons.contains_key(id) {
            let found = self.store.get_weapon(id).await?;
            self.weapons.insert(id.to_string(), Staged::loaded(found));
        }
        Ok(self.weapons.get_mut(id).and_then(|s| s.current.as_mut()))
    }

    // Stages a task fetched by a query unless a copy is already staged.
    fn adopt_task(&mut self, task: Task) {
        self.tasks.entry(task.id.clone()).or_insert_with(|| Staged::loaded(Some(task)));
    }

    fn adopt_weapon(&mut self, weapon: Weapon) {
        self.weapons.entry(weapon.id.clone()).or_insert_with(|| Staged::loaded(Some(weapon)));
    }

    // --- pinned reads ---

    /// Stages a user and pins the version that was read, so the commit fails
    /// with `Conflict` if the record changed in the meantime.
    pub async fn read_user(&mut self, id: &str) -> Result<Option<User>, AppError> {
        let found = self.user(id).await?.cloned();
        if let Some(entry) = self.users.get_mut(id) {
            entry.pinned = true;
        }
        Ok(found)
    }

    pub async fn read_task(&mut self, id: &str) -> Result<Option<Task>, AppError> {
        let found = self.task(id).await?.cloned();
        if let Some(entry) = self.tasks.get_mut(id) {
            entry.pinned = true;
        }
        Ok(found)
    }

    pub async fn read_weapon(&mut self, id: &str) -> Result<Option<Weapon>, AppError> {
        let found = self.weapon(id).await?.cloned();
        if let Some(entry) = self.weapons.get_mut(id) {
            entry.pinned = true;
        }
        Ok(found)
    }

    fn warn(&mut self, entity: EntityKind, id: &str, detail: String) {
        tracing::warn!("⚠️ {} '{}': {}", entity, id, detail);
        self.warnings.push(ConsistencyWarning::missing(entity, id, detail));
    }

    // --- task membership primitives ---

    /// Points a user at `task_id`. A user already on another task is pulled
    /// from that task's `assignedTo` first.
    async fn attach(&mut self, user_id: &str, task_id: &str) -> Result<(), AppError> {
        let Some(user) = self.user(user_id).await? else {
            self.warn(
                EntityKind::User,
                user_id,
                format!("user not found while assigning task '{}'", task_id),
            );
            return Ok(());
        };

        let previous = user.current_task_id.replace(task_id.to_string());
        user.availability = Availability::Tasked;

        if let Some(previous) = previous.filter(|p| p != task_id) {
            tracing::debug!("User '{}' moves from task '{}' to '{}'", user_id, previous, task_id);
            self.remove_member(&previous, user_id).await?;
        }
        Ok(())
    }

    /// Frees a user, but only while the user still points at `task_id`.
    async fn detach(&mut self, user_id: &str, task_id: &str) -> Result<(), AppError> {
        let Some(user) = self.user(user_id).await? else {
            self.warn(
                EntityKind::User,
                user_id,
                format!("user not found while releasing task '{}'", task_id),
            );
            return Ok(());
        };

        if user.current_task_id.as_deref() == Some(task_id) {
            user.current_task_id = None;
            user.availability = Availability::Free;
        }
        Ok(())
    }

    /// Removes `user_id` from a task's `assignedTo`. Returns false when the
    /// task does not exist.
    async fn remove_member(&mut self, task_id: &str, user_id: &str) -> Result<bool, AppError> {
        match self.task(task_id).await? {
            Some(task) => {
                task.assigned_to.retain(|m| m != user_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pulls `user_id` from every task containing it, except `keep`.
    async fn remove_from_other_tasks(
        &mut self,
        user_id: &str,
        keep: Option<&str>,
    ) -> Result<(), AppError> {
        let holding = self.store.find_tasks(&TaskFilter::containing(user_id)).await?;
        for task in holding {
            let task_id = task.id.clone();
            self.adopt_task(task);
            if keep != Some(task_id.as_str()) {
                self.remove_member(&task_id, user_id).await?;
            }
        }
        Ok(())
    }

    // --- weapon holder primitives ---

    async fn grant_weapon(&mut self, user_id: &str, weapon_id: &str) -> Result<(), AppError> {
        match self.user(user_id).await? {
            Some(user) => {
                if !user.holds_weapon(weapon_id) {
                    user.weapons_assigned.push(weapon_id.to_string());
                }
            }
            None => self.warn(
                EntityKind::User,
                user_id,
                format!("new holder not found; weapon '{}' not added to weaponsAssigned", weapon_id),
            ),
        }
        Ok(())
    }

    async fn revoke_weapon(&mut self, user_id: &str, weapon_id: &str) -> Result<(), AppError> {
        match self.user(user_id).await? {
            Some(user) => user.weapons_assigned.retain(|w| w != weapon_id),
            None => self.warn(
                EntityKind::User,
                user_id,
                format!("previous holder not found; weapon '{}' not pulled from weaponsAssigned", weapon_id),
            ),
        }
        Ok(())
    }

    // =========================================================================
    //  TASK OPERATIONS
    // =========================================================================

    /// Inserts a new task and marks every assignee as tasked on it.
    pub async fn create_task(&mut self, task: Task) -> Result<(), AppError> {
        require_id(EntityKind::Task, &task.id)?;
        if self.task(&task.id).await?.is_some() {
            return Err(AppError::Conflict(format!("Task '{}' already exists", task.id)));
        }
        ensure_window(&task).map_err(|e| AppError::Validation(window_message(&e)))?;

        let task_id = task.id.clone();
        let members = task.assigned_to.clone();
        if let Some(entry) = self.tasks.get_mut(&task_id) {
            entry.current = Some(task);
        }

        for member in &members {
            self.attach(member, &task_id).await?;
        }
        Ok(())
    }

    /// Overwrites the submitted fields. When `assignedTo` is present, removed
    /// members are freed (if still on this task) and added members are tasked.
    pub async fn update_task(&mut self, id: &str, patch: UpdateTaskPayload) -> Result<(), AppError> {
        let Some(task) = self.task(id).await? else {
            return Err(AppError::not_found(EntityKind::Task, id));
        };

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(assigned_by) = patch.assigned_by {
            task.assigned_by = assigned_by;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(location) = patch.location {
            task.location = location;
        }
        if let Some(start_time) = patch.start_time {
            task.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            task.end_time = end_time;
        }
        ensure_window(task).map_err(|e| AppError::Validation(window_message(&e)))?;

        let Some(next) = patch.assigned_to else {
            return Ok(());
        };
        let previous = std::mem::replace(&mut task.assigned_to, next.clone());

        let removed: Vec<String> = previous.iter().filter(|u| !next.contains(u)).cloned().collect();
        let added: Vec<String> = next.iter().filter(|u| !previous.contains(u)).cloned().collect();

        for user_id in &removed {
            self.detach(user_id, id).await?;
        }
        for user_id in &added {
            self.attach(user_id, id).await?;
        }
        Ok(())
    }

    /// Frees members still pointing at the task, then removes it.
    pub async fn delete_task(&mut self, id: &str) -> Result<(), AppError> {
        let Some(task) = self.task(id).await? else {
            return Err(AppError::not_found(EntityKind::Task, id));
        };
        let members = task.assigned_to.clone();

        if let Some(entry) = self.tasks.get_mut(id) {
            entry.current = None;
        }
        for member in &members {
            self.detach(member, id).await?;
        }
        Ok(())
    }

    // =========================================================================
    //  WEAPON OPERATIONS
    // =========================================================================

    pub async fn create_weapon(&mut self, weapon: Weapon) -> Result<(), AppError> {
        require_id(EntityKind::Weapon, &weapon.id)?;
        if self.weapon(&weapon.id).await?.is_some() {
            return Err(AppError::Conflict(format!("Weapon '{}' already exists", weapon.id)));
        }

        let weapon_id = weapon.id.clone();
        let holder = weapon.assigned_to.clone();
        if let Some(entry) = self.weapons.get_mut(&weapon_id) {
            entry.current = Some(weapon);
        }

        if let Some(holder) = holder {
            self.grant_weapon(&holder, &weapon_id).await?;
        }
        Ok(())
    }

    /// Moves a weapon to `holder` (or to nobody). The previous holder is taken
    /// from the stored weapon record.
    pub async fn set_weapon_holder(
        &mut self,
        weapon_id: &str,
        holder: Option<String>,
    ) -> Result<(), AppError> {
        let Some(weapon) = self.weapon(weapon_id).await? else {
            return Err(AppError::not_found(EntityKind::Weapon, weapon_id));
        };

        let previous = std::mem::replace(&mut weapon.assigned_to, holder.clone());
        if previous == holder {
            return Ok(());
        }

        if let Some(previous) = previous {
            self.revoke_weapon(&previous, weapon_id).await?;
        }
        if let Some(holder) = holder {
            self.grant_weapon(&holder, weapon_id).await?;
        }
        Ok(())
    }

    pub async fn update_weapon(&mut self, id: &str, patch: UpdateWeaponPayload) -> Result<(), AppError> {
        let Some(weapon) = self.weapon(id).await? else {
            return Err(AppError::not_found(EntityKind::Weapon, id));
        };

        if let Some(name) = patch.name {
            weapon.name = name;
        }
        if let Some(weapon_type) = patch.weapon_type {
            weapon.weapon_type = weapon_type;
        }
        if let Some(description) = patch.description {
            weapon.description = description;
        }
        if let Some(is_operational) = patch.is_operational {
            weapon.is_operational = is_operational;
        }
        if let Some(added_by) = patch.added_by {
            weapon.added_by = added_by;
        }

        if let Some(holder) = patch.assigned_to {
            self.set_weapon_holder(id, holder).await?;
        }
        Ok(())
    }

    pub async fn delete_weapon(&mut self, id: &str) -> Result<(), AppError> {
        let Some(weapon) = self.weapon(id).await? else {
            return Err(AppError::not_found(EntityKind::Weapon, id));
        };
        let holder = weapon.assigned_to.clone();

        if let Some(entry) = self.weapons.get_mut(id) {
            entry.current = None;
        }
        if let Some(holder) = holder {
            self.revoke_weapon(&holder, id).await?;
        }
        Ok(())
    }

    // =========================================================================
    //  USER OPERATIONS
    // =========================================================================

    pub async fn create_user(&mut self, user: User) -> Result<(), AppError> {
        require_id(EntityKind::User, &user.id)?;
        if self.user(&user.id).await?.is_some() {
            return Err(AppError::Conflict(format!("User '{}' already exists", user.id)));
        }
        let user_id = user.id.clone();
        if let Some(entry) = self.users.get_mut(&user_id) {
            entry.current = Some(user);
        }
        Ok(())
    }

    /// Applies profile fields and, through [`Reconciler::change_duty`], the
    /// duty fields. Duty fields are only accepted for users who end up as
    /// personnel. A user leaving the personnel role is released from tasks.
    pub async fn update_user(
        &mut self,
        id: &str,
        patch: UpdateUserPayload,
        password_hash: Option<String>,
    ) -> Result<(), AppError> {
        let Some(user) = self.user(id).await? else {
            return Err(AppError::not_found(EntityKind::User, id));
        };
        let was_personnel = user.is_personnel();

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = Some(email);
        }
        if password_hash.is_some() {
            user.password_hash = password_hash;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(rank) = patch.rank {
            user.rank = rank;
        }
        if let Some(service_number) = patch.service_number {
            user.service_number = service_number;
        }
        if let Some(admin_id) = patch.admin_id {
            user.admin_id = admin_id;
        }
        if let Some(sub_admin_id) = patch.sub_admin_id {
            user.sub_admin_id = sub_admin_id;
        }
        let now_personnel = user.role == Role::Personnel;

        if !now_personnel && !patch.duty.is_empty() {
            return Err(AppError::Validation(format!(
                "User '{}' is not personnel; status, availability and currentTaskId do not apply",
                id
            )));
        }

        if was_personnel && !now_personnel {
            self.change_duty(id, &DutyChange { current_task_id: Some(None), ..DutyChange::default() })
                .await?;
        } else if !patch.duty.is_empty() {
            self.change_duty(id, &patch.duty).await?;
        }
        Ok(())
    }

    /// Removes a user after pulling it from every task and unassigning every
    /// weapon it holds.
    pub async fn delete_user(&mut self, id: &str) -> Result<(), AppError> {
        let Some(user) = self.user(id).await? else {
            return Err(AppError::not_found(EntityKind::User, id));
        };
        let listed_weapons = user.weapons_assigned.clone();

        if let Some(entry) = self.users.get_mut(id) {
            entry.current = None;
        }

        self.remove_from_other_tasks(id, None).await?;

        let held = self.store.find_weapons(&WeaponFilter::HeldBy(vec![id.to_string()])).await?;
        for weapon in held {
            self.adopt_weapon(weapon);
        }
        for weapon_id in listed_weapons {
            // Entries whose weapon is gone or held elsewhere need no cleanup.
            self.weapon(&weapon_id).await?;
        }

        let staged: Vec<String> = self.weapons.keys().cloned().collect();
        for weapon_id in staged {
            if let Some(weapon) = self.weapon(&weapon_id).await? {
                if weapon.is_held_by(id) {
                    weapon.assigned_to = None;
                }
            }
        }
        Ok(())
    }

    /// Applies the duty fields (see [`resolve_duty`]) and syncs the task side:
    /// the user joins the resulting task and leaves every other task.
    ///
    /// A task named in the change must exist. A kept `currentTaskId` whose task
    /// has gone missing is left alone and reported as a warning.
    pub async fn change_duty(&mut self, user_id: &str, change: &DutyChange) -> Result<(), AppError> {
        let Some(user) = self.user(user_id).await? else {
            return Err(AppError::not_found(EntityKind::User, user_id));
        };
        let (status, availability, current) = resolve_duty(user, change)?;
        user.status = status;
        user.availability = availability;
        user.current_task_id = current.clone();

        if let Some(task_id) = current.as_deref() {
            match self.task(task_id).await? {
                Some(task) => {
                    if !task.has_member(user_id) {
                        task.assigned_to.push(user_id.to_string());
                    }
                }
                None if matches!(change.current_task_id, Some(Some(_))) => {
                    return Err(AppError::not_found(EntityKind::Task, task_id));
                }
                None => self.warn(
                    EntityKind::Task,
                    task_id,
                    format!("task not found; user '{}' keeps a dangling currentTaskId", user_id),
                ),
            }
        }

        self.remove_from_other_tasks(user_id, current.as_deref()).await
    }

    /// Frees a user and pulls it from the task it was on.
    pub async fn clear_task(&mut self, user_id: &str) -> Result<(), AppError> {
        let Some(user) = self.user(user_id).await? else {
            return Err(AppError::not_found(EntityKind::User, user_id));
        };
        let previous = user.current_task_id.take();
        user.availability = Availability::Free;

        if let Some(task_id) = previous {
            if !self.remove_member(&task_id, user_id).await? {
                self.warn(
                    EntityKind::Task,
                    &task_id,
                    format!("task not found; user '{}' could not be pulled from assignedTo", user_id),
                );
            }
        }
        Ok(())
    }

    // =========================================================================
    //  COMMIT
    // =========================================================================

    /// Splits the staged state into the change set to write and the records
    /// as they will stand afterwards.
    pub fn seal(self) -> (ChangeSet, Committed) {
        let mut changes = ChangeSet::default();
        let users = seal_collection(self.users, self.now, &mut changes);
        let tasks = seal_collection(self.tasks, self.now, &mut changes);
        let weapons = seal_collection(self.weapons, self.now, &mut changes);
        (changes, Committed { users, tasks, weapons, warnings: self.warnings })
    }

    pub async fn commit(self) -> Result<Committed, AppError> {
        let store = self.store;
        let (changes, committed) = self.seal();
        if changes.has_writes() {
            tracing::debug!("Committing {} change(s)", changes.len());
            store.commit(changes).await?;
        }
        Ok(committed)
    }
}

fn require_id(entity: EntityKind, id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() {
        return Err(AppError::Validation(format!("{} id is required", entity)));
    }
    Ok(())
}

fn window_message(err: &validator::ValidationError) -> String {
    err.message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "invalid time range".to_string())
}
