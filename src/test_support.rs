// src/test_support.rs

//! Record builders and seeding helpers shared by unit and router tests.

use chrono::{Duration, Utc};

use crate::{
    db::{Change, ChangeSet, EntityStore},
    models::{
        task::{Task, TaskStatus},
        user::{Availability, DutyStatus, Role, User},
        weapon::Weapon,
    },
};

pub fn user(id: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: id.into(),
        name: format!("{id} name"),
        email: Some(format!("{}@crpf.test", id.to_lowercase())),
        password_hash: None,
        role,
        rank: None,
        service_number: None,
        admin_id: None,
        sub_admin_id: None,
        weapons_assigned: vec![],
        status: DutyStatus::OnDuty,
        availability: Availability::Free,
        current_task_id: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn admin(id: &str) -> User {
    user(id, Role::Admin)
}

pub fn sub_admin(id: &str) -> User {
    user(id, Role::SubAdmin)
}

pub fn personnel(id: &str, sub_admin_id: &str) -> User {
    User {
        service_number: Some(format!("SN-{id}")),
        sub_admin_id: Some(sub_admin_id.into()),
        ..user(id, Role::Personnel)
    }
}

/// A task whose member list is not mirrored onto the users; seed the users
/// with matching `currentTaskId` when a test needs both sides.
pub fn task(id: &str, assigned_by: &str, members: &[&str]) -> Task {
    let now = Utc::now();
    Task {
        id: id.into(),
        title: format!("{id} title"),
        description: None,
        assigned_by: assigned_by.into(),
        assigned_to: members.iter().map(|m| m.to_string()).collect(),
        status: TaskStatus::Pending,
        location: None,
        start_time: Some(now),
        end_time: Some(now + Duration::hours(4)),
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn weapon(id: &str, holder: Option<&str>) -> Weapon {
    let now = Utc::now();
    Weapon {
        id: id.into(),
        name: format!("{id} rifle"),
        weapon_type: "Rifle".into(),
        description: None,
        assigned_to: holder.map(str::to_string),
        is_operational: true,
        added_by: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub async fn seed(store: &dyn EntityStore, users: Vec<User>, tasks: Vec<Task>, weapons: Vec<Weapon>) {
    let mut changes = ChangeSet::default();
    users.into_iter().for_each(|u| changes.push(Change::InsertUser(u)));
    tasks.into_iter().for_each(|t| changes.push(Change::InsertTask(t)));
    weapons.into_iter().for_each(|w| changes.push(Change::InsertWeapon(w)));
    store.commit(changes).await.expect("seed commit");
}
