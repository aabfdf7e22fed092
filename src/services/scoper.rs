// src/services/scoper.rs

//! Ownership checks for sub-admin operations.
//!
//! A sub-admin owns the personnel whose `subAdminId` is its id, the tasks it
//! created and any weapon that is unassigned or held by its personnel.
//!
//! Records checked here are read through the operation's [`Reconciler`], so
//! the commit fails with `Conflict` if any of them changed after the check.

use crate::{
    common::{error::AppError, serde_helpers::dedup_ids},
    db::{EntityStore, UserFilter},
    models::{task::Task, user::User, weapon::Weapon, EntityKind},
    services::reconciler::Reconciler,
};

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Admin,
    SubAdmin(String),
}

impl Actor {
    pub fn sub_admin_id(&self) -> Option<&str> {
        match self {
            Actor::Admin => None,
            Actor::SubAdmin(id) => Some(id),
        }
    }
}

/// Loads a personnel record the sub-admin commands.
pub async fn owned_personnel(
    rec: &mut Reconciler<'_>,
    sub_admin_id: &str,
    user_id: &str,
) -> Result<User, AppError> {
    let user = rec
        .read_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::User, user_id))?;

    if !user.is_under(sub_admin_id) {
        return Err(AppError::Unauthorized(format!(
            "Personnel '{}' is not under your command",
            user_id
        )));
    }
    Ok(user)
}

pub fn ensure_owns_task(task: &Task, sub_admin_id: &str) -> Result<(), AppError> {
    if task.assigned_by != sub_admin_id {
        return Err(AppError::Unauthorized(format!(
            "Task '{}' was not created by you",
            task.id
        )));
    }
    Ok(())
}

/// A weapon is within reach when nobody holds it or one of the sub-admin's
/// personnel does.
pub async fn ensure_weapon_in_reach(
    rec: &mut Reconciler<'_>,
    sub_admin_id: &str,
    weapon: &Weapon,
) -> Result<(), AppError> {
    let Some(holder) = weapon.assigned_to.as_deref() else {
        return Ok(());
    };
    let in_reach = rec
        .read_user(holder)
        .await?
        .is_some_and(|u| u.is_under(sub_admin_id));

    if !in_reach {
        return Err(AppError::Unauthorized(format!(
            "Weapon '{}' is held outside your command",
            weapon.id
        )));
    }
    Ok(())
}

/// Deduplicates requested assignees and checks each one.
///
/// Sub-admins may only place their own personnel; admins may place any
/// existing personnel. The error names every offending id.
pub async fn authorize_assignees(
    store: &dyn EntityStore,
    actor: &Actor,
    requested: &[String],
) -> Result<Vec<String>, AppError> {
    let ids = dedup_ids(requested);
    if ids.is_empty() {
        return Ok(ids);
    }

    let filter = UserFilter { ids: Some(ids.clone()), ..UserFilter::personnel() };
    let found = store.find_users(&filter).await?;

    let accepted = |id: &String| {
        found.iter().any(|u| {
            &u.id == id && actor.sub_admin_id().is_none_or(|s| u.is_under(s))
        })
    };
    let offending: Vec<String> = ids.iter().filter(|id| !accepted(*id)).cloned().collect();

    if offending.is_empty() {
        return Ok(ids);
    }

    tracing::warn!("🚫 Rejected assignees {:?} for {:?}", offending, actor);
    match actor {
        Actor::SubAdmin(_) => Err(AppError::ForeignPersonnel { ids: offending }),
        Actor::Admin => Err(AppError::InvalidAssignees {
            message: "Assignees must be existing personnel".to_string(),
            ids: offending,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{Change, ChangeSet, MemoryEntityStore},
        models::user::{DutyChange, DutyStatus},
        test_support::{personnel, seed, sub_admin, task, weapon},
    };

    async fn fixture() -> MemoryEntityStore {
        let store = MemoryEntityStore::new();
        seed(
            &store,
            vec![sub_admin("S1"), sub_admin("S2"), personnel("U1", "S1"), personnel("U2", "S1"), personnel("U9", "S2")],
            vec![],
            vec![],
        )
        .await;
        store
    }

    #[tokio::test]
    async fn foreign_personnel_reject_the_whole_list() {
        let store = fixture().await;
        let actor = Actor::SubAdmin("S1".into());

        let err = authorize_assignees(&store, &actor, &["U1".into(), "U9".into()])
            .await
            .unwrap_err();

        match err {
            AppError::ForeignPersonnel { ids } => assert_eq!(ids, vec!["U9".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicates_do_not_count_against_the_actor() {
        let store = fixture().await;
        let actor = Actor::SubAdmin("S1".into());

        let ids = authorize_assignees(&store, &actor, &["U1".into(), "U1".into(), "U2".into()])
            .await
            .unwrap();

        assert_eq!(ids, vec!["U1".to_string(), "U2".to_string()]);
    }

    #[tokio::test]
    async fn admin_may_not_assign_non_personnel() {
        let store = fixture().await;

        let err = authorize_assignees(&store, &Actor::Admin, &["U9".into(), "S1".into(), "NOPE".into()])
            .await
            .unwrap_err();

        match err {
            AppError::InvalidAssignees { ids, .. } => {
                assert_eq!(ids, vec!["S1".to_string(), "NOPE".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn personnel_of_another_sub_admin_are_out_of_reach() {
        let store = fixture().await;
        let mut rec = Reconciler::new(&store);

        assert!(owned_personnel(&mut rec, "S1", "U1").await.is_ok());
        assert!(matches!(
            owned_personnel(&mut rec, "S1", "U9").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            owned_personnel(&mut rec, "S1", "S2").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            owned_personnel(&mut rec, "S1", "NOPE").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn weapons_held_by_foreign_personnel_are_out_of_reach() {
        let store = fixture().await;
        let mut rec = Reconciler::new(&store);

        assert!(ensure_weapon_in_reach(&mut rec, "S1", &weapon("W1", None)).await.is_ok());
        assert!(ensure_weapon_in_reach(&mut rec, "S1", &weapon("W2", Some("U2"))).await.is_ok());
        assert!(ensure_weapon_in_reach(&mut rec, "S1", &weapon("W3", Some("U9"))).await.is_err());
    }

    #[tokio::test]
    async fn personnel_moved_after_the_check_fails_the_commit() {
        let store = fixture().await;
        let mut rec = Reconciler::new(&store);
        owned_personnel(&mut rec, "S1", "U2").await.unwrap();

        // U2 is handed to S2 by another request before this one commits.
        let mut moved = store.get_user("U2").await.unwrap().unwrap();
        let expected_version = moved.version;
        moved.sub_admin_id = Some("S2".into());
        moved.version += 1;
        let mut changes = ChangeSet::default();
        changes.push(Change::ReplaceUser { expected_version, user: moved });
        store.commit(changes).await.unwrap();

        rec.change_duty("U1", &DutyChange { status: Some(DutyStatus::OnLeave), ..DutyChange::default() })
            .await
            .unwrap();
        assert!(matches!(rec.commit().await, Err(AppError::Conflict(_))));
        assert_eq!(store.get_user("U1").await.unwrap().unwrap().status, DutyStatus::OnDuty);
    }

    #[test]
    fn only_the_creator_owns_a_task() {
        let t = task("T1", "S1", &[]);
        assert!(ensure_owns_task(&t, "S1").is_ok());
        assert!(ensure_owns_task(&t, "S2").is_err());
    }
}
