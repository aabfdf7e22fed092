// src/services/task_service.rs

use crate::{
    common::{
        error::AppError,
        serde_helpers::{blank_as_none, dedup_ids},
    },
    db::{SharedStore, TaskFilter},
    models::{
        outcome::Outcome,
        task::{CreateTaskPayload, Task, UpdateTaskPayload},
        EntityKind,
    },
    services::{
        reconciler::Reconciler,
        scoper::{authorize_assignees, ensure_owns_task, Actor},
    },
};

#[derive(Clone)]
pub struct TaskService {
    store: SharedStore,
}

impl TaskService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Newest first. Sub-admins only see tasks they created.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Task>, AppError> {
        let filter = TaskFilter {
            assigned_by: actor.sub_admin_id().map(str::to_string),
            ..TaskFilter::default()
        };
        self.store.find_tasks(&filter).await
    }

    // --- CREATE ---
    pub async fn create(
        &self,
        actor: &Actor,
        payload: CreateTaskPayload,
    ) -> Result<Outcome<Task>, AppError> {
        let assigned_by = match actor {
            Actor::SubAdmin(id) => id.clone(),
            Actor::Admin => blank_as_none(payload.assigned_by)
                .ok_or_else(|| AppError::Validation("assignedBy is required".to_string()))?,
        };
        let assigned_to = authorize_assignees(self.store.as_ref(), actor, &payload.assigned_to).await?;

        let mut rec = Reconciler::new(self.store.as_ref());
        let now = rec.now();
        let task = Task {
            id: payload.id.trim().to_string(),
            title: payload.title,
            description: payload.description,
            assigned_by,
            assigned_to,
            status: payload.status.unwrap_or_default(),
            location: payload.location,
            start_time: payload.start_time,
            end_time: payload.end_time,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let id = task.id.clone();

        rec.create_task(task).await?;
        let mut committed = rec.commit().await?;
        let task = committed
            .take_task(&id)
            .ok_or_else(|| anyhow::anyhow!("task '{}' missing after commit", id))?;

        tracing::info!("✅ Task '{}' created by '{}' with {} member(s)", task.id, task.assigned_by, task.assigned_to.len());
        Ok(Outcome::new("Task created successfully", task, committed.warnings))
    }

    // --- UPDATE ---
    pub async fn update(
        &self,
        actor: &Actor,
        id: &str,
        mut payload: UpdateTaskPayload,
    ) -> Result<Outcome<Task>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let stored = rec
            .read_task(id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Task, id))?;

        if let Some(sub_admin_id) = actor.sub_admin_id() {
            ensure_owns_task(&stored, sub_admin_id)?;
            if payload.assigned_by.as_deref().is_some_and(|by| by != sub_admin_id) {
                return Err(AppError::Unauthorized(
                    "assignedBy cannot be handed to another user".to_string(),
                ));
            }
        }
        if let Some(by) = payload.assigned_by.take() {
            payload.assigned_by = blank_as_none(Some(by));
        }

        // Members already on the task stay; only newcomers are checked.
        if let Some(requested) = payload.assigned_to.take() {
            let next = dedup_ids(&requested);
            let newcomers: Vec<String> =
                next.iter().filter(|u| !stored.has_member(u)).cloned().collect();
            authorize_assignees(self.store.as_ref(), actor, &newcomers).await?;
            payload.assigned_to = Some(next);
        }

        rec.update_task(id, payload).await?;
        let mut committed = rec.commit().await?;
        let task = committed
            .take_task(id)
            .ok_or_else(|| anyhow::anyhow!("task '{}' missing after commit", id))?;

        tracing::info!("✏️ Task '{}' updated", id);
        Ok(Outcome::new("Task updated successfully", task, committed.warnings))
    }

    // --- DELETE ---
    pub async fn delete(&self, actor: &Actor, id: &str) -> Result<Outcome<Task>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let stored = rec
            .read_task(id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Task, id))?;
        if let Some(sub_admin_id) = actor.sub_admin_id() {
            ensure_owns_task(&stored, sub_admin_id)?;
        }

        rec.delete_task(id).await?;
        let committed = rec.commit().await?;

        tracing::info!("🗑️ Task '{}' deleted", id);
        Ok(Outcome::new("Task deleted successfully", stored, committed.warnings))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        db::MemoryEntityStore,
        models::user::Availability,
        test_support::{admin, personnel, seed, sub_admin},
    };

    async fn service() -> (TaskService, SharedStore) {
        let store: SharedStore = Arc::new(MemoryEntityStore::new());
        seed(
            store.as_ref(),
            vec![
                admin("A1"),
                sub_admin("S1"),
                sub_admin("S2"),
                personnel("U1", "S1"),
                personnel("U2", "S1"),
                personnel("U3", "S1"),
                personnel("U9", "S2"),
            ],
            vec![],
            vec![],
        )
        .await;
        (TaskService::new(store.clone()), store)
    }

    fn create(id: &str, members: &[&str]) -> CreateTaskPayload {
        CreateTaskPayload {
            id: id.into(),
            title: "Patrol".into(),
            description: None,
            assigned_by: None,
            assigned_to: members.iter().map(|m| m.to_string()).collect(),
            status: None,
            location: Some("Sector 4".into()),
            start_time: None,
            end_time: None,
        }
    }

    #[tokio::test]
    async fn sub_admin_creates_as_itself() {
        let (service, store) = service().await;
        let actor = Actor::SubAdmin("S1".into());

        let mut payload = create("T1", &["U1"]);
        payload.assigned_by = Some("S2".into());
        let outcome = service.create(&actor, payload).await.unwrap();

        assert_eq!(outcome.data.assigned_by, "S1");
        assert!(outcome.is_clean());
        let u1 = store.get_user("U1").await.unwrap().unwrap();
        assert_eq!(u1.availability, Availability::Tasked);
    }

    #[tokio::test]
    async fn admin_must_name_the_creator() {
        let (service, _) = service().await;
        let err = service.create(&Actor::Admin, create("T1", &[])).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn foreign_personnel_reject_creation_without_writes() {
        let (service, store) = service().await;
        let actor = Actor::SubAdmin("S1".into());

        let err = service.create(&actor, create("T1", &["U1", "U9"])).await.unwrap_err();

        assert!(matches!(err, AppError::ForeignPersonnel { .. }));
        assert!(store.get_task("T1").await.unwrap().is_none());
        assert_eq!(store.get_user("U1").await.unwrap().unwrap().current_task_id, None);
    }

    #[tokio::test]
    async fn sub_admin_cannot_touch_foreign_tasks() {
        let (service, store) = service().await;
        service.create(&Actor::SubAdmin("S2".into()), create("T1", &["U9"])).await.unwrap();

        let actor = Actor::SubAdmin("S1".into());
        let patch = UpdateTaskPayload { title: Some("Mine now".into()), ..UpdateTaskPayload::default() };
        let update = service.update(&actor, "T1", patch).await;
        let delete = service.delete(&actor, "T1").await;

        assert!(matches!(update, Err(AppError::Unauthorized(_))));
        assert!(matches!(delete, Err(AppError::Unauthorized(_))));
        assert_eq!(store.get_task("T1").await.unwrap().unwrap().title, "Patrol");
    }

    #[tokio::test]
    async fn reassigning_members_keeps_users_in_step() {
        let (service, store) = service().await;
        let actor = Actor::SubAdmin("S1".into());
        service.create(&actor, create("T1", &["U1", "U2"])).await.unwrap();

        let patch = UpdateTaskPayload {
            assigned_to: Some(vec!["U2".into(), "U3".into(), "U3".into()]),
            ..UpdateTaskPayload::default()
        };
        let outcome = service.update(&actor, "T1", patch).await.unwrap();

        assert_eq!(outcome.data.assigned_to, vec!["U2".to_string(), "U3".to_string()]);
        assert_eq!(outcome.data.version, 1);
        let u1 = store.get_user("U1").await.unwrap().unwrap();
        assert_eq!((u1.current_task_id, u1.availability), (None, Availability::Free));
        let u3 = store.get_user("U3").await.unwrap().unwrap();
        assert_eq!(u3.current_task_id.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn inverted_window_after_merge_is_rejected() {
        let (service, _) = service().await;
        let actor = Actor::SubAdmin("S1".into());
        let mut payload = create("T1", &[]);
        payload.start_time = Some(chrono::Utc::now());
        service.create(&actor, payload).await.unwrap();

        let patch = UpdateTaskPayload {
            end_time: Some(Some(chrono::Utc::now() - chrono::Duration::hours(2))),
            ..UpdateTaskPayload::default()
        };
        let err = service.update(&actor, "T1", patch).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn lists_are_scoped_to_the_creator() {
        let (service, _) = service().await;
        service.create(&Actor::SubAdmin("S1".into()), create("T1", &[])).await.unwrap();
        service.create(&Actor::SubAdmin("S2".into()), create("T2", &[])).await.unwrap();

        let mine = service.list(&Actor::SubAdmin("S1".into())).await.unwrap();
        let all = service.list(&Actor::Admin).await.unwrap();

        assert_eq!(mine.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["T1"]);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn created_task_reads_back_from_the_store() {
        let (service, store) = service().await;
        let actor = Actor::SubAdmin("S1".into());

        let outcome = service.create(&actor, create(" T1 ", &["U1"])).await.unwrap();
        let stored = store.get_task("T1").await.unwrap().unwrap();

        assert_eq!(outcome.data, stored);
        assert_eq!(stored.location.as_deref(), Some("Sector 4"));
        assert_eq!(stored.assigned_to, vec!["U1".to_string()]);
    }

    #[tokio::test]
    async fn foreign_newcomer_on_update_leaves_the_task_untouched() {
        let (service, store) = service().await;
        let actor = Actor::SubAdmin("S1".into());
        service.create(&actor, create("T1", &["U1"])).await.unwrap();

        let patch = UpdateTaskPayload {
            title: Some("Night patrol".into()),
            assigned_to: Some(vec!["U1".into(), "U2".into(), "U9".into()]),
            ..UpdateTaskPayload::default()
        };
        let err = service.update(&actor, "T1", patch).await.unwrap_err();

        match err {
            AppError::ForeignPersonnel { ids } => assert_eq!(ids, vec!["U9".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        let t1 = store.get_task("T1").await.unwrap().unwrap();
        assert_eq!((t1.title.as_str(), t1.version), ("Patrol", 0));
        assert_eq!(t1.assigned_to, vec!["U1".to_string()]);
        assert_eq!(store.get_user("U2").await.unwrap().unwrap().current_task_id, None);
    }
}
