// src/services/personnel_service.rs

use std::collections::HashMap;

use crate::{
    common::error::AppError,
    db::{SharedStore, UserFilter},
    models::{
        outcome::Outcome,
        task::TaskSummary,
        user::{DutyChange, PersonnelView, User},
        EntityKind,
    },
    services::{
        reconciler::Reconciler,
        scoper::{ensure_owns_task, owned_personnel},
    },
};

/// The sub-admin's view of, and control over, its own personnel.
#[derive(Clone)]
pub struct PersonnelService {
    store: SharedStore,
}

impl PersonnelService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn my_personnel(&self, sub_admin_id: &str) -> Result<Vec<PersonnelView>, AppError> {
        let users = self.store.find_users(&UserFilter::personnel_of(sub_admin_id)).await?;

        let mut summaries: HashMap<String, Option<TaskSummary>> = HashMap::new();
        for task_id in users.iter().filter_map(|u| u.current_task_id.as_deref()) {
            if !summaries.contains_key(task_id) {
                let summary = self.store.get_task(task_id).await?.map(|t| t.summary());
                summaries.insert(task_id.to_string(), summary);
            }
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let current_task = user
                    .current_task_id
                    .as_ref()
                    .and_then(|id| summaries.get(id).cloned().flatten());
                PersonnelView { user, current_task }
            })
            .collect())
    }

    async fn finish(&self, rec: Reconciler<'_>, id: &str, message: &str) -> Result<Outcome<User>, AppError> {
        let mut committed = rec.commit().await?;
        let user = committed
            .take_user(id)
            .ok_or_else(|| anyhow::anyhow!("user '{}' missing after commit", id))?;
        Ok(Outcome::new(message, user, committed.warnings))
    }

    pub async fn update_duty(
        &self,
        sub_admin_id: &str,
        user_id: &str,
        change: DutyChange,
    ) -> Result<Outcome<User>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        owned_personnel(&mut rec, sub_admin_id, user_id).await?;

        if let Some(Some(task_id)) = &change.current_task_id {
            let task = rec
                .read_task(task_id)
                .await?
                .ok_or_else(|| AppError::not_found(EntityKind::Task, task_id.as_str()))?;
            ensure_owns_task(&task, sub_admin_id)?;
        }

        rec.change_duty(user_id, &change).await?;
        let outcome = self.finish(rec, user_id, "Personnel updated successfully").await?;

        tracing::info!(
            "👮 '{}' now {:?}/{:?} on {:?}",
            user_id,
            outcome.data.status,
            outcome.data.availability,
            outcome.data.current_task_id
        );
        Ok(outcome)
    }

    pub async fn clear_task(&self, sub_admin_id: &str, user_id: &str) -> Result<Outcome<User>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        owned_personnel(&mut rec, sub_admin_id, user_id).await?;

        rec.clear_task(user_id).await?;
        let outcome = self.finish(rec, user_id, "Personnel task cleared").await?;
        tracing::info!("🧹 Task cleared for '{}'", user_id);
        Ok(outcome)
    }
}
