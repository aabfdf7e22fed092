// src/services/user_service.rs

use crate::{
    common::{error::AppError, serde_helpers::blank_as_none},
    db::{SharedStore, UserFilter},
    models::{
        outcome::Outcome,
        user::{Availability, CreateUserPayload, DutyStatus, Role, UpdateUserPayload, User},
        EntityKind,
    },
    services::{auth_service::hash_password, reconciler::Reconciler},
};

/// Admin-side user management.
#[derive(Clone)]
pub struct UserService {
    store: SharedStore,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(store: SharedStore, bcrypt_cost: u32) -> Self {
        Self { store, bcrypt_cost }
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, AppError> {
        self.store.find_users(filter).await
    }

    /// On-duty personnel, tasked or not.
    pub async fn on_duty_personnel(&self) -> Result<Vec<User>, AppError> {
        let filter = UserFilter { status: Some(DutyStatus::OnDuty), ..UserFilter::personnel() };
        self.list(&filter).await
    }

    /// On-duty personnel without a task.
    pub async fn free_personnel(&self) -> Result<Vec<User>, AppError> {
        let filter = UserFilter {
            status: Some(DutyStatus::OnDuty),
            availability: Some(Availability::Free),
            ..UserFilter::personnel()
        };
        self.list(&filter).await
    }

    async fn ensure_sub_admin(rec: &mut Reconciler<'_>, id: &str) -> Result<(), AppError> {
        match rec.read_user(id).await? {
            Some(user) if user.role == Role::SubAdmin => Ok(()),
            _ => Err(AppError::Validation(format!("subAdminId '{}' is not a sub-admin", id))),
        }
    }

    async fn finish(&self, rec: Reconciler<'_>, id: &str, message: &str) -> Result<Outcome<User>, AppError> {
        let mut committed = rec.commit().await?;
        let user = committed
            .take_user(id)
            .ok_or_else(|| anyhow::anyhow!("user '{}' missing after commit", id))?;
        Ok(Outcome::new(message, user, committed.warnings))
    }

    // --- CREATE ---
    pub async fn create(&self, payload: CreateUserPayload) -> Result<Outcome<User>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let sub_admin_id = blank_as_none(payload.sub_admin_id);
        if let Some(sub_admin_id) = sub_admin_id.as_deref() {
            Self::ensure_sub_admin(&mut rec, sub_admin_id).await?;
        }

        let password_hash = match blank_as_none(payload.password) {
            Some(password) => Some(hash_password(&password, self.bcrypt_cost).await?),
            None => None,
        };

        let now = rec.now();
        let user = User {
            id: payload.id.trim().to_string(),
            name: payload.name,
            email: blank_as_none(payload.email),
            password_hash,
            role: payload.role,
            rank: blank_as_none(payload.rank),
            service_number: blank_as_none(payload.service_number),
            admin_id: blank_as_none(payload.admin_id),
            sub_admin_id,
            weapons_assigned: vec![],
            status: payload.status.unwrap_or_default(),
            availability: Availability::Free,
            current_task_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let id = user.id.clone();

        rec.create_user(user).await?;
        let outcome = self.finish(rec, &id, "User created successfully").await?;
        tracing::info!("✅ User '{}' created with role {:?}", id, outcome.data.role);
        Ok(outcome)
    }

    // --- UPDATE ---
    pub async fn update(
        &self,
        id: &str,
        mut payload: UpdateUserPayload,
    ) -> Result<Outcome<User>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        if let Some(Some(sub_admin_id)) = &payload.sub_admin_id {
            Self::ensure_sub_admin(&mut rec, sub_admin_id).await?;
        }

        let password_hash = match payload.password.take().and_then(|p| blank_as_none(Some(p))) {
            Some(password) => Some(hash_password(&password, self.bcrypt_cost).await?),
            None => None,
        };

        rec.update_user(id, payload, password_hash).await?;
        let outcome = self.finish(rec, id, "User updated successfully").await?;
        tracing::info!("✏️ User '{}' updated", id);
        Ok(outcome)
    }

    // --- DELETE ---
    pub async fn delete(&self, id: &str) -> Result<Outcome<User>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let stored = rec
            .read_user(id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::User, id))?;
        rec.delete_user(id).await?;
        let committed = rec.commit().await?;

        tracing::info!("🗑️ User '{}' deleted", id);
        Ok(Outcome::new("User deleted successfully", stored, committed.warnings))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        db::MemoryEntityStore,
        models::user::DutyChange,
        test_support::{personnel, seed, sub_admin, task},
    };

    async fn service() -> (UserService, SharedStore) {
        let store: SharedStore = Arc::new(MemoryEntityStore::new());
        seed(
            store.as_ref(),
            vec![sub_admin("S1"), personnel("U1", "S1")],
            vec![task("T1", "S1", &[])],
            vec![],
        )
        .await;
        (UserService::new(store.clone(), 4), store)
    }

    fn create(id: &str, role: Role) -> CreateUserPayload {
        CreateUserPayload {
            id: id.into(),
            name: "New User".into(),
            email: None,
            password: Some("pw".into()),
            role,
            rank: None,
            service_number: None,
            admin_id: None,
            sub_admin_id: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn created_user_round_trips_with_hashed_password() {
        let (service, store) = service().await;
        let mut payload = create("U2", Role::Personnel);
        payload.sub_admin_id = Some("S1".into());

        let outcome = service.create(payload).await.unwrap();
        let stored = store.get_user("U2").await.unwrap().unwrap();

        assert_eq!(outcome.data, stored);
        assert_eq!(stored.availability, Availability::Free);
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, "pw");
        assert!(bcrypt::verify("pw", &hash).unwrap());
    }

    #[tokio::test]
    async fn personnel_must_report_to_a_real_sub_admin() {
        let (service, _) = service().await;
        let mut payload = create("U2", Role::Personnel);
        payload.sub_admin_id = Some("U1".into());

        assert!(matches!(service.create(payload).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_id_conflicts() {
        let (service, _) = service().await;
        assert!(matches!(service.create(create("U1", Role::Personnel)).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn duty_fields_go_through_the_reconciler() {
        let (service, store) = service().await;
        let payload = UpdateUserPayload {
            duty: DutyChange { current_task_id: Some(Some("T1".into())), ..DutyChange::default() },
            ..UpdateUserPayload::default()
        };

        let outcome = service.update("U1", payload).await.unwrap();

        assert_eq!(outcome.data.availability, Availability::Tasked);
        assert!(store.get_task("T1").await.unwrap().unwrap().has_member("U1"));
    }

    #[tokio::test]
    async fn promoting_personnel_releases_its_task() {
        let (service, store) = service().await;
        let tasked = UpdateUserPayload {
            duty: DutyChange { current_task_id: Some(Some("T1".into())), ..DutyChange::default() },
            ..UpdateUserPayload::default()
        };
        service.update("U1", tasked).await.unwrap();

        let promote = UpdateUserPayload { role: Some(Role::SubAdmin), ..UpdateUserPayload::default() };
        let outcome = service.update("U1", promote).await.unwrap();

        assert_eq!(outcome.data.current_task_id, None);
        assert!(!store.get_task("T1").await.unwrap().unwrap().has_member("U1"));
    }

    #[tokio::test]
    async fn listings_filter_on_duty_and_free() {
        let (service, _) = service().await;
        let mut away = create("U2", Role::Personnel);
        away.status = Some(DutyStatus::OnLeave);
        service.create(away).await.unwrap();
        let busy = UpdateUserPayload {
            duty: DutyChange { current_task_id: Some(Some("T1".into())), ..DutyChange::default() },
            ..UpdateUserPayload::default()
        };
        service.create(create("U3", Role::Personnel)).await.unwrap();
        service.update("U3", busy).await.unwrap();

        let on_duty: Vec<String> = service.on_duty_personnel().await.unwrap().into_iter().map(|u| u.id).collect();
        let free: Vec<String> = service.free_personnel().await.unwrap().into_iter().map(|u| u.id).collect();

        assert_eq!(on_duty, vec!["U1".to_string(), "U3".to_string()]);
        assert_eq!(free, vec!["U1".to_string()]);
    }

    #[tokio::test]
    async fn duty_fields_are_rejected_for_sub_admins() {
        let (service, store) = service().await;
        let payload = UpdateUserPayload {
            duty: DutyChange { current_task_id: Some(Some("T1".into())), ..DutyChange::default() },
            ..UpdateUserPayload::default()
        };

        let err = service.update("S1", payload).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.get_task("T1").await.unwrap().unwrap().assigned_to.is_empty());
        let s1 = store.get_user("S1").await.unwrap().unwrap();
        assert_eq!((s1.current_task_id, s1.version), (None, 0));
    }

    #[tokio::test]
    async fn demoting_with_duty_fields_is_rejected() {
        let (service, store) = service().await;
        let payload = UpdateUserPayload {
            role: Some(Role::SubAdmin),
            duty: DutyChange { status: Some(DutyStatus::OnLeave), ..DutyChange::default() },
            ..UpdateUserPayload::default()
        };

        assert!(matches!(service.update("U1", payload).await, Err(AppError::Validation(_))));
        assert_eq!(store.get_user("U1").await.unwrap().unwrap().role, Role::Personnel);
    }
}
