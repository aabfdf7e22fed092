// src/services/weapon_service.rs

use crate::{
    common::{error::AppError, serde_helpers::blank_as_none},
    db::{SharedStore, UserFilter, WeaponFilter},
    models::{
        outcome::Outcome,
        weapon::{CreateWeaponPayload, UpdateWeaponPayload, Weapon},
        EntityKind,
    },
    services::{
        reconciler::Reconciler,
        scoper::{ensure_weapon_in_reach, owned_personnel},
    },
};

#[derive(Clone)]
pub struct WeaponService {
    store: SharedStore,
}

impl WeaponService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Weapon>, AppError> {
        self.store.find_weapons(&WeaponFilter::All).await
    }

    /// Unassigned weapons plus those held by the sub-admin's personnel.
    pub async fn available_for(&self, sub_admin_id: &str) -> Result<Vec<Weapon>, AppError> {
        let team: Vec<String> = self
            .store
            .find_users(&UserFilter::personnel_of(sub_admin_id))
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        self.store.find_weapons(&WeaponFilter::AvailableTo(team)).await
    }

    async fn finish(
        &self,
        rec: Reconciler<'_>,
        id: &str,
        message: &str,
    ) -> Result<Outcome<Weapon>, AppError> {
        let mut committed = rec.commit().await?;
        let weapon = committed
            .take_weapon(id)
            .ok_or_else(|| anyhow::anyhow!("weapon '{}' missing after commit", id))?;
        Ok(Outcome::new(message, weapon, committed.warnings))
    }

    // --- Admin ---

    pub async fn create(&self, payload: CreateWeaponPayload) -> Result<Outcome<Weapon>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let now = rec.now();
        let weapon = Weapon {
            id: payload.id.trim().to_string(),
            name: payload.name,
            weapon_type: payload.weapon_type,
            description: payload.description,
            assigned_to: blank_as_none(payload.assigned_to),
            is_operational: payload.is_operational.unwrap_or(true),
            added_by: blank_as_none(payload.added_by),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let id = weapon.id.clone();

        rec.create_weapon(weapon).await?;
        let outcome = self.finish(rec, &id, "Weapon added successfully").await?;
        tracing::info!("✅ Weapon '{}' added", id);
        Ok(outcome)
    }

    pub async fn update(
        &self,
        id: &str,
        payload: UpdateWeaponPayload,
    ) -> Result<Outcome<Weapon>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        rec.update_weapon(id, payload).await?;
        let outcome = self.finish(rec, id, "Weapon updated successfully").await?;
        tracing::info!("✏️ Weapon '{}' updated (holder: {:?})", id, outcome.data.assigned_to);
        Ok(outcome)
    }

    pub async fn delete(&self, id: &str) -> Result<Outcome<Weapon>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let stored = read_weapon(&mut rec, id).await?;
        rec.delete_weapon(id).await?;
        let committed = rec.commit().await?;

        tracing::info!("🗑️ Weapon '{}' deleted", id);
        Ok(Outcome::new("Weapon deleted successfully", stored, committed.warnings))
    }

    // --- Sub-admin ---

    pub async fn assign(
        &self,
        sub_admin_id: &str,
        weapon_id: &str,
        personnel_id: &str,
    ) -> Result<Outcome<Weapon>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let weapon = read_weapon(&mut rec, weapon_id).await?;
        ensure_weapon_in_reach(&mut rec, sub_admin_id, &weapon).await?;
        owned_personnel(&mut rec, sub_admin_id, personnel_id).await?;

        rec.set_weapon_holder(weapon_id, Some(personnel_id.to_string())).await?;
        let outcome = self.finish(rec, weapon_id, "Weapon assigned successfully").await?;
        tracing::info!("🔫 Weapon '{}' assigned to '{}'", weapon_id, personnel_id);
        Ok(outcome)
    }

    pub async fn unassign(
        &self,
        sub_admin_id: &str,
        weapon_id: &str,
    ) -> Result<Outcome<Weapon>, AppError> {
        let mut rec = Reconciler::new(self.store.as_ref());
        let weapon = read_weapon(&mut rec, weapon_id).await?;
        ensure_weapon_in_reach(&mut rec, sub_admin_id, &weapon).await?;

        rec.set_weapon_holder(weapon_id, None).await?;
        let outcome = self.finish(rec, weapon_id, "Weapon unassigned successfully").await?;
        tracing::info!("🔓 Weapon '{}' unassigned", weapon_id);
        Ok(outcome)
    }
}

async fn read_weapon(rec: &mut Reconciler<'_>, id: &str) -> Result<Weapon, AppError> {
    rec.read_weapon(id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Weapon, id))
}
