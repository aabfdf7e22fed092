// src/db/pg_store.rs

use async_trait::async_trait;
use sqlx::{postgres::PgQueryResult, PgPool, Postgres, Transaction};

use crate::{
    common::error::AppError,
    db::store::{duplicate, stale, Change, ChangeSet, EntityStore, TaskFilter, UserFilter, WeaponFilter},
    models::{task::Task, user::User, weapon::Weapon, EntityKind},
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, rank, service_number, admin_id, \
     sub_admin_id, weapons_assigned, status, availability, current_task_id, version, created_at, updated_at";

const TASK_COLUMNS: &str = "id, title, description, assigned_by, assigned_to, status, location, \
     start_time, end_time, version, created_at, updated_at";

const WEAPON_COLUMNS: &str = "id, name, weapon_type, description, assigned_to, is_operational, \
     added_by, version, created_at, updated_at";

// Responsible for every interaction with the users/tasks/weapons tables.
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }
}

// Turns a unique violation into a Conflict naming the offending record.
fn map_write_error(e: sqlx::Error, entity: EntityKind, id: &str) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(c) if c.contains("email") => "email",
                Some(c) if c.contains("service_number") => "service number",
                _ => return duplicate(entity, "id", id),
            };
            return AppError::Conflict(format!(
                "{} '{}' uses a {} that already exists",
                entity, id, field
            ));
        }
    }
    AppError::DatabaseError(e)
}

fn ensure_applied(result: PgQueryResult, entity: EntityKind, id: &str) -> Result<(), AppError> {
    if result.rows_affected() == 0 {
        return Err(stale(entity, id));
    }
    Ok(())
}

async fn apply(tx: &mut Transaction<'_, Postgres>, change: Change) -> Result<(), AppError> {
    match change {
        Change::InsertUser(u) => {
            sqlx::query(
                r#"
                INSERT INTO users (
                    id, name, email, password_hash, role, rank, service_number, admin_id,
                    sub_admin_id, weapons_assigned, status, availability, current_task_id,
                    version, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(&u.id)
            .bind(&u.name)
            .bind(&u.email)
            .bind(&u.password_hash)
            .bind(u.role)
            .bind(&u.rank)
            .bind(&u.service_number)
            .bind(&u.admin_id)
            .bind(&u.sub_admin_id)
            .bind(&u.weapons_assigned)
            .bind(u.status)
            .bind(u.availability)
            .bind(&u.current_task_id)
            .bind(u.version)
            .bind(u.created_at)
            .bind(u.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, EntityKind::User, &u.id))?;
        }
        Change::InsertTask(t) => {
            sqlx::query(
                r#"
                INSERT INTO tasks (
                    id, title, description, assigned_by, assigned_to, status, location,
                    start_time, end_time, version, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&t.id)
            .bind(&t.title)
            .bind(&t.description)
            .bind(&t.assigned_by)
            .bind(&t.assigned_to)
            .bind(t.status)
            .bind(&t.location)
            .bind(t.start_time)
            .bind(t.end_time)
            .bind(t.version)
            .bind(t.created_at)
            .bind(t.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, EntityKind::Task, &t.id))?;
        }
        Change::InsertWeapon(w) => {
            sqlx::query(
                r#"
                INSERT INTO weapons (
                    id, name, weapon_type, description, assigned_to, is_operational,
                    added_by, version, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(&w.id)
            .bind(&w.name)
            .bind(&w.weapon_type)
            .bind(&w.description)
            .bind(&w.assigned_to)
            .bind(w.is_operational)
            .bind(&w.added_by)
            .bind(w.version)
            .bind(w.created_at)
            .bind(w.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, EntityKind::Weapon, &w.id))?;
        }
        Change::ReplaceUser { expected_version, user: u } => {
            let result = sqlx::query(
                r#"
                UPDATE users SET
                    name = $2, email = $3, password_hash = $4, role = $5, rank = $6,
                    service_number = $7, admin_id = $8, sub_admin_id = $9,
                    weapons_assigned = $10, status = $11, availability = $12,
                    current_task_id = $13, version = $14, updated_at = $15
                WHERE id = $1 AND version = $16
                "#,
            )
            .bind(&u.id)
            .bind(&u.name)
            .bind(&u.email)
            .bind(&u.password_hash)
            .bind(u.role)
            .bind(&u.rank)
            .bind(&u.service_number)
            .bind(&u.admin_id)
            .bind(&u.sub_admin_id)
            .bind(&u.weapons_assigned)
            .bind(u.status)
            .bind(u.availability)
            .bind(&u.current_task_id)
            .bind(u.version)
            .bind(u.updated_at)
            .bind(expected_version)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, EntityKind::User, &u.id))?;
            ensure_applied(result, EntityKind::User, &u.id)?;
        }
        Change::ReplaceTask { expected_version, task: t } => {
            let result = sqlx::query(
                r#"
                UPDATE tasks SET
                    title = $2, description = $3, assigned_by = $4, assigned_to = $5,
                    status = $6, location = $7, start_time = $8, end_time = $9,
                    version = $10, updated_at = $11
                WHERE id = $1 AND version = $12
                "#,
            )
            .bind(&t.id)
            .bind(&t.title)
            .bind(&t.description)
            .bind(&t.assigned_by)
            .bind(&t.assigned_to)
            .bind(t.status)
            .bind(&t.location)
            .bind(t.start_time)
            .bind(t.end_time)
            .bind(t.version)
            .bind(t.updated_at)
            .bind(expected_version)
            .execute(&mut **tx)
            .await?;
            ensure_applied(result, EntityKind::Task, &t.id)?;
        }
        Change::ReplaceWeapon { expected_version, weapon: w } => {
            let result = sqlx::query(
                r#"
                UPDATE weapons SET
                    name = $2, weapon_type = $3, description = $4, assigned_to = $5,
                    is_operational = $6, added_by = $7, version = $8, updated_at = $9
                WHERE id = $1 AND version = $10
                "#,
            )
            .bind(&w.id)
            .bind(&w.name)
            .bind(&w.weapon_type)
            .bind(&w.description)
            .bind(&w.assigned_to)
            .bind(w.is_operational)
            .bind(&w.added_by)
            .bind(w.version)
            .bind(w.updated_at)
            .bind(expected_version)
            .execute(&mut **tx)
            .await?;
            ensure_applied(result, EntityKind::Weapon, &w.id)?;
        }
        Change::Delete { entity, id, expected_version } => {
            let sql = match entity {
                EntityKind::User => "DELETE FROM users WHERE id = $1 AND version = $2",
                EntityKind::Task => "DELETE FROM tasks WHERE id = $1 AND version = $2",
                EntityKind::Weapon => "DELETE FROM weapons WHERE id = $1 AND version = $2",
            };
            let result = sqlx::query(sql)
                .bind(&id)
                .bind(expected_version)
                .execute(&mut **tx)
                .await?;
            ensure_applied(result, entity, &id)?;
        }
        Change::Verify { entity, id, expected_version } => {
            // FOR SHARE holds the row until the transaction ends.
            let sql = match entity {
                EntityKind::User => "SELECT 1 FROM users WHERE id = $1 AND version = $2 FOR SHARE",
                EntityKind::Task => "SELECT 1 FROM tasks WHERE id = $1 AND version = $2 FOR SHARE",
                EntityKind::Weapon => "SELECT 1 FROM weapons WHERE id = $1 AND version = $2 FOR SHARE",
            };
            let row = sqlx::query(sql)
                .bind(&id)
                .bind(expected_version)
                .fetch_optional(&mut **tx)
                .await?;
            if row.is_none() {
                return Err(stale(entity, &id));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn get_weapon(&self, id: &str) -> Result<Option<Weapon>, AppError> {
        let weapon =
            sqlx::query_as::<_, Weapon>(&format!("SELECT {WEAPON_COLUMNS} FROM weapons WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(weapon)
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>, AppError> {
        // Unset filter fields bind as NULL and drop out of the predicate.
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::text[] IS NULL OR id = ANY($1))
              AND ($2::user_role IS NULL OR role = $2)
              AND ($3::duty_status IS NULL OR status = $3)
              AND ($4::availability IS NULL OR availability = $4)
              AND ($5::text IS NULL OR sub_admin_id = $5)
            ORDER BY created_at ASC, id ASC
            "#
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(&filter.ids)
            .bind(filter.role)
            .bind(filter.status)
            .bind(filter.availability)
            .bind(&filter.sub_admin_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE ($1::text IS NULL OR assigned_by = $1)
              AND ($2::text IS NULL OR $2 = ANY(assigned_to))
            ORDER BY created_at DESC, id ASC
            "#
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(&filter.assigned_by)
            .bind(&filter.member)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn find_weapons(&self, filter: &WeaponFilter) -> Result<Vec<Weapon>, AppError> {
        let weapons = match filter {
            WeaponFilter::All => {
                sqlx::query_as::<_, Weapon>(&format!(
                    "SELECT {WEAPON_COLUMNS} FROM weapons ORDER BY created_at ASC, id ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            WeaponFilter::HeldBy(ids) => {
                sqlx::query_as::<_, Weapon>(&format!(
                    "SELECT {WEAPON_COLUMNS} FROM weapons WHERE assigned_to = ANY($1) \
                     ORDER BY created_at ASC, id ASC"
                ))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?
            }
            WeaponFilter::AvailableTo(ids) => {
                // Older records store "" for "nobody".
                sqlx::query_as::<_, Weapon>(&format!(
                    "SELECT {WEAPON_COLUMNS} FROM weapons \
                     WHERE assigned_to IS NULL OR assigned_to = '' OR assigned_to = ANY($1) \
                     ORDER BY created_at ASC, id ASC"
                ))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(weapons)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), AppError> {
        // One transaction per change set: a stale guard rolls back everything on drop.
        let mut tx = self.pool.begin().await?;
        for change in changes.changes {
            apply(&mut tx, change).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
