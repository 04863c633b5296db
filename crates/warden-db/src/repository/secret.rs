//! # Secret Repository
//!
//! SQLite implementation of [`SecretStore`].
//!
//! Secrets are never filtered by access policy here. A caller that lists a
//! project's secrets is expected to have checked the project through
//! [`ProjectStore`](crate::store::ProjectStore) first.
//!
//! A secret may only be attached to a project of its own organization.
//!
//! ## Lifecycle
//! ```text
//!   create ──► active ──► update (revision_date = now)
//!                 │
//!                 ▼
//!         soft_delete_many ──► deleted_date set
//!                              (invisible to every read and update)
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::filter::{push_id_list, ID_CHUNK};
use crate::mapping::{map_rows, SecretRow, SECRET_COLUMNS};
use crate::store::SecretStore;
use warden_core::validation::{validate_new_secret, validate_secret};
use warden_core::{CoreError, NewSecret, Secret};

/// Repository for secret database operations.
#[derive(Debug, Clone)]
pub struct SecretRepository {
    pool: SqlitePool,
}

impl SecretRepository {
    /// Creates a new SecretRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SecretRepository { pool }
    }

    fn select_active() -> QueryBuilder<'static, Sqlite> {
        QueryBuilder::new(format!(
            "SELECT {SECRET_COLUMNS} FROM secret s WHERE s.deleted_date IS NULL"
        ))
    }

    /// Rejects a project link that crosses organizations. An unknown project
    /// is left to the foreign key.
    async fn ensure_same_organization(
        &self,
        organization_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DbResult<()> {
        let Some(project_id) = project_id else {
            return Ok(());
        };

        let owner = sqlx::query_scalar::<_, String>(
            "SELECT organization_id FROM project WHERE id = ?1",
        )
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match owner {
            Some(owner) if owner != organization_id.to_string() => {
                warn!(
                    organization_id = %organization_id,
                    project_id = %project_id,
                    "Rejected secret attached to another organization's project"
                );
                Err(CoreError::cross_organization("Project", project_id).into())
            }
            _ => Ok(()),
        }
    }

    async fn fetch_ordered(&self, mut qb: QueryBuilder<'_, Sqlite>) -> DbResult<Vec<Secret>> {
        qb.push(" ORDER BY s.revision_date ASC, s.id ASC");
        let rows = qb
            .build_query_as::<SecretRow>()
            .fetch_all(&self.pool)
            .await?;
        map_rows(rows)
    }
}

#[async_trait]
impl SecretStore for SecretRepository {
    async fn list_by_organization(&self, organization_id: Uuid) -> DbResult<Vec<Secret>> {
        let mut qb = Self::select_active();
        qb.push(" AND s.organization_id = ")
            .push_bind(organization_id.to_string());

        let secrets = self.fetch_ordered(qb).await?;
        debug!(organization_id = %organization_id, count = secrets.len(), "Secrets listed");
        Ok(secrets)
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<Secret>> {
        let mut secrets = Vec::new();

        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = Self::select_active();
            qb.push(" AND s.id");
            push_id_list(&mut qb, chunk);
            secrets.extend(self.fetch_ordered(qb).await?);
        }

        debug!(requested = ids.len(), found = secrets.len(), "Secrets fetched by id");
        Ok(secrets)
    }

    async fn list_by_project(&self, project_id: Uuid) -> DbResult<Vec<Secret>> {
        let mut qb = Self::select_active();
        qb.push(" AND s.project_id = ")
            .push_bind(project_id.to_string())
            .push(" AND s.organization_id = (SELECT p.organization_id FROM project p WHERE p.id = ")
            .push_bind(project_id.to_string())
            .push(")");

        let secrets = self.fetch_ordered(qb).await?;
        debug!(project_id = %project_id, count = secrets.len(), "Project secrets listed");
        Ok(secrets)
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Secret>> {
        let mut qb = Self::select_active();
        qb.push(" AND s.id = ").push_bind(id.to_string());

        let row = qb
            .build_query_as::<SecretRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(Secret::try_from).transpose()
    }

    async fn create(&self, secret: &NewSecret) -> DbResult<Secret> {
        validate_new_secret(secret)?;
        self.ensure_same_organization(secret.organization_id, secret.project_id)
            .await?;

        let now = Utc::now();
        let created = Secret {
            id: Uuid::new_v4(),
            organization_id: secret.organization_id,
            project_id: secret.project_id,
            key: secret.key.trim().to_string(),
            value: secret.value.clone(),
            note: secret.note.clone(),
            creation_date: now,
            revision_date: now,
            deleted_date: None,
        };

        debug!(
            id = %created.id,
            organization_id = %created.organization_id,
            project_id = ?created.project_id,
            "Creating secret"
        );

        sqlx::query(
            r#"
            INSERT INTO secret (
                id, organization_id, project_id, key, value, note,
                creation_date, revision_date, deleted_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)
            "#,
        )
        .bind(created.id.to_string())
        .bind(created.organization_id.to_string())
        .bind(created.project_id.map(|id| id.to_string()))
        .bind(&created.key)
        .bind(&created.value)
        .bind(&created.note)
        .bind(created.creation_date)
        .bind(created.revision_date)
        .execute(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, secret: &Secret) -> DbResult<Secret> {
        validate_secret(secret)?;

        debug!(id = %secret.id, "Updating secret");

        // The stored organization is authoritative; it is not writable.
        let stored = self
            .get_by_id(secret.id)
            .await?
            .ok_or_else(|| DbError::not_found("Secret", secret.id))?;
        self.ensure_same_organization(stored.organization_id, secret.project_id)
            .await?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE secret SET
                project_id = ?2,
                key = ?3,
                value = ?4,
                note = ?5,
                revision_date = ?6
            WHERE id = ?1 AND deleted_date IS NULL
            "#,
        )
        .bind(secret.id.to_string())
        .bind(secret.project_id.map(|id| id.to_string()))
        .bind(secret.key.trim())
        .bind(&secret.value)
        .bind(&secret.note)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Secret", secret.id));
        }

        self.get_by_id(secret.id)
            .await?
            .ok_or_else(|| DbError::not_found("Secret", secret.id))
    }

    async fn soft_delete_many(&self, ids: &[Uuid]) -> DbResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut stamped = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new("UPDATE secret SET deleted_date = ");
            qb.push_bind(now)
                .push(", revision_date = ")
                .push_bind(now)
                .push(" WHERE deleted_date IS NULL AND id");
            push_id_list(&mut qb, chunk);
            stamped += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(requested = ids.len(), stamped, "Secrets soft-deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
