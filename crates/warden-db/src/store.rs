//! # Store Contracts
//!
//! The capabilities the service layer programs against. SQLite
//! implementations live in [`crate::repository`]; the traits are object
//! safe so a process can hold them as `Arc<dyn ProjectStore>`.
//!
//! ## Division of Labour
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProjectStore   filters by access predicate INSIDE the query           │
//! │  SecretStore    never filters by access; callers check the project     │
//! │                 through ProjectStore before touching secrets           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method runs on its own pooled connection; none of them retry.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DbResult;
use warden_core::{AccessClientKind, AccessPredicate, NewProject, NewSecret, Project, Secret};

/// Project lookup, listing, deletion and access decisions.
#[async_trait]
pub trait ProjectStore: Send + Sync + 'static {
    /// Returns the project unless it is missing or soft-deleted.
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Project>>;

    /// Lists the organization's active projects visible to `principal_id`
    /// under `kind`, oldest revision first.
    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        principal_id: Uuid,
        kind: AccessClientKind,
    ) -> DbResult<Vec<Project>>;

    /// Lists the organization's active projects admitted by `predicate`,
    /// oldest revision first.
    async fn list_matching(
        &self,
        organization_id: Uuid,
        predicate: &AccessPredicate,
    ) -> DbResult<Vec<Project>>;

    /// Returns the active subset of `ids`. Unknown ids are dropped.
    async fn list_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<Project>>;

    /// Physically removes the projects in one transaction. Absent ids are
    /// ignored, so repeating the call is harmless.
    async fn delete_many(&self, ids: &[Uuid]) -> DbResult<()>;

    /// Returns true if the active project `project_id` satisfies `predicate`.
    async fn has_access(&self, project_id: Uuid, predicate: &AccessPredicate) -> DbResult<bool>;

    async fn user_has_read_access(&self, project_id: Uuid, user_id: Uuid) -> DbResult<bool> {
        self.has_access(project_id, &warden_core::access::has_read_access(user_id))
            .await
    }

    async fn user_has_write_access(&self, project_id: Uuid, user_id: Uuid) -> DbResult<bool> {
        self.has_access(project_id, &warden_core::access::has_write_access(user_id))
            .await
    }

    async fn service_account_has_read_access(
        &self,
        project_id: Uuid,
        service_account_id: Uuid,
    ) -> DbResult<bool> {
        self.has_access(
            project_id,
            &warden_core::access::has_service_account_read_access(service_account_id),
        )
        .await
    }

    async fn service_account_has_write_access(
        &self,
        project_id: Uuid,
        service_account_id: Uuid,
    ) -> DbResult<bool> {
        self.has_access(
            project_id,
            &warden_core::access::has_service_account_write_access(service_account_id),
        )
        .await
    }

    /// Creates a project with a fresh id and timestamps.
    async fn create(&self, project: &NewProject) -> DbResult<Project>;

    /// Saves the project's mutable fields and refreshes its revision date.
    ///
    /// Fails with `NotFound` if the project is missing or soft-deleted.
    async fn update(&self, project: &Project) -> DbResult<Project>;
}

/// Secret lookup, listing and lifecycle. No access filtering.
#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    /// Active secrets of the organization, oldest revision first.
    async fn list_by_organization(&self, organization_id: Uuid) -> DbResult<Vec<Secret>>;

    /// Active subset of `ids`.
    async fn list_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<Secret>>;

    /// Active secrets attached to the project, oldest revision first.
    async fn list_by_project(&self, project_id: Uuid) -> DbResult<Vec<Secret>>;

    /// Returns the secret unless it is missing or soft-deleted.
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Secret>>;

    /// Creates a secret with a fresh id and timestamps.
    async fn create(&self, secret: &NewSecret) -> DbResult<Secret>;

    /// Saves the secret's mutable fields and refreshes its revision date.
    ///
    /// Fails with `NotFound` if the secret is missing or soft-deleted.
    async fn update(&self, secret: &Secret) -> DbResult<Secret>;

    /// Stamps `deleted_date` on every active secret in `ids`. Missing and
    /// already-deleted ids are ignored.
    async fn soft_delete_many(&self, ids: &[Uuid]) -> DbResult<()>;
}
