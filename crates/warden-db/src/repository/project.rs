//! # Project Repository
//!
//! SQLite implementation of [`ProjectStore`].
//!
//! ## Query Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  list_by_organization(O, principal, kind)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  for_client(kind, principal) ──► AccessPredicate                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT ... FROM project p                                              │
//! │  WHERE p.organization_id = O                                            │
//! │    AND p.deleted_date IS NULL                                           │
//! │    AND <predicate as EXISTS sub-queries>     ← filter.rs                │
//! │  ORDER BY p.revision_date, p.id                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Access checks on a single project use the same filter wrapped in
//! `SELECT EXISTS (...)`, so a soft-deleted project grants nothing.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::filter::{push_access_filter, push_id_list, ID_CHUNK};
use crate::mapping::{map_rows, ProjectRow, PROJECT_COLUMNS};
use crate::store::ProjectStore;
use warden_core::access::for_client;
use warden_core::validation::{validate_new_project, validate_project};
use warden_core::{AccessClientKind, AccessPredicate, NewProject, Project};

/// Repository for project database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProjectRepository::new(pool);
///
/// // Everything user U may read in organization O
/// let projects = repo.list_by_organization(org_id, user_id, AccessClientKind::User).await?;
///
/// // Single-project check
/// if repo.user_has_write_access(project_id, user_id).await? { ... }
/// ```
#[derive(Debug, Clone)]
pub struct ProjectRepository {
    pool: SqlitePool,
}

impl ProjectRepository {
    /// Creates a new ProjectRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProjectRepository { pool }
    }

    fn select_active() -> QueryBuilder<'static, Sqlite> {
        QueryBuilder::new(format!(
            "SELECT {PROJECT_COLUMNS} FROM project p WHERE p.deleted_date IS NULL"
        ))
    }
}

#[async_trait]
impl ProjectStore for ProjectRepository {
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Project>> {
        let mut qb = Self::select_active();
        qb.push(" AND p.id = ").push_bind(id.to_string());

        let row = qb
            .build_query_as::<ProjectRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(Project::try_from).transpose()
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        principal_id: Uuid,
        kind: AccessClientKind,
    ) -> DbResult<Vec<Project>> {
        debug!(
            organization_id = %organization_id,
            principal_id = %principal_id,
            kind = %kind,
            "Listing projects"
        );

        self.list_matching(organization_id, &for_client(kind, principal_id))
            .await
    }

    async fn list_matching(
        &self,
        organization_id: Uuid,
        predicate: &AccessPredicate,
    ) -> DbResult<Vec<Project>> {
        let mut qb = Self::select_active();
        qb.push(" AND p.organization_id = ")
            .push_bind(organization_id.to_string());
        push_access_filter(&mut qb, predicate);
        qb.push(" ORDER BY p.revision_date ASC, p.id ASC");

        let rows = qb
            .build_query_as::<ProjectRow>()
            .fetch_all(&self.pool)
            .await?;

        debug!(
            organization_id = %organization_id,
            count = rows.len(),
            "Projects listed"
        );
        map_rows(rows)
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<Project>> {
        let mut projects = Vec::new();

        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = Self::select_active();
            qb.push(" AND p.id");
            push_id_list(&mut qb, chunk);

            let rows = qb
                .build_query_as::<ProjectRow>()
                .fetch_all(&self.pool)
                .await?;
            projects.extend(map_rows::<_, Project>(rows)?);
        }

        debug!(requested = ids.len(), found = projects.len(), "Projects fetched by id");
        Ok(projects)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DbResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        // Policies cascade; secrets are detached (project_id set to NULL).
        let mut removed = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM project WHERE id");
            push_id_list(&mut qb, chunk);
            removed += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(requested = ids.len(), removed, "Projects deleted");
        Ok(())
    }

    async fn has_access(&self, project_id: Uuid, predicate: &AccessPredicate) -> DbResult<bool> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT EXISTS (SELECT 1 FROM project p WHERE p.deleted_date IS NULL AND p.id = ",
        );
        qb.push_bind(project_id.to_string());
        push_access_filter(&mut qb, predicate);
        qb.push(")");

        let found = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        debug!(project_id = %project_id, ?predicate, granted = found != 0, "Access check");
        Ok(found != 0)
    }

    async fn create(&self, project: &NewProject) -> DbResult<Project> {
        validate_new_project(project)?;

        let now = Utc::now();
        let created = Project {
            id: Uuid::new_v4(),
            organization_id: project.organization_id,
            name: project.name.trim().to_string(),
            creation_date: now,
            revision_date: now,
            deleted_date: None,
        };

        debug!(id = %created.id, organization_id = %created.organization_id, "Creating project");

        sqlx::query(
            r#"
            INSERT INTO project (id, organization_id, name, creation_date, revision_date, deleted_date)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL)
            "#,
        )
        .bind(created.id.to_string())
        .bind(created.organization_id.to_string())
        .bind(&created.name)
        .bind(created.creation_date)
        .bind(created.revision_date)
        .execute(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, project: &Project) -> DbResult<Project> {
        validate_project(project)?;

        debug!(id = %project.id, "Updating project");

        let now = Utc::now();
        let name = project.name.trim().to_string();

        let result = sqlx::query(
            r#"
            UPDATE project SET
                name = ?2,
                revision_date = ?3
            WHERE id = ?1 AND deleted_date IS NULL
            "#,
        )
        .bind(project.id.to_string())
        .bind(&name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Project", project.id));
        }

        // Identity and creation date are not writable.
        self.get_by_id(project.id)
            .await?
            .ok_or_else(|| DbError::not_found("Project", project.id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{insert_policy_row, set_revision, Org};
    use crate::store::SecretStore;
    use warden_core::access::{
        has_read_access, has_service_account_read_access, has_write_access, visible_projects,
    };
    use warden_core::{AccessPolicy, CoreError, Grantee, NewSecret};

    #[tokio::test]
    async fn test_group_scenario_lists_only_active_project() {
        // Organization O: P1 active, P2 soft-deleted. User U belongs to group
        // G which reads both.
        let org = Org::new().await;
        let p1 = org.project("P1", 1).await;
        let p2 = org.project("P2", 2).await;
        org.soft_delete_project(p2.id).await;
        org.grant(Grantee::Group { group_id: org.group }, p1.id, true, false).await;
        org.grant(Grantee::Group { group_id: org.group }, p2.id, true, false).await;

        let listed = org
            .db
            .projects()
            .list_by_organization(org.id, org.user, AccessClientKind::User)
            .await
            .unwrap();

        assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![p1.id]);
    }

    async fn list_by_code(org: &Org, code: i32) -> DbResult<Vec<Project>> {
        let kind = AccessClientKind::try_from(code)?;
        org.db
            .projects()
            .list_by_organization(org.id, org.user, kind)
            .await
    }

    #[tokio::test]
    async fn test_unknown_client_kind_code_fails() {
        let org = Org::new().await;
        org.project("P1", 1).await;

        let err = list_by_code(&org, 99).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidArgument {
                argument: "access_client_kind",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_no_access_check_lists_whole_organization_in_revision_order() {
        let org = Org::new().await;
        let late = org.project("late", 30).await;
        let early = org.project("early", 5).await;
        let deleted = org.project("gone", 10).await;
        org.soft_delete_project(deleted.id).await;

        // Another organization's project is never included.
        let other = Org::with_db(org.db.clone()).await;
        other.project("foreign", 1).await;

        let listed = org
            .db
            .projects()
            .list_by_organization(org.id, Uuid::new_v4(), AccessClientKind::NoAccessCheck)
            .await
            .unwrap();

        assert_eq!(
            listed.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![early.id, late.id]
        );
    }

    #[tokio::test]
    async fn test_service_account_listing_ignores_group_grants() {
        let org = Org::new().await;
        let granted = org.project("granted", 1).await;
        let via_group = org.project("group-only", 2).await;
        org.grant(
            Grantee::ServiceAccount { service_account_id: org.service_account },
            granted.id,
            true,
            false,
        )
        .await;
        org.grant(Grantee::Group { group_id: org.group }, via_group.id, true, true).await;

        let listed = org
            .db
            .projects()
            .list_by_organization(org.id, org.service_account, AccessClientKind::ServiceAccount)
            .await
            .unwrap();

        assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![granted.id]);
    }

    #[tokio::test]
    async fn test_user_access_rules() {
        let org = Org::new().await;
        let direct = org.project("direct", 1).await;
        let grouped = org.project("grouped", 2).await;
        let none = org.project("none", 3).await;
        org.grant(
            Grantee::User { organization_user_id: org.organization_user },
            direct.id,
            true,
            false,
        )
        .await;
        org.grant(Grantee::Group { group_id: org.group }, grouped.id, false, true).await;

        let projects = org.db.projects();
        assert!(projects.user_has_read_access(direct.id, org.user).await.unwrap());
        assert!(!projects.user_has_write_access(direct.id, org.user).await.unwrap());
        assert!(!projects.user_has_read_access(grouped.id, org.user).await.unwrap());
        assert!(projects.user_has_write_access(grouped.id, org.user).await.unwrap());
        assert!(!projects.user_has_read_access(none.id, org.user).await.unwrap());
        assert!(!projects.user_has_write_access(none.id, org.user).await.unwrap());

        // A stranger sees nothing.
        let stranger = Uuid::new_v4();
        assert!(!projects.user_has_read_access(direct.id, stranger).await.unwrap());
    }

    #[tokio::test]
    async fn test_service_account_access_rules() {
        let org = Org::new().await;
        let project = org.project("api", 1).await;
        org.grant(Grantee::Group { group_id: org.group }, project.id, true, true).await;

        let projects = org.db.projects();
        assert!(!projects
            .service_account_has_read_access(project.id, org.service_account)
            .await
            .unwrap());

        org.grant(
            Grantee::ServiceAccount { service_account_id: org.service_account },
            project.id,
            true,
            false,
        )
        .await;
        assert!(projects
            .service_account_has_read_access(project.id, org.service_account)
            .await
            .unwrap());
        assert!(!projects
            .service_account_has_write_access(project.id, org.service_account)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_deleted_project_grants_nothing() {
        let org = Org::new().await;
        let project = org.project("old", 1).await;
        org.grant(
            Grantee::User { organization_user_id: org.organization_user },
            project.id,
            true,
            true,
        )
        .await;
        org.soft_delete_project(project.id).await;

        let projects = org.db.projects();
        assert!(!projects.user_has_read_access(project.id, org.user).await.unwrap());
        assert!(projects.get_by_id(project.id).await.unwrap().is_none());
        assert!(projects.list_by_ids(&[project.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_ids_returns_active_subset() {
        let org = Org::new().await;
        let a = org.project("a", 1).await;
        let b = org.project("b", 2).await;
        let deleted = org.project("c", 3).await;
        org.soft_delete_project(deleted.id).await;

        let projects = org.db.projects();
        assert!(projects.list_by_ids(&[]).await.unwrap().is_empty());

        let mut found: Vec<Uuid> = projects
            .list_by_ids(&[a.id, b.id, deleted.id, Uuid::new_v4()])
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        found.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn test_delete_many_is_idempotent_and_detaches_secrets() {
        let org = Org::new().await;
        let doomed = org.project("doomed", 1).await;
        let kept = org.project("kept", 2).await;
        org.grant(Grantee::Group { group_id: org.group }, doomed.id, true, true).await;

        let secret = org
            .db
            .secrets()
            .create(&NewSecret {
                organization_id: org.id,
                project_id: Some(doomed.id),
                key: "DB_PASSWORD".to_string(),
                value: "hunter2".to_string(),
                note: None,
            })
            .await
            .unwrap();

        let projects = org.db.projects();
        projects.delete_many(&[doomed.id]).await.unwrap();
        projects.delete_many(&[doomed.id]).await.unwrap();
        projects.delete_many(&[]).await.unwrap();

        assert!(projects.get_by_id(doomed.id).await.unwrap().is_none());
        assert!(projects.get_by_id(kept.id).await.unwrap().is_some());
        assert!(org
            .db
            .access_policies()
            .list_by_project(doomed.id)
            .await
            .unwrap()
            .is_empty());

        let orphan = org.db.secrets().get_by_id(secret.id).await.unwrap().unwrap();
        assert_eq!(orphan.project_id, None);
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let projects = db.projects();

        let created = projects
            .create(&NewProject {
                organization_id: Uuid::new_v4(),
                name: "  payments  ".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.name, "payments");
        assert_eq!(created.creation_date, created.revision_date);

        let mut renamed = created.clone();
        renamed.name = "payments-v2".to_string();
        let updated = projects.update(&renamed).await.unwrap();
        assert_eq!(updated.name, "payments-v2");
        assert_eq!(updated.creation_date, created.creation_date);
        assert!(updated.revision_date >= created.revision_date);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .projects()
            .create(&NewProject {
                organization_id: Uuid::new_v4(),
                name: "   ".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_missing_or_deleted_is_not_found() {
        let org = Org::new().await;
        let project = org.project("temp", 1).await;
        org.soft_delete_project(project.id).await;

        let err = org.db.projects().update(&project).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let mut ghost = project.clone();
        ghost.id = Uuid::new_v4();
        let err = org.db.projects().update(&ghost).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sql_filter_agrees_with_in_memory_evaluation() {
        let org = Org::new().await;
        let mut projects = Vec::new();
        for i in 0..6 {
            projects.push(org.project(&format!("p{i}"), i).await);
        }
        org.grant(
            Grantee::User { organization_user_id: org.organization_user },
            projects[0].id,
            true,
            false,
        )
        .await;
        org.grant(Grantee::Group { group_id: org.group }, projects[1].id, false, true).await;
        org.grant(Grantee::Group { group_id: org.group }, projects[2].id, true, true).await;
        org.grant(
            Grantee::ServiceAccount { service_account_id: org.service_account },
            projects[3].id,
            true,
            true,
        )
        .await;
        org.soft_delete_project(projects[2].id).await;

        // Stray grants from a second organization on this one's projects.
        let other = Org::with_db(org.db.clone()).await;
        for grantee in [
            Grantee::User { organization_user_id: other.organization_user },
            Grantee::Group { group_id: other.group },
            Grantee::ServiceAccount { service_account_id: other.service_account },
        ] {
            insert_policy_row(&org.db, &AccessPolicy::new(grantee, projects[4].id, true, true))
                .await;
        }

        let graph = org.db.access_policies().load_graph(org.id).await.unwrap();
        let stored: Vec<Project> = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM project p"
        ))
        .fetch_all(org.db.pool())
        .await
        .unwrap()
        .into_iter()
        .map(|row| Project::try_from(row).unwrap())
        .collect();

        for predicate in [
            AccessPredicate::Unrestricted,
            has_read_access(org.user),
            has_write_access(org.user),
            has_service_account_read_access(org.service_account),
            has_read_access(Uuid::new_v4()),
            has_read_access(other.user),
            has_write_access(other.user),
            has_service_account_read_access(other.service_account),
        ] {
            let from_sql = org.db.projects().list_matching(org.id, &predicate).await.unwrap();
            let in_memory = visible_projects(&stored, org.id, &predicate, &graph);
            assert_eq!(from_sql, in_memory, "predicate {predicate:?}");
        }
    }

    #[tokio::test]
    async fn test_foreign_grants_never_open_a_project() {
        let org = Org::new().await;
        let project = org.project("vault", 1).await;
        let other = Org::with_db(org.db.clone()).await;

        // The other organization's user is also a plain member here, with no
        // grants of its own in this organization.
        org.db
            .memberships()
            .add_organization_user(org.id, other.user)
            .await
            .unwrap();

        for grantee in [
            Grantee::User { organization_user_id: other.organization_user },
            Grantee::Group { group_id: other.group },
            Grantee::ServiceAccount { service_account_id: other.service_account },
        ] {
            insert_policy_row(&org.db, &AccessPolicy::new(grantee, project.id, true, true)).await;
        }

        let projects = org.db.projects();
        assert!(projects
            .list_by_organization(org.id, other.user, AccessClientKind::User)
            .await
            .unwrap()
            .is_empty());
        assert!(projects
            .list_by_organization(org.id, other.service_account, AccessClientKind::ServiceAccount)
            .await
            .unwrap()
            .is_empty());
        assert!(!projects.user_has_read_access(project.id, other.user).await.unwrap());
        assert!(!projects.user_has_write_access(project.id, other.user).await.unwrap());
        assert!(!projects
            .service_account_has_read_access(project.id, other.service_account)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_grants_stay_within_their_organization() {
        let org = Org::new().await;
        let ours = org.project("ours", 1).await;
        let other = Org::with_db(org.db.clone()).await;
        let theirs = other.project("theirs", 1).await;
        other.grant(Grantee::Group { group_id: other.group }, theirs.id, true, true).await;
        org.grant(Grantee::Group { group_id: org.group }, ours.id, true, false).await;

        let listed = org
            .db
            .projects()
            .list_by_organization(org.id, other.user, AccessClientKind::User)
            .await
            .unwrap();
        assert!(listed.is_empty());

        let listed = other
            .db
            .projects()
            .list_by_organization(other.id, other.user, AccessClientKind::User)
            .await
            .unwrap();
        assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![theirs.id]);
        assert!(!org.db.projects().user_has_read_access(ours.id, other.user).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_follows_revision_date() {
        let org = Org::new().await;
        let first = org.project("first", 1).await;
        let second = org.project("second", 2).await;
        set_revision(&org.db, "project", first.id, 5).await;

        let listed = org
            .db
            .projects()
            .list_by_organization(org.id, org.user, AccessClientKind::NoAccessCheck)
            .await
            .unwrap();
        assert_eq!(
            listed.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }
}
