//! # Access Policy Repository
//!
//! Stores user, group and service-account grants in the single
//! `access_policy` table. The `discriminator` column says which of the three
//! grantee columns is set; the schema rejects any other combination.
//!
//! ## Storage Layout
//! ```text
//! ┌────────────────┬──────────────────────┬──────────┬────────────────────┐
//! │ discriminator  │ organization_user_id │ group_id │ service_account_id │
//! ├────────────────┼──────────────────────┼──────────┼────────────────────┤
//! │ user           │ ✔                    │          │                    │
//! │ group          │                      │ ✔        │                    │
//! │ service_account│                      │          │ ✔                  │
//! └────────────────┴──────────────────────┴──────────┴────────────────────┘
//! ```
//!
//! A grantee must belong to the same organization as the project it is
//! granted on.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::filter::{push_id_list, ID_CHUNK};
use crate::mapping::{
    grantee_columns, grantee_owner, map_rows, AccessPolicyRow, GroupUserRow, NamedPrincipalRow,
    OrganizationUserRow, ACCESS_POLICY_COLUMNS,
};
use warden_core::{
    AccessGraph, AccessPolicy, CoreError, Group, GroupUser, OrganizationUser, ServiceAccount,
};

/// Repository for access policies.
#[derive(Debug, Clone)]
pub struct AccessPolicyRepository {
    pool: SqlitePool,
}

impl AccessPolicyRepository {
    /// Creates a new AccessPolicyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccessPolicyRepository { pool }
    }

    /// Inserts all policies in one transaction.
    ///
    /// Either every policy is stored or none is.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - Unknown project or grantee
    /// * `Err(DbError::Domain(CoreError::CrossOrganization))` - Grantee belongs
    ///   to another organization than the project
    pub async fn create_many(&self, policies: &[AccessPolicy]) -> DbResult<()> {
        if policies.is_empty() {
            return Ok(());
        }

        debug!(count = policies.len(), "Creating access policies");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for policy in policies {
            let (table, entity, grantee_id) = grantee_owner(&policy.grantee);
            let same_organization = sqlx::query_scalar::<_, i64>(&format!(
                "SELECT p.organization_id = o.organization_id FROM project p, {table} o \
                 WHERE p.id = ?1 AND o.id = ?2"
            ))
            .bind(policy.granted_project_id.to_string())
            .bind(grantee_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

            // A missing project or grantee is left to the foreign keys.
            if same_organization == Some(0) {
                warn!(
                    project_id = %policy.granted_project_id,
                    grantee_id = %grantee_id,
                    "Rejected cross-organization grant"
                );
                return Err(CoreError::cross_organization(entity, grantee_id).into());
            }

            let (organization_user_id, group_id, service_account_id) =
                grantee_columns(&policy.grantee);

            sqlx::query(
                r#"
                INSERT INTO access_policy (
                    id, discriminator, organization_user_id, group_id, service_account_id,
                    granted_project_id, read, write, creation_date, revision_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(policy.id.to_string())
            .bind(policy.grantee.discriminator())
            .bind(organization_user_id)
            .bind(group_id)
            .bind(service_account_id)
            .bind(policy.granted_project_id.to_string())
            .bind(policy.read)
            .bind(policy.write)
            .bind(policy.creation_date)
            .bind(policy.revision_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(count = policies.len(), "Access policies created");
        Ok(())
    }

    /// Lists every policy granted on a project, oldest first.
    pub async fn list_by_project(&self, project_id: Uuid) -> DbResult<Vec<AccessPolicy>> {
        let sql = format!(
            "SELECT {ACCESS_POLICY_COLUMNS} FROM access_policy ap \
             WHERE ap.granted_project_id = ?1 \
             ORDER BY ap.creation_date ASC, ap.id ASC"
        );

        let rows = sqlx::query_as::<_, AccessPolicyRow>(&sql)
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        debug!(project_id = %project_id, count = rows.len(), "Listed access policies");
        map_rows(rows)
    }

    /// Deletes the given policies. Unknown ids are ignored.
    pub async fn delete_many(&self, ids: &[Uuid]) -> DbResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut removed = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM access_policy WHERE id");
            push_id_list(&mut qb, chunk);
            removed += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(requested = ids.len(), removed, "Deleted access policies");
        Ok(())
    }

    /// Loads the organization's policies and memberships into an [`AccessGraph`].
    ///
    /// Used to evaluate predicates in memory, e.g. to cross-check the SQL
    /// filters or to explain why a principal sees a project.
    pub async fn load_graph(&self, organization_id: Uuid) -> DbResult<AccessGraph> {
        let org = organization_id.to_string();

        let policy_sql = format!(
            "SELECT {ACCESS_POLICY_COLUMNS} FROM access_policy ap \
             INNER JOIN project p ON p.id = ap.granted_project_id \
             WHERE p.organization_id = ?1"
        );
        let policies: Vec<AccessPolicy> = map_rows(
            sqlx::query_as::<_, AccessPolicyRow>(&policy_sql)
                .bind(&org)
                .fetch_all(&self.pool)
                .await?,
        )?;

        let organization_users: Vec<OrganizationUser> = map_rows(
            sqlx::query_as::<_, OrganizationUserRow>(
                "SELECT id, organization_id, user_id FROM organization_user WHERE organization_id = ?1",
            )
            .bind(&org)
            .fetch_all(&self.pool)
            .await?,
        )?;

        let groups: Vec<Group> = map_rows(
            sqlx::query_as::<_, NamedPrincipalRow>(
                "SELECT id, organization_id, name FROM access_group WHERE organization_id = ?1",
            )
            .bind(&org)
            .fetch_all(&self.pool)
            .await?,
        )?;

        let service_accounts: Vec<ServiceAccount> = map_rows(
            sqlx::query_as::<_, NamedPrincipalRow>(
                "SELECT id, organization_id, name FROM service_account WHERE organization_id = ?1",
            )
            .bind(&org)
            .fetch_all(&self.pool)
            .await?,
        )?;

        let group_users: Vec<GroupUser> = map_rows(
            sqlx::query_as::<_, GroupUserRow>(
                "SELECT gu.group_id, gu.organization_user_id FROM group_user gu \
                 INNER JOIN access_group g ON g.id = gu.group_id \
                 WHERE g.organization_id = ?1",
            )
            .bind(&org)
            .fetch_all(&self.pool)
            .await?,
        )?;

        debug!(
            organization_id = %organization_id,
            policies = policies.len(),
            organization_users = organization_users.len(),
            groups = groups.len(),
            group_users = group_users.len(),
            service_accounts = service_accounts.len(),
            "Loaded access graph"
        );

        let mut graph = AccessGraph::new();
        for policy in policies {
            graph.add_policy(policy);
        }
        for organization_user in organization_users {
            graph.add_organization_user(organization_user);
        }
        for group in &groups {
            graph.add_group(group);
        }
        for group_user in group_users {
            graph.add_group_user(group_user);
        }
        for service_account in &service_accounts {
            graph.add_service_account(service_account);
        }
        Ok(graph)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::store::ProjectStore;
    use warden_core::{Grantee, NewProject};

    async fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let org = Uuid::new_v4();
        let project = db
            .projects()
            .create(&NewProject {
                organization_id: org,
                name: "billing".to_string(),
            })
            .await
            .unwrap();
        (db, org, project.id)
    }

    #[tokio::test]
    async fn test_create_and_list_each_grantee_kind() {
        let (db, org, project_id) = setup().await;
        let members = db.memberships();
        let ou = members.add_organization_user(org, Uuid::new_v4()).await.unwrap();
        let group = members.add_group(org, "devs").await.unwrap();
        let sa = members.add_service_account(org, "ci").await.unwrap();

        let policies = vec![
            AccessPolicy::new(Grantee::User { organization_user_id: ou.id }, project_id, true, false),
            AccessPolicy::new(Grantee::Group { group_id: group.id }, project_id, true, true),
            AccessPolicy::new(
                Grantee::ServiceAccount { service_account_id: sa.id },
                project_id,
                false,
                true,
            ),
        ];
        db.access_policies().create_many(&policies).await.unwrap();

        let mut stored = db.access_policies().list_by_project(project_id).await.unwrap();
        stored.sort_by_key(|p| p.id);
        let mut expected = policies.clone();
        expected.sort_by_key(|p| p.id);

        assert_eq!(stored.len(), 3);
        for (s, e) in stored.iter().zip(&expected) {
            assert_eq!(s.grantee, e.grantee);
            assert_eq!((s.read, s.write), (e.read, e.write));
        }
    }

    #[tokio::test]
    async fn test_create_many_is_all_or_nothing() {
        let (db, org, project_id) = setup().await;
        let ou = db
            .memberships()
            .add_organization_user(org, Uuid::new_v4())
            .await
            .unwrap();

        let policies = vec![
            AccessPolicy::new(Grantee::User { organization_user_id: ou.id }, project_id, true, false),
            // Group that doesn't exist
            AccessPolicy::new(Grantee::Group { group_id: Uuid::new_v4() }, project_id, true, false),
        ];

        let err = db.access_policies().create_many(&policies).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.access_policies().list_by_project(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_many_rejects_grantees_of_another_organization() {
        let (db, _, project_id) = setup().await;
        let members = db.memberships();
        let other_org = Uuid::new_v4();
        let ou = members.add_organization_user(other_org, Uuid::new_v4()).await.unwrap();
        let group = members.add_group(other_org, "outsiders").await.unwrap();
        let sa = members.add_service_account(other_org, "intruder").await.unwrap();

        for grantee in [
            Grantee::User { organization_user_id: ou.id },
            Grantee::Group { group_id: group.id },
            Grantee::ServiceAccount { service_account_id: sa.id },
        ] {
            let err = db
                .access_policies()
                .create_many(&[AccessPolicy::new(grantee, project_id, true, true)])
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::Domain(CoreError::CrossOrganization { .. })));
        }
        assert!(db.access_policies().list_by_project(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cross_organization_grant_rolls_back_the_batch() {
        let (db, org, project_id) = setup().await;
        let members = db.memberships();
        let insider = members.add_group(org, "insiders").await.unwrap();
        let outsider = members.add_group(Uuid::new_v4(), "outsiders").await.unwrap();

        let err = db
            .access_policies()
            .create_many(&[
                AccessPolicy::new(Grantee::Group { group_id: insider.id }, project_id, true, false),
                AccessPolicy::new(Grantee::Group { group_id: outsider.id }, project_id, true, false),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::CrossOrganization { .. })));
        assert!(db.access_policies().list_by_project(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_many_ignores_unknown_ids() {
        let (db, org, project_id) = setup().await;
        let sa = db.memberships().add_service_account(org, "deploy").await.unwrap();
        let policy = AccessPolicy::new(
            Grantee::ServiceAccount { service_account_id: sa.id },
            project_id,
            true,
            false,
        );
        db.access_policies().create_many(&[policy.clone()]).await.unwrap();

        db.access_policies()
            .delete_many(&[policy.id, Uuid::new_v4()])
            .await
            .unwrap();
        db.access_policies().delete_many(&[policy.id]).await.unwrap();

        assert!(db.access_policies().list_by_project(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_graph_is_scoped_to_organization() {
        let (db, org, project_id) = setup().await;
        let members = db.memberships();
        let user = Uuid::new_v4();
        let ou = members.add_organization_user(org, user).await.unwrap();
        let group = members.add_group(org, "readers").await.unwrap();
        members.add_group_member(group.id, ou.id).await.unwrap();
        db.access_policies()
            .create_many(&[AccessPolicy::new(
                Grantee::Group { group_id: group.id },
                project_id,
                true,
                false,
            )])
            .await
            .unwrap();

        let graph = db.access_policies().load_graph(org).await.unwrap();
        assert!(warden_core::access::has_read_access(user).matches(project_id, &graph));

        let other = db.access_policies().load_graph(Uuid::new_v4()).await.unwrap();
        assert_eq!(other.policies_for_project(project_id).count(), 0);
    }
}
