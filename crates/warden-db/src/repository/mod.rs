//! # Repository Module
//!
//! SQLite repositories for Warden.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Service layer                                                          │
//! │       │                                                                 │
//! │       │  registry.projects.list_by_organization(org, user, kind)        │
//! │       ▼                                                                 │
//! │  dyn ProjectStore / dyn SecretStore   (store.rs)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProjectRepository        SecretRepository                              │
//! │  ├── list_by_organization ├── list_by_organization                      │
//! │  ├── has_access           ├── list_by_project                           │
//! │  ├── delete_many          ├── update                                    │
//! │  └── ...                  └── soft_delete_many                          │
//! │       │                                                                 │
//! │       │  SQL + EXISTS filters (filter.rs)                               │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  AccessPolicyRepository and MembershipRepository maintain the grants    │
//! │  and principal graph the filters read.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProjectRepository`] - Project lookup, access-filtered listing, deletion
//! - [`SecretRepository`] - Secret lifecycle and listing
//! - [`AccessPolicyRepository`] - User, group and service-account grants
//! - [`MembershipRepository`] - Organization users, groups, service accounts

pub mod access_policy;
pub mod membership;
pub mod project;
pub mod secret;

pub use access_policy::AccessPolicyRepository;
pub use membership::MembershipRepository;
pub use project::ProjectRepository;
pub use secret::SecretRepository;

/// Shared fixtures for repository tests.
#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use crate::mapping::grantee_columns;
    use crate::pool::{Database, DbConfig};
    use crate::store::ProjectStore;
    use warden_core::{AccessPolicy, Grantee, NewProject, Project};

    /// Forces a row's revision date to `base_time() + minutes`.
    pub async fn set_revision(db: &Database, table: &str, id: Uuid, minutes: i64) {
        let sql = format!("UPDATE {table} SET revision_date = ?1 WHERE id = ?2");
        sqlx::query(&sql)
            .bind(Org::base_time() + Duration::minutes(minutes))
            .bind(id.to_string())
            .execute(db.pool())
            .await
            .unwrap();
    }

    /// Writes a policy row directly, skipping the repository's organization
    /// check. Stands in for rows left behind by older writers.
    pub async fn insert_policy_row(db: &Database, policy: &AccessPolicy) {
        let (organization_user_id, group_id, service_account_id) =
            grantee_columns(&policy.grantee);
        sqlx::query(
            "INSERT INTO access_policy (id, discriminator, organization_user_id, group_id, \
             service_account_id, granted_project_id, read, write, creation_date, revision_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
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
        .execute(db.pool())
        .await
        .unwrap();
    }

    /// An organization with one user who belongs to one group, plus one
    /// service account.
    pub struct Org {
        pub db: Database,
        pub id: Uuid,
        pub user: Uuid,
        pub organization_user: Uuid,
        pub group: Uuid,
        pub service_account: Uuid,
    }

    impl Org {
        pub async fn new() -> Self {
            let db = Database::new(DbConfig::in_memory()).await.unwrap();
            Self::with_db(db).await
        }

        pub async fn with_db(db: Database) -> Self {
            let id = Uuid::new_v4();
            let user = Uuid::new_v4();
            let members = db.memberships();

            let organization_user = members.add_organization_user(id, user).await.unwrap();
            let group = members.add_group(id, "engineering").await.unwrap();
            members
                .add_group_member(group.id, organization_user.id)
                .await
                .unwrap();
            let service_account = members.add_service_account(id, "ci").await.unwrap();

            Org {
                db,
                id,
                user,
                organization_user: organization_user.id,
                group: group.id,
                service_account: service_account.id,
            }
        }

        pub fn base_time() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        }

        /// Creates a project whose revision date is `minutes` past the base time.
        pub async fn project(&self, name: &str, minutes: i64) -> Project {
            let projects = self.db.projects();
            let created = projects
                .create(&NewProject {
                    organization_id: self.id,
                    name: name.to_string(),
                })
                .await
                .unwrap();
            set_revision(&self.db, "project", created.id, minutes).await;
            projects.get_by_id(created.id).await.unwrap().unwrap()
        }

        pub async fn soft_delete_project(&self, id: Uuid) {
            sqlx::query("UPDATE project SET deleted_date = ?1 WHERE id = ?2")
                .bind(Utc::now())
                .bind(id.to_string())
                .execute(self.db.pool())
                .await
                .unwrap();
        }

        pub async fn grant(&self, grantee: Grantee, project_id: Uuid, read: bool, write: bool) {
            self.db
                .access_policies()
                .create_many(&[AccessPolicy::new(grantee, project_id, read, write)])
                .await
                .unwrap();
        }
    }
}
