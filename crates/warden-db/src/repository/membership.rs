//! # Membership Repository
//!
//! Writes the principal graph the access predicates walk: organization
//! users, groups, group members and service accounts.
//!
//! ```text
//! organization_user ──┐
//!        ▲            │ group_user
//!        │            ▼
//!   user policy   access_group ◄── group policy
//!
//! service_account ◄── service-account policy
//! ```

use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use warden_core::{CoreError, Group, GroupUser, OrganizationUser, ServiceAccount};

/// Repository for organization users, groups and service accounts.
#[derive(Debug, Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    /// Creates a new MembershipRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MembershipRepository { pool }
    }

    /// Adds a user to an organization.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - User already belongs to the organization
    pub async fn add_organization_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<OrganizationUser> {
        let organization_user = OrganizationUser {
            id: Uuid::new_v4(),
            organization_id,
            user_id,
        };

        debug!(
            organization_id = %organization_id,
            user_id = %user_id,
            "Adding organization user"
        );

        sqlx::query("INSERT INTO organization_user (id, organization_id, user_id) VALUES (?1, ?2, ?3)")
            .bind(organization_user.id.to_string())
            .bind(organization_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, user_id.to_string()),
                other => other,
            })?;

        Ok(organization_user)
    }

    /// Creates a group.
    pub async fn add_group(&self, organization_id: Uuid, name: &str) -> DbResult<Group> {
        let group = Group {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
        };

        debug!(organization_id = %organization_id, name = %name, "Adding group");

        sqlx::query("INSERT INTO access_group (id, organization_id, name) VALUES (?1, ?2, ?3)")
            .bind(group.id.to_string())
            .bind(organization_id.to_string())
            .bind(&group.name)
            .execute(&self.pool)
            .await?;

        Ok(group)
    }

    /// Puts an organization user into a group. Adding an existing member is a no-op.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - Group or organization user doesn't exist
    /// * `Err(DbError::Domain(CoreError::CrossOrganization))` - The two belong
    ///   to different organizations
    pub async fn add_group_member(
        &self,
        group_id: Uuid,
        organization_user_id: Uuid,
    ) -> DbResult<GroupUser> {
        debug!(
            group_id = %group_id,
            organization_user_id = %organization_user_id,
            "Adding group member"
        );

        let same_organization = sqlx::query_scalar::<_, i64>(
            "SELECT g.organization_id = ou.organization_id \
             FROM access_group g, organization_user ou WHERE g.id = ?1 AND ou.id = ?2",
        )
        .bind(group_id.to_string())
        .bind(organization_user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        if same_organization == Some(0) {
            warn!(
                group_id = %group_id,
                organization_user_id = %organization_user_id,
                "Rejected cross-organization group member"
            );
            return Err(CoreError::cross_organization("OrganizationUser", organization_user_id).into());
        }

        sqlx::query(
            "INSERT INTO group_user (group_id, organization_user_id) VALUES (?1, ?2) \
             ON CONFLICT (group_id, organization_user_id) DO NOTHING",
        )
        .bind(group_id.to_string())
        .bind(organization_user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(GroupUser {
            group_id,
            organization_user_id,
        })
    }

    /// Creates a service account.
    pub async fn add_service_account(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> DbResult<ServiceAccount> {
        let service_account = ServiceAccount {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
        };

        debug!(organization_id = %organization_id, name = %name, "Adding service account");

        sqlx::query("INSERT INTO service_account (id, organization_id, name) VALUES (?1, ?2, ?3)")
            .bind(service_account.id.to_string())
            .bind(organization_id.to_string())
            .bind(&service_account.name)
            .execute(&self.pool)
            .await?;

        Ok(service_account)
    }
}
