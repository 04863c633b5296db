//! # Row Mapping
//!
//! Rows come out of SQLite with ids as text. Each row struct here is decoded
//! by sqlx and then converted into its `warden-core` entity, parsing ids on
//! the way. A row that doesn't parse is reported as
//! [`DbError::CorruptRecord`] instead of being skipped.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use warden_core::{
    AccessPolicy, Grantee, Group, GroupUser, OrganizationUser, Project, Secret, ServiceAccount,
};

/// Column list for `project` aliased as `p`.
pub(crate) const PROJECT_COLUMNS: &str =
    "p.id, p.organization_id, p.name, p.creation_date, p.revision_date, p.deleted_date";

/// Column list for `secret` aliased as `s`.
pub(crate) const SECRET_COLUMNS: &str = "s.id, s.organization_id, s.project_id, s.key, s.value, \
     s.note, s.creation_date, s.revision_date, s.deleted_date";

/// Column list for `access_policy` aliased as `ap`.
pub(crate) const ACCESS_POLICY_COLUMNS: &str = "ap.id, ap.discriminator, ap.organization_user_id, \
     ap.group_id, ap.service_account_id, ap.granted_project_id, ap.read, ap.write, \
     ap.creation_date, ap.revision_date";

fn parse_id(entity: &'static str, field: &str, value: &str) -> DbResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| DbError::corrupt(entity, format!("{field} '{value}': {e}")))
}

fn parse_optional_id(entity: &'static str, field: &str, value: Option<&str>) -> DbResult<Option<Uuid>> {
    value.map(|v| parse_id(entity, field, v)).transpose()
}

/// Converts every row, failing on the first one that doesn't map.
pub(crate) fn map_rows<R, T>(rows: Vec<R>) -> DbResult<Vec<T>>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =============================================================================
// Project
// =============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct ProjectRow {
    id: String,
    organization_id: String,
    name: String,
    creation_date: DateTime<Utc>,
    revision_date: DateTime<Utc>,
    deleted_date: Option<DateTime<Utc>>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = DbError;

    fn try_from(row: ProjectRow) -> DbResult<Self> {
        Ok(Project {
            id: parse_id("Project", "id", &row.id)?,
            organization_id: parse_id("Project", "organization_id", &row.organization_id)?,
            name: row.name,
            creation_date: row.creation_date,
            revision_date: row.revision_date,
            deleted_date: row.deleted_date,
        })
    }
}

// =============================================================================
// Secret
// =============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct SecretRow {
    id: String,
    organization_id: String,
    project_id: Option<String>,
    key: String,
    value: String,
    note: Option<String>,
    creation_date: DateTime<Utc>,
    revision_date: DateTime<Utc>,
    deleted_date: Option<DateTime<Utc>>,
}

impl TryFrom<SecretRow> for Secret {
    type Error = DbError;

    fn try_from(row: SecretRow) -> DbResult<Self> {
        Ok(Secret {
            id: parse_id("Secret", "id", &row.id)?,
            organization_id: parse_id("Secret", "organization_id", &row.organization_id)?,
            project_id: parse_optional_id("Secret", "project_id", row.project_id.as_deref())?,
            key: row.key,
            value: row.value,
            note: row.note,
            creation_date: row.creation_date,
            revision_date: row.revision_date,
            deleted_date: row.deleted_date,
        })
    }
}

// =============================================================================
// Access Policy
// =============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct AccessPolicyRow {
    id: String,
    discriminator: String,
    organization_user_id: Option<String>,
    group_id: Option<String>,
    service_account_id: Option<String>,
    granted_project_id: String,
    read: bool,
    write: bool,
    creation_date: DateTime<Utc>,
    revision_date: DateTime<Utc>,
}

impl AccessPolicyRow {
    fn grantee(&self) -> DbResult<Grantee> {
        const ENTITY: &str = "AccessPolicy";

        let required = |field: &str, value: Option<&str>| -> DbResult<Uuid> {
            let value = value.ok_or_else(|| {
                DbError::corrupt(ENTITY, format!("{} policy without {field}", self.discriminator))
            })?;
            parse_id(ENTITY, field, value)
        };

        match self.discriminator.as_str() {
            "user" => Ok(Grantee::User {
                organization_user_id: required(
                    "organization_user_id",
                    self.organization_user_id.as_deref(),
                )?,
            }),
            "group" => Ok(Grantee::Group {
                group_id: required("group_id", self.group_id.as_deref())?,
            }),
            "service_account" => Ok(Grantee::ServiceAccount {
                service_account_id: required(
                    "service_account_id",
                    self.service_account_id.as_deref(),
                )?,
            }),
            other => Err(DbError::corrupt(ENTITY, format!("unknown discriminator '{other}'"))),
        }
    }
}

impl TryFrom<AccessPolicyRow> for AccessPolicy {
    type Error = DbError;

    fn try_from(row: AccessPolicyRow) -> DbResult<Self> {
        Ok(AccessPolicy {
            id: parse_id("AccessPolicy", "id", &row.id)?,
            grantee: row.grantee()?,
            granted_project_id: parse_id("AccessPolicy", "granted_project_id", &row.granted_project_id)?,
            read: row.read,
            write: row.write,
            creation_date: row.creation_date,
            revision_date: row.revision_date,
        })
    }
}

// =============================================================================
// Principal Graph
// =============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct OrganizationUserRow {
    id: String,
    organization_id: String,
    user_id: String,
}

impl TryFrom<OrganizationUserRow> for OrganizationUser {
    type Error = DbError;

    fn try_from(row: OrganizationUserRow) -> DbResult<Self> {
        Ok(OrganizationUser {
            id: parse_id("OrganizationUser", "id", &row.id)?,
            organization_id: parse_id("OrganizationUser", "organization_id", &row.organization_id)?,
            user_id: parse_id("OrganizationUser", "user_id", &row.user_id)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct GroupUserRow {
    group_id: String,
    organization_user_id: String,
}

impl TryFrom<GroupUserRow> for GroupUser {
    type Error = DbError;

    fn try_from(row: GroupUserRow) -> DbResult<Self> {
        Ok(GroupUser {
            group_id: parse_id("GroupUser", "group_id", &row.group_id)?,
            organization_user_id: parse_id(
                "GroupUser",
                "organization_user_id",
                &row.organization_user_id,
            )?,
        })
    }
}

/// Row shape shared by `access_group` and `service_account`.
#[derive(Debug, FromRow)]
pub(crate) struct NamedPrincipalRow {
    id: String,
    organization_id: String,
    name: String,
}

impl TryFrom<NamedPrincipalRow> for Group {
    type Error = DbError;

    fn try_from(row: NamedPrincipalRow) -> DbResult<Self> {
        Ok(Group {
            id: parse_id("Group", "id", &row.id)?,
            organization_id: parse_id("Group", "organization_id", &row.organization_id)?,
            name: row.name,
        })
    }
}

impl TryFrom<NamedPrincipalRow> for ServiceAccount {
    type Error = DbError;

    fn try_from(row: NamedPrincipalRow) -> DbResult<Self> {
        Ok(ServiceAccount {
            id: parse_id("ServiceAccount", "id", &row.id)?,
            organization_id: parse_id("ServiceAccount", "organization_id", &row.organization_id)?,
            name: row.name,
        })
    }
}

/// The table that owns a grantee, and the grantee's id.
pub(crate) fn grantee_owner(grantee: &Grantee) -> (&'static str, &'static str, Uuid) {
    match *grantee {
        Grantee::User {
            organization_user_id,
        } => ("organization_user", "OrganizationUser", organization_user_id),
        Grantee::Group { group_id } => ("access_group", "Group", group_id),
        Grantee::ServiceAccount { service_account_id } => {
            ("service_account", "ServiceAccount", service_account_id)
        }
    }
}

/// Splits a grantee into the three nullable foreign-key columns.
pub(crate) fn grantee_columns(grantee: &Grantee) -> (Option<String>, Option<String>, Option<String>) {
    match grantee {
        Grantee::User {
            organization_user_id,
        } => (Some(organization_user_id.to_string()), None, None),
        Grantee::Group { group_id } => (None, Some(group_id.to_string()), None),
        Grantee::ServiceAccount { service_account_id } => {
            (None, None, Some(service_account_id.to_string()))
        }
    }
}
