//! # Domain Types
//!
//! Entities of the secrets manager and the principal graph that access
//! policies hang off.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Organization (opaque id)                                              │
//! │   ├── Project ◄──────────────── AccessPolicy (granted_project_id)       │
//! │   │    id, name                   grantee: User | Group | ServiceAcct  │
//! │   │    revision_date              read, write                          │
//! │   │    deleted_date                                                    │
//! │   │                                                                     │
//! │   ├── Secret (project_id optional)                                     │
//! │   │                                                                     │
//! │   ├── OrganizationUser ──► user_id (the principal)                     │
//! │   ├── Group ◄── GroupUser ──► OrganizationUser                         │
//! │   └── ServiceAccount                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Soft Delete
//! `Project` and `Secret` carry `deleted_date`. A value there means the row is
//! gone as far as every active query is concerned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Project
// =============================================================================

/// A project groups secrets and is the unit access policies are granted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub creation_date: DateTime<Utc>,
    /// Last-modified marker. Listings are ordered by it.
    pub revision_date: DateTime<Utc>,
    pub deleted_date: Option<DateTime<Utc>>,
}

impl Project {
    /// Returns true unless the project has been soft-deleted.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.deleted_date.is_none()
    }
}

/// Input for creating a project. Identity and timestamps are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub organization_id: Uuid,
    pub name: String,
}

// =============================================================================
// Secret
// =============================================================================

/// A secret value, optionally attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub key: String,
    pub value: String,
    pub note: Option<String>,
    pub creation_date: DateTime<Utc>,
    pub revision_date: DateTime<Utc>,
    pub deleted_date: Option<DateTime<Utc>>,
}

impl Secret {
    /// Returns true unless the secret has been soft-deleted.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.deleted_date.is_none()
    }
}

/// Input for creating a secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSecret {
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub key: String,
    pub value: String,
    pub note: Option<String>,
}

// =============================================================================
// Principals
// =============================================================================

/// Membership of a user in an organization.
///
/// User access policies point at this record, not at the user directly, so
/// the user id of the principal is always reached through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationUser {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
}

/// A named set of organization users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
}

/// Links an organization user to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUser {
    pub group_id: Uuid,
    pub organization_user_id: Uuid,
}

/// A machine principal owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
}

// =============================================================================
// Access Policies
// =============================================================================

/// Who an access policy grants rights to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grantee {
    /// A single organization member.
    User { organization_user_id: Uuid },
    /// Every member of a group.
    Group { group_id: Uuid },
    /// A service account.
    ServiceAccount { service_account_id: Uuid },
}

impl Grantee {
    /// Storage discriminator for this variant.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Grantee::User { .. } => "user",
            Grantee::Group { .. } => "group",
            Grantee::ServiceAccount { .. } => "service_account",
        }
    }
}

/// A read and/or write grant on one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    pub id: Uuid,
    pub grantee: Grantee,
    pub granted_project_id: Uuid,
    pub read: bool,
    pub write: bool,
    pub creation_date: DateTime<Utc>,
    pub revision_date: DateTime<Utc>,
}

impl AccessPolicy {
    /// Builds a policy with a fresh id and both timestamps set to now.
    pub fn new(grantee: Grantee, granted_project_id: Uuid, read: bool, write: bool) -> Self {
        let now = Utc::now();
        AccessPolicy {
            id: Uuid::new_v4(),
            grantee,
            granted_project_id,
            read,
            write,
            creation_date: now,
            revision_date: now,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grantee_discriminator() {
        let id = Uuid::new_v4();
        assert_eq!(Grantee::User { organization_user_id: id }.discriminator(), "user");
        assert_eq!(Grantee::Group { group_id: id }.discriminator(), "group");
        assert_eq!(
            Grantee::ServiceAccount { service_account_id: id }.discriminator(),
            "service_account"
        );
    }

    #[test]
    fn test_project_is_active() {
        let now = Utc::now();
        let mut project = Project {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "backend".to_string(),
            creation_date: now,
            revision_date: now,
            deleted_date: None,
        };
        assert!(project.is_active());

        project.deleted_date = Some(now);
        assert!(!project.is_active());
    }

    #[test]
    fn test_grantee_json_shape() {
        let id = Uuid::nil();
        let json = serde_json::to_value(Grantee::Group { group_id: id }).unwrap();
        assert_eq!(json["type"], "group");
        assert_eq!(json["group_id"], id.to_string());
    }

    #[test]
    fn test_new_policy_timestamps_match() {
        let policy = AccessPolicy::new(
            Grantee::ServiceAccount { service_account_id: Uuid::new_v4() },
            Uuid::new_v4(),
            true,
            false,
        );
        assert_eq!(policy.creation_date, policy.revision_date);
        assert!(policy.read);
        assert!(!policy.write);
    }
}
