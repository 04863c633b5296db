//! # Access Predicates
//!
//! Builds the predicates that decide whether a principal may read or write a
//! project. Predicates are plain values: the storage layer translates them
//! into SQL, and [`AccessPredicate::matches`] evaluates them against an
//! in-memory [`AccessGraph`] so the rules can be tested without a database.
//!
//! ## Access Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who can read project P?                              │
//! │                                                                         │
//! │  USER u                                                                │
//! │    user policy on P with read=1                                        │
//! │      whose organization user has user_id = u                           │
//! │    OR                                                                   │
//! │    group policy on P with read=1                                       │
//! │      whose group contains an organization user with user_id = u       │
//! │                                                                         │
//! │  SERVICE ACCOUNT s                                                     │
//! │    service-account policy on P with read=1 for s                       │
//! │    (group membership plays no part)                                    │
//! │                                                                         │
//! │  Write checks are identical with write=1.                              │
//! │  Grants are additive: any matching policy is enough.                   │
//! │  Only principals of P's own organization count.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Client Dispatch
//! Listing endpoints classify the caller with [`AccessClientKind`] and call
//! [`for_client`]. The enum is closed; raw codes coming from outside go
//! through `TryFrom<i32>` / `FromStr`, which reject anything unknown with
//! [`CoreError::InvalidArgument`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{
    AccessPolicy, Group, GroupUser, Grantee, OrganizationUser, Project, ServiceAccount,
};

// =============================================================================
// Access Client Kind
// =============================================================================

/// Classification of the calling context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessClientKind {
    /// Organization-admin context: no per-principal filtering.
    NoAccessCheck,
    /// A human user, checked through user and group policies.
    User,
    /// A service account, checked through service-account policies.
    ServiceAccount,
}

impl AccessClientKind {
    /// Wire code of this kind (0, 1, 2).
    pub const fn code(self) -> i32 {
        match self {
            AccessClientKind::NoAccessCheck => 0,
            AccessClientKind::User => 1,
            AccessClientKind::ServiceAccount => 2,
        }
    }
}

impl TryFrom<i32> for AccessClientKind {
    type Error = CoreError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(AccessClientKind::NoAccessCheck),
            1 => Ok(AccessClientKind::User),
            2 => Ok(AccessClientKind::ServiceAccount),
            other => Err(CoreError::invalid_argument("access_client_kind", other)),
        }
    }
}

impl fmt::Display for AccessClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessClientKind::NoAccessCheck => write!(f, "no_access_check"),
            AccessClientKind::User => write!(f, "user"),
            AccessClientKind::ServiceAccount => write!(f, "service_account"),
        }
    }
}

impl FromStr for AccessClientKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no_access_check" | "none" | "admin" => Ok(AccessClientKind::NoAccessCheck),
            "user" => Ok(AccessClientKind::User),
            "service_account" | "service-account" => Ok(AccessClientKind::ServiceAccount),
            other => Err(CoreError::invalid_argument("access_client_kind", other)),
        }
    }
}

// =============================================================================
// Permission
// =============================================================================

/// The grant flag a predicate tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    /// Returns true if `policy` carries this permission.
    #[inline]
    pub fn granted_by(self, policy: &AccessPolicy) -> bool {
        match self {
            Permission::Read => policy.read,
            Permission::Write => policy.write,
        }
    }
}

// =============================================================================
// Predicate
// =============================================================================

/// Filter over projects for one principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessPredicate {
    /// Every project passes.
    Unrestricted,
    /// Direct user policy or group policy through membership.
    User { user_id: Uuid, permission: Permission },
    /// Service-account policy only.
    ServiceAccount {
        service_account_id: Uuid,
        permission: Permission,
    },
}

/// User may read the project directly or through a group.
pub fn has_read_access(user_id: Uuid) -> AccessPredicate {
    AccessPredicate::User {
        user_id,
        permission: Permission::Read,
    }
}

/// User may write the project directly or through a group.
pub fn has_write_access(user_id: Uuid) -> AccessPredicate {
    AccessPredicate::User {
        user_id,
        permission: Permission::Write,
    }
}

/// Service account may read the project.
pub fn has_service_account_read_access(service_account_id: Uuid) -> AccessPredicate {
    AccessPredicate::ServiceAccount {
        service_account_id,
        permission: Permission::Read,
    }
}

/// Service account may write the project.
pub fn has_service_account_write_access(service_account_id: Uuid) -> AccessPredicate {
    AccessPredicate::ServiceAccount {
        service_account_id,
        permission: Permission::Write,
    }
}

/// Listing predicate for a calling context.
///
/// Listing is always read-scoped. `principal_id` is ignored for
/// [`AccessClientKind::NoAccessCheck`].
pub fn for_client(kind: AccessClientKind, principal_id: Uuid) -> AccessPredicate {
    match kind {
        AccessClientKind::NoAccessCheck => AccessPredicate::Unrestricted,
        AccessClientKind::User => has_read_access(principal_id),
        AccessClientKind::ServiceAccount => has_service_account_read_access(principal_id),
    }
}

impl AccessPredicate {
    /// Returns true for [`AccessPredicate::Unrestricted`].
    #[inline]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, AccessPredicate::Unrestricted)
    }

    /// Evaluates the predicate for one project against `graph`.
    pub fn matches(&self, project_id: Uuid, graph: &AccessGraph) -> bool {
        match *self {
            AccessPredicate::Unrestricted => true,
            AccessPredicate::User {
                user_id,
                permission,
            } => graph
                .policies_for_project(project_id)
                .filter(|policy| permission.granted_by(policy))
                .any(|policy| match policy.grantee {
                    Grantee::User {
                        organization_user_id,
                    } => graph.organization_user_is(organization_user_id, user_id),
                    Grantee::Group { group_id } => graph.group_contains_user(group_id, user_id),
                    Grantee::ServiceAccount { .. } => false,
                }),
            AccessPredicate::ServiceAccount {
                service_account_id,
                permission,
            } => graph
                .policies_for_project(project_id)
                .filter(|policy| permission.granted_by(policy))
                .any(|policy| {
                    policy.grantee == Grantee::ServiceAccount { service_account_id }
                        && graph.service_accounts.contains(&service_account_id)
                }),
        }
    }
}

// =============================================================================
// In-Memory Graph
// =============================================================================

/// One organization's policies and principals held in memory.
///
/// Mirrors the tables the storage layer joins over, so a predicate gives the
/// same answer here as it does in SQL. Principals that were never added are
/// treated as belonging to another organization and grant nothing.
#[derive(Debug, Clone, Default)]
pub struct AccessGraph {
    policies: Vec<AccessPolicy>,
    organization_users: Vec<OrganizationUser>,
    groups: HashSet<Uuid>,
    group_users: HashSet<GroupUser>,
    service_accounts: HashSet<Uuid>,
}

impl AccessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_policy(&mut self, policy: AccessPolicy) -> &mut Self {
        self.policies.push(policy);
        self
    }

    pub fn add_organization_user(&mut self, organization_user: OrganizationUser) -> &mut Self {
        self.organization_users.push(organization_user);
        self
    }

    pub fn add_group(&mut self, group: &Group) -> &mut Self {
        self.groups.insert(group.id);
        self
    }

    pub fn add_group_user(&mut self, group_user: GroupUser) -> &mut Self {
        self.group_users.insert(group_user);
        self
    }

    pub fn add_service_account(&mut self, service_account: &ServiceAccount) -> &mut Self {
        self.service_accounts.insert(service_account.id);
        self
    }

    /// Policies granted on `project_id`.
    pub fn policies_for_project(&self, project_id: Uuid) -> impl Iterator<Item = &AccessPolicy> {
        self.policies
            .iter()
            .filter(move |policy| policy.granted_project_id == project_id)
    }

    fn organization_user_is(&self, organization_user_id: Uuid, user_id: Uuid) -> bool {
        self.organization_users
            .iter()
            .any(|ou| ou.id == organization_user_id && ou.user_id == user_id)
    }

    fn group_contains_user(&self, group_id: Uuid, user_id: Uuid) -> bool {
        if !self.groups.contains(&group_id) {
            return false;
        }
        self.organization_users
            .iter()
            .filter(|ou| ou.user_id == user_id)
            .any(|ou| {
                self.group_users.contains(&GroupUser {
                    group_id,
                    organization_user_id: ou.id,
                })
            })
    }
}

/// Reference listing: the projects of `organization_id` a predicate admits.
///
/// Applies the same rules as the SQL listing: organization scope, soft-delete
/// exclusion, predicate, revision date ascending (id breaks ties).
pub fn visible_projects(
    projects: &[Project],
    organization_id: Uuid,
    predicate: &AccessPredicate,
    graph: &AccessGraph,
) -> Vec<Project> {
    let mut visible: Vec<Project> = projects
        .iter()
        .filter(|p| p.organization_id == organization_id && p.is_active())
        .filter(|p| predicate.matches(p.id, graph))
        .cloned()
        .collect();

    visible.sort_by(|a, b| {
        a.revision_date
            .cmp(&b.revision_date)
            .then_with(|| a.id.cmp(&b.id))
    });
    visible
}

// =============================================================================
// Unit Tests
// =============================================================================
