//! # Predicate → SQL
//!
//! Translates [`AccessPredicate`] values into `EXISTS` sub-queries appended
//! to a project query. The outer query must alias `project` as `p`.
//!
//! ## Generated Shape (user, read)
//! ```text
//! AND (
//!   EXISTS (SELECT 1 FROM access_policy ap
//!           JOIN organization_user ou ON ou.id = ap.organization_user_id
//!           WHERE ap.granted_project_id = p.id AND ap.discriminator = 'user'
//!             AND ou.organization_id = p.organization_id
//!             AND ou.user_id = ?  AND ap.read = 1)
//!   OR
//!   EXISTS (SELECT 1 FROM access_policy ap
//!           JOIN access_group g       ON g.id = ap.group_id
//!           JOIN group_user gu        ON gu.group_id = g.id
//!           JOIN organization_user ou ON ou.id = gu.organization_user_id
//!           WHERE ap.granted_project_id = p.id AND ap.discriminator = 'group'
//!             AND g.organization_id = p.organization_id
//!             AND ou.organization_id = p.organization_id
//!             AND ou.user_id = ?  AND ap.read = 1)
//! )
//! ```
//!
//! Every principal on the path must belong to the project's organization,
//! so a stray grant across organizations never opens a project.
//!
//! Principal ids are always bound, never interpolated. Only the permission
//! column name is spliced in, and it comes from a closed enum.

use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use warden_core::{AccessPredicate, Permission};

/// Largest id list bound into a single statement.
pub(crate) const ID_CHUNK: usize = 500;

fn permission_column(permission: Permission) -> &'static str {
    match permission {
        Permission::Read => "ap.read",
        Permission::Write => "ap.write",
    }
}

/// Appends ` AND (<predicate>)` unless the predicate is unrestricted.
pub(crate) fn push_access_filter(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &AccessPredicate) {
    match *predicate {
        AccessPredicate::Unrestricted => {}

        AccessPredicate::User {
            user_id,
            permission,
        } => {
            let column = permission_column(permission);

            qb.push(
                " AND (EXISTS (SELECT 1 FROM access_policy ap \
                 INNER JOIN organization_user ou ON ou.id = ap.organization_user_id \
                 WHERE ap.granted_project_id = p.id AND ap.discriminator = 'user' \
                 AND ou.organization_id = p.organization_id \
                 AND ou.user_id = ",
            );
            qb.push_bind(user_id.to_string());
            qb.push(" AND ");
            qb.push(column);
            qb.push(
                " = 1) OR EXISTS (SELECT 1 FROM access_policy ap \
                 INNER JOIN access_group g ON g.id = ap.group_id \
                 INNER JOIN group_user gu ON gu.group_id = g.id \
                 INNER JOIN organization_user ou ON ou.id = gu.organization_user_id \
                 WHERE ap.granted_project_id = p.id AND ap.discriminator = 'group' \
                 AND g.organization_id = p.organization_id \
                 AND ou.organization_id = p.organization_id \
                 AND ou.user_id = ",
            );
            qb.push_bind(user_id.to_string());
            qb.push(" AND ");
            qb.push(column);
            qb.push(" = 1))");
        }

        AccessPredicate::ServiceAccount {
            service_account_id,
            permission,
        } => {
            qb.push(
                " AND EXISTS (SELECT 1 FROM access_policy ap \
                 INNER JOIN service_account sa ON sa.id = ap.service_account_id \
                 WHERE ap.granted_project_id = p.id AND ap.discriminator = 'service_account' \
                 AND sa.organization_id = p.organization_id \
                 AND ap.service_account_id = ",
            );
            qb.push_bind(service_account_id.to_string());
            qb.push(" AND ");
            qb.push(permission_column(permission));
            qb.push(" = 1)");
        }
    }
}

/// Appends ` IN (?, ?, ...)` for `ids`. Callers skip empty slices.
pub(crate) fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");
}
