//! # Store Registry
//!
//! Holds the store capabilities as trait objects, built once at process
//! start and shared by reference-counted handle. Stores are stateless, so
//! cloning the registry is cheap and every clone sees the same pool.

use std::sync::Arc;

use crate::pool::Database;
use crate::store::{ProjectStore, SecretStore};

/// The capabilities a service layer depends on.
#[derive(Clone)]
pub struct StoreRegistry {
    pub projects: Arc<dyn ProjectStore>,
    pub secrets: Arc<dyn SecretStore>,
}

impl StoreRegistry {
    /// Builds a registry from explicit store implementations.
    pub fn new(projects: Arc<dyn ProjectStore>, secrets: Arc<dyn SecretStore>) -> Self {
        StoreRegistry { projects, secrets }
    }

    /// Wires the SQLite repositories of `db`.
    pub fn from_database(db: &Database) -> Self {
        StoreRegistry {
            projects: Arc::new(db.projects()),
            secrets: Arc::new(db.secrets()),
        }
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry").finish_non_exhaustive()
    }
}
