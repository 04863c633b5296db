//! # warden-db: Database Layer for Warden
//!
//! SQLite storage for projects, secrets and access policies, with the access
//! predicates from `warden-core` compiled into the queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Warden Data Flow                                 │
//! │                                                                         │
//! │  Service call (list projects for user U in organization O)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     warden-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProjectRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SecretRepo    │    │ 001_initial_ │  │   │
//! │  │   │ StoreRegistry │    │ PolicyRepo    │    │  schema.sql  │  │   │
//! │  │   │               │    │ MembershipRepo│    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │ filter.rs: predicate → EXISTS │   │
//! │  └────────────────────────────────┼────────────────────────────────┘   │
//! │                                   ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`store`] - `ProjectStore` / `SecretStore` traits
//! - [`repository`] - SQLite implementations
//! - [`registry`] - Trait-object wiring for service layers
//! - [`config`] - File and environment configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::AccessClientKind;
//! use warden_db::{Database, ProjectStore, WardenConfig};
//!
//! let config = WardenConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let projects = db
//!     .projects()
//!     .list_by_organization(org_id, user_id, AccessClientKind::User)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod registry;
pub mod repository;
pub mod store;

mod filter;
mod mapping;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, WardenConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use registry::StoreRegistry;
pub use store::{ProjectStore, SecretStore};

// Repository re-exports for convenience
pub use repository::{
    AccessPolicyRepository, MembershipRepository, ProjectRepository, SecretRepository,
};
