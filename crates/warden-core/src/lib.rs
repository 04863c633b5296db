//! # warden-core: Pure Domain Logic for Warden
//!
//! Entities of the secrets manager and the predicates that decide who may
//! read or write a project. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Warden Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Service layer / API (outside this workspace)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ProjectStore / SecretStore             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    warden-db (Database Layer)                   │   │
//! │  │       SQLite queries, predicate → SQL, row mapping              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ AccessPredicate                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ warden-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────────┐  ┌────────────┐             │   │
//! │  │   │   types   │  │    access     │  │ validation │             │   │
//! │  │   │  Project  │  │ ClientKind    │  │   rules    │             │   │
//! │  │   │  Secret   │  │ Predicate     │  │            │             │   │
//! │  │   │  Policy   │  │ AccessGraph   │  │            │             │   │
//! │  │   └───────────┘  └───────────────┘  └────────────┘             │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Project, Secret, AccessPolicy, principals)
//! - [`access`] - Access-client kinds, predicates, in-memory evaluation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use uuid::Uuid;
//! use warden_core::access::{for_client, AccessClientKind, AccessGraph, AccessPredicate};
//!
//! let kind = AccessClientKind::try_from(1).unwrap();
//! let predicate = for_client(kind, Uuid::new_v4());
//! assert!(matches!(predicate, AccessPredicate::User { .. }));
//!
//! // Nobody has been granted anything yet.
//! assert!(!predicate.matches(Uuid::new_v4(), &AccessGraph::new()));
//!
//! // Unknown client codes are rejected outright.
//! assert!(AccessClientKind::try_from(99).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{AccessClientKind, AccessGraph, AccessPredicate, Permission};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;
