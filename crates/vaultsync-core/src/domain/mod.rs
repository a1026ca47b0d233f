//! Domain entities and business logic
//!
//! This module contains the core domain types for VaultSync:
//! - Newtypes for type-safe identifiers
//! - Local and remote vault item records
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod vault_item;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use vault_item::{
    LocalVaultItem, RememberedRemote, RemoteVaultItem, SyncFailure, VaultPayload,
    CURRENT_SCHEMA_VERSION, MAX_PUSH_ATTEMPTS,
};
