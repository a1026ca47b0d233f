//! VaultSync Core - Domain types and configuration
//!
//! This crate contains:
//! - **Domain entities** - `LocalVaultItem`, `RemoteVaultItem`, `SyncFailure`
//! - **Newtypes** - `ItemId`, `AccountId`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module is plain data with no I/O. The reconciliation engine
//! (`vaultsync-diff`) reads these records through its lens traits, and the
//! sync coordinator (`vaultsync-sync`) moves them between stores.

pub mod config;
pub mod domain;
