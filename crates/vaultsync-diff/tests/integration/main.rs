//! Integration tests for vaultsync-diff
//!
//! Drives the public `diff` entry points with the concrete vault records
//! from vaultsync-core and checks the resulting action lists.

mod common;

mod test_properties;
mod test_scenarios;
