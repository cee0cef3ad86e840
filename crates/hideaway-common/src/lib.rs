//! # hideaway-common
//!
//! Shared input contracts, error definitions, configuration models, and
//! constants used across the Hideaway workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and performs no host mutation of its own.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
