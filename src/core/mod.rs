//! core
//!
//! Core domain types, local state and bookkeeping for stagepush.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, StagePath, UtcTimestamp
//! - [`changeset`] - The dirty-path tracker
//! - [`staging`] - The local staging directory
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for workspace storage
//! - [`ops`] - Workspace locking and the commit log
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here talks to the network

pub mod changeset;
pub mod config;
pub mod ops;
pub mod paths;
pub mod staging;
pub mod types;
