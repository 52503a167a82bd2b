//! # veritas-contracts
//!
//! Shared types, schemas, and contracts for the VERITAS runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions and error types.

pub mod agent;
pub mod appointment;
pub mod capability;
pub mod error;
pub mod execution;
pub mod policy;
pub mod risk;
pub mod turn;
pub mod verify;
