//! # veritas-policy
//!
//! A TOML-driven, deny-by-default policy engine for the VERITAS runtime.
//!
//! ## Overview
//!
//! This crate provides [`TomlPolicyEngine`], which implements the
//! [`PolicyEngine`](veritas_core::traits::PolicyEngine) trait.  Rules are
//! declared in a TOML file, evaluated in order, and the first matching rule
//! wins.  If no rule matches, the request is denied.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use veritas_policy::engine::TomlPolicyEngine;
//!
//! let engine = TomlPolicyEngine::from_file(Path::new("policies/healthcare.toml"))?;
//! // Pass `engine` to `veritas_core::Executor::new(...)`.
//! ```
//!
//! ## Rule matching
//!
//! Each rule specifies an `action` and `resource` pattern.  Both support the
//! wildcard `"*"` which matches any value.  Rules are applied in declaration
//! order; the first match wins.

pub mod engine;
pub mod rule;

pub use engine::TomlPolicyEngine;
pub use rule::{PolicyConfig, PolicyRule, RuleVerdict};

// ── Tests ─────────────────────────────────────────────────────────────────────
