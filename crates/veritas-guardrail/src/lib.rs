//! # veritas-guardrail
//!
//! The three-tier input/output guardrail chain (§4.11). Each tier wraps the
//! one below it — `AdvancedGuardrail` contains an `IntermediateGuardrail`
//! contains a `SimpleGuardrail` — so a higher tier always gets the lower
//! tier's verdict first and only escalates, never relaxes, it.

pub mod config;
pub mod incident;
pub mod manager;
pub mod tier1;
pub mod tier2;
pub mod tier3;

pub use config::GuardrailConfig;
pub use incident::{GuardrailReport, IncidentLog};
pub use manager::{GuardrailManager, GuardrailTier};
pub use tier1::SimpleGuardrail;
pub use tier2::IntermediateGuardrail;
pub use tier3::AdvancedGuardrail;

use veritas_contracts::{error::VeritasResult, risk::UserRiskProfile, turn::GuardrailAction};

/// A guardrail layer: inspects user input before it reaches any agent, and
/// inspects a candidate response before it is delivered (§4.11). Neither
/// check is part of the trusted executor pipeline — it runs around the turn
/// loop, not inside `Executor::step`.
#[async_trait::async_trait]
pub trait Guardrail: Send + Sync {
    /// Check raw user input. `risk` is the caller's session risk profile —
    /// implementations may read and update it (only `AdvancedGuardrail`
    /// does).
    async fn check_input(&self, text: &str, risk: &mut UserRiskProfile) -> VeritasResult<GuardrailAction>;

    /// Check a candidate response before it is shown to the user.
    async fn check_output(&self, text: &str) -> VeritasResult<GuardrailAction>;
}
