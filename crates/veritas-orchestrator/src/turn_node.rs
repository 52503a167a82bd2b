//! The common contract every agent node in the turn loop implements.

use veritas_contracts::{error::VeritasResult, turn::TurnState};

/// A single step of work the Supervisor can dispatch to. Each implementation
/// wires its own Executor/policy/audit/verifier instance internally
/// (`support::run_node_step`) — the GLOSSARY's "single `run(state) → state`
/// method" contract.
#[async_trait::async_trait]
pub trait TurnNode: Send + Sync {
    /// Stable name used in the Supervisor's dispatch table and `plan`
    /// entries.
    fn name(&self) -> &'static str;

    /// Run this node against `state`, returning the mutated state.
    async fn run(&self, state: TurnState) -> VeritasResult<TurnState>;
}
