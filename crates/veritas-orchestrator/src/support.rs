//! Shared executor wiring for turn nodes.
//!
//! Every node needs the same `Executor` + `TomlPolicyEngine` +
//! `InMemoryAuditWriter` + `SchemaVerifier` quad around its one collaborator
//! call — "allow, check one capability, verify the shape, audit the step" —
//! so it is built once here and reused rather than duplicated per node.

use std::sync::Arc;

use veritas_audit::InMemoryAuditWriter;
use veritas_contracts::{
    agent::{AgentId, AgentInput, AgentState, ExecutionId},
    capability::{Capability, CapabilitySet},
    error::{VeritasError, VeritasResult},
    execution::StepResult,
    verify::{OutputSchema, VerificationRule},
};
use veritas_core::{executor::Executor, traits::Agent};
use veritas_policy::TomlPolicyEngine;
use veritas_verify::engine::SchemaVerifier;

/// The capability every node is granted to call its collaborator. There is
/// only one tier of trust inside a node's own executor — the interesting
/// policy decisions (what the turn is allowed to do at all) happen at the
/// guardrail and Supervisor layers, not here.
pub const COLLABORATOR_CAPABILITY: &str = "collaborator:call";

/// A policy document that allows any action requiring only
/// `collaborator:call`, denying everything else by default — the minimum
/// a node needs, expressed the same declarative way `TomlPolicyEngine`
/// expects from any hosting application.
const ALLOW_COLLABORATOR_POLICY: &str = r#"
[[rules]]
id = "allow-collaborator-call"
description = "Turn nodes may call their own collaborator"
action = "*"
resource = "*"
required_capabilities = ["collaborator:call"]
verdict = "allow"
"#;

/// Run `agent` through a freshly built one-shot Executor and return its
/// output payload. Every node in this crate is single-step: the agent
/// proposes exactly once and is immediately terminal, so `Complete` is the
/// only non-error outcome that makes sense here.
pub async fn run_node_step(
    agent_name: &str,
    agent: &dyn Agent,
    input: AgentInput,
    schema: OutputSchema,
) -> VeritasResult<serde_json::Value> {
    let policy = TomlPolicyEngine::from_toml_str(ALLOW_COLLABORATOR_POLICY)?;
    let execution_id = ExecutionId::new();
    let audit = InMemoryAuditWriter::new(&execution_id.0.to_string());
    let verifier = SchemaVerifier::new();
    let executor = Executor::new(Box::new(policy), Box::new(audit), Box::new(verifier), schema);

    let mut caps = CapabilitySet::default();
    caps.grant(Capability::new(COLLABORATOR_CAPABILITY));

    let state = AgentState {
        agent_id: AgentId(agent_name.to_string()),
        execution_id,
        phase: "active".to_string(),
        context: serde_json::Value::Null,
        step: 0,
    };

    match executor.step(agent, state, input, &caps).await? {
        StepResult::Complete { output, .. } => Ok(output.payload),
        StepResult::Transitioned { output, .. } => Ok(output.payload),
        StepResult::Denied { reason, .. } => {
            Err(VeritasError::StateMachineError { reason: format!("{agent_name} denied: {reason}") })
        }
        StepResult::AwaitingApproval { reason, .. } => {
            Err(VeritasError::StateMachineError { reason: format!("{agent_name} unexpectedly requires approval: {reason}") })
        }
    }
}

/// A bare OutputSchema with no structural/semantic constraints — used by
/// nodes whose output shape is validated by the caller deserializing it,
/// not by the verifier. Nodes with a meaningful failure mode (missing
/// field, wrong type) build their own schema instead.
pub fn open_schema(schema_id: &str) -> OutputSchema {
    OutputSchema { schema_id: schema_id.to_string(), json_schema: serde_json::Value::Null, rules: vec![] }
}

/// An `OutputSchema` with no structural (JSON Schema) constraint but a set
/// of semantic rules — the common case for a node whose payload shape is a
/// plain struct but whose presence/value constraints still need enforcing.
pub fn schema_with_rules(schema_id: &str, rules: Vec<VerificationRule>) -> OutputSchema {
    OutputSchema { schema_id: schema_id.to_string(), json_schema: serde_json::Value::Null, rules }
}

/// Shared by every node's `Agent::transition`: a one-shot agent's state is
/// always terminal after its single step.
pub fn terminal_transition(state: &AgentState) -> VeritasResult<AgentState> {
    Ok(AgentState { step: state.step + 1, phase: "done".to_string(), ..state.clone() })
}

pub type SharedAgent = Arc<dyn Agent>;
