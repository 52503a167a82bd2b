//! The VERITAS executor: the deterministic policy-bound step runner.
//!
//! The executor enforces the VERITAS execution model:
//!
//!   State → Policy → Capability → [Agent::propose] → Verify → Transition → Audit
//!
//! The security invariant is absolute: `Agent::propose()` is NEVER called
//! unless `PolicyEngine::evaluate()` returns `PolicyVerdict::Allow` AND all
//! required capabilities are present. This is enforced structurally — the
//! code path to `propose()` is only reachable after both checks pass.

use chrono::Utc;
use tracing::{debug, info, warn};

use veritas_contracts::{
    agent::{AgentState, AgentInput},
    capability::{Capability, CapabilitySet},
    error::{VeritasError, VeritasResult},
    execution::{StepRecord, StepResult},
    policy::{PolicyContext, PolicyVerdict},
    verify::OutputSchema,
};

use crate::traits::{Agent, AuditWriter, PolicyEngine, Verifier};

/// The central executor that drives a single agent execution.
///
/// Construct one executor per agent execution (i.e. per `ExecutionId`).
/// The executor owns the trusted components — policy, audit, verifier — and
/// enforces the pipeline ordering on every call to `step()`.
pub struct Executor {
    policy: Box<dyn PolicyEngine>,
    audit: Box<dyn AuditWriter>,
    verifier: Box<dyn Verifier>,
    schema: OutputSchema,
}

impl Executor {
    /// Create a new executor with the given trusted components and output schema.
    pub fn new(
        policy: Box<dyn PolicyEngine>,
        audit: Box<dyn AuditWriter>,
        verifier: Box<dyn Verifier>,
        schema: OutputSchema,
    ) -> Self {
        Self { policy, audit, verifier, schema }
    }

    /// Execute one step of the agent's state machine.
    ///
    /// # Pipeline
    ///
    /// 1. Build `PolicyContext` from `agent.describe_action()`
    /// 2. Call `policy.evaluate()`:
    ///    - `Deny` → audit the denial, return `StepResult::Denied`
    ///    - `RequireApproval` → audit, return `StepResult::AwaitingApproval`
    ///    - `RequireVerification` / `Allow` → continue
    /// 3. Check that the agent holds all `required_capabilities()`; if not,
    ///    audit a synthetic denial and return `VeritasError::CapabilityMissing`
    /// 4. Call `agent.propose()` — **only reachable after steps 2 & 3 pass**
    /// 5. Call `verifier.verify()`; if failed, return `VeritasError::VerificationFailed`
    /// 6. Call `agent.transition()` to advance state
    /// 7. Audit the completed step
    /// 8. If `agent.is_terminal()`, finalize the audit and return `StepResult::Complete`
    /// 9. Otherwise return `StepResult::Transitioned`
    ///
    /// # Errors
    ///
    /// Returns `Err` for capability failures, verification failures, audit
    /// write failures, and agent state machine errors. Policy `Deny` and
    /// `RequireApproval` are NOT errors — they are valid `StepResult` variants.
    pub async fn step(
        &self,
        agent: &dyn Agent,
        state: AgentState,
        input: AgentInput,
        capabilities: &CapabilitySet,
    ) -> VeritasResult<StepResult> {
        let execution_id = state.execution_id.0.to_string();
        let step_num = state.step;

        debug!(
            execution_id = %execution_id,
            step = step_num,
            phase = %state.phase,
            input_kind = %input.kind,
            "executor step starting"
        );

        // ── Step 1: Describe the action the agent wants to take ──────────────
        let (action, resource) = agent.describe_action(&state, &input);

        let policy_ctx = PolicyContext {
            agent_id: state.agent_id.0.clone(),
            execution_id: execution_id.clone(),
            current_phase: state.phase.clone(),
            action: action.clone(),
            resource: resource.clone(),
            capabilities: capabilities.all().map(|c| c.0.clone()).collect(),
            metadata: serde_json::Value::Null,
        };

        // ── Step 2: Policy evaluation ────────────────────────────────────────
        //
        // This is the primary trust gate. No agent logic runs until Allow.
        let verdict = self.policy.evaluate(&policy_ctx)?;

        match &verdict {
            PolicyVerdict::Deny { reason } => {
                warn!(
                    execution_id = %execution_id,
                    step = step_num,
                    reason = %reason,
                    "policy denied action"
                );

                // Audit the denial so every denied step is on record.
                let record = StepRecord {
                    step: step_num,
                    input,
                    verdict: verdict.clone(),
                    output: None,
                    timestamp: Utc::now(),
                };
                self.audit.write(&record)?;

                return Ok(StepResult::Denied {
                    reason: reason.clone(),
                    final_state: state,
                });
            }

            PolicyVerdict::RequireApproval { reason, approver_role } => {
                info!(
                    execution_id = %execution_id,
                    step = step_num,
                    approver_role = %approver_role,
                    "execution suspended awaiting approval"
                );

                let record = StepRecord {
                    step: step_num,
                    input,
                    verdict: verdict.clone(),
                    output: None,
                    timestamp: Utc::now(),
                };
                self.audit.write(&record)?;

                return Ok(StepResult::AwaitingApproval {
                    reason: reason.clone(),
                    approver_role: approver_role.clone(),
                    suspended_state: state,
                });
            }

            // Allow and RequireVerification both proceed to capability check.
            PolicyVerdict::Allow | PolicyVerdict::RequireVerification { .. } => {
                debug!(
                    execution_id = %execution_id,
                    step = step_num,
                    "policy allowed action, checking capabilities"
                );
            }
        }

        // ── Step 3: Capability check ─────────────────────────────────────────
        //
        // Even after Allow, the agent must hold every declared capability.
        // This enforces principle of least privilege at the runtime level.
        let required = agent.required_capabilities(&state, &input);
        for cap_name in &required {
            let cap = Capability::new(cap_name.as_str());
            if !capabilities.has(&cap) {
                warn!(
                    execution_id = %execution_id,
                    step = step_num,
                    capability = %cap_name,
                    action = %action,
                    "capability missing, step denied"
                );

                // Audit the capability failure as a synthetic denial.
                let denial_verdict = PolicyVerdict::Deny {
                    reason: format!(
                        "capability '{}' required for action '{}' is not granted",
                        cap_name, action
                    ),
                };
                let record = StepRecord {
                    step: step_num,
                    input,
                    verdict: denial_verdict,
                    output: None,
                    timestamp: Utc::now(),
                };
                self.audit.write(&record)?;

                return Err(VeritasError::CapabilityMissing {
                    capability: cap_name.clone(),
                    action: action.clone(),
                });
            }
        }

        // ── Step 4: Agent proposal ───────────────────────────────────────────
        //
        // Only reachable if policy returned Allow AND all capabilities present.
        // This is the ONLY call site for agent.propose() in the runtime.
        debug!(
            execution_id = %execution_id,
            step = step_num,
            "capabilities verified, calling agent.propose()"
        );
        let output = agent.propose(&state, &input).await?;

        // ── Step 5: Output verification ──────────────────────────────────────
        //
        // The verifier inspects the raw LLM/agent output before it touches state.
        let report = self.verifier.verify(&output, &self.schema)?;
        if !report.passed {
            let failure_summary = report
                .failures
                .iter()
                .map(|f| format!("[{}] {}", f.rule_id, f.message))
                .collect::<Vec<_>>()
                .join("; ");

            warn!(
                execution_id = %execution_id,
                step = step_num,
                failures = %failure_summary,
                "output verification failed"
            );
            return Err(VeritasError::VerificationFailed {
                reason: failure_summary,
            });
        }

        // ── Step 6: State transition ─────────────────────────────────────────
        let next_state = agent.transition(&state, &output)?;

        // ── Step 7: Audit the completed step ─────────────────────────────────
        let record = StepRecord {
            step: step_num,
            input,
            verdict,
            output: Some(output.clone()),
            timestamp: Utc::now(),
        };
        self.audit.write(&record)?;

        // ── Steps 8 & 9: Terminal check ──────────────────────────────────────
        if agent.is_terminal(&next_state) {
            info!(
                execution_id = %execution_id,
                step = step_num,
                "agent reached terminal state, finalizing audit"
            );
            self.audit.finalize(&execution_id)?;
            Ok(StepResult::Complete {
                final_state: next_state,
                output,
            })
        } else {
            Ok(StepResult::Transitioned {
                next_state,
                output,
            })
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
