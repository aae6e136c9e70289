//! Step dispatcher
//!
//! Resolves each plan step to an action call through a function-selection
//! backend, validates it against the registry and invokes the handler.
//! Step-level failures never stop the remaining steps. A selector that errors
//! leaves its step unresolved; only a selector timeout ends the run.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use triage_provider::{ChatParams, Message, Provider, Tool, ToolChoice};

use crate::actions::{ActionArgs, ActionCall, ActionRegistry, Lookup};
use crate::planner::{Plan, PlanStep};
use crate::{with_deadline, AgentError, Result, Stage};

/// Function-selection backend. `Ok(None)` means the model declined to pick an action.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FunctionSelector: Send + Sync {
    async fn select(
        &self,
        step: &PlanStep,
        actions: &[Tool],
    ) -> triage_provider::Result<Option<ActionCall>>;
}

/// Selector backed by a tool-calling chat model
pub struct ChatSelector {
    provider: Arc<dyn Provider>,
    model: String,
    instruction: String,
    max_tokens: u32,
}

impl ChatSelector {
    pub fn new(provider: Arc<dyn Provider>, instruction: impl Into<String>) -> Self {
        Self {
            model: provider.default_model(),
            provider,
            instruction: instruction.into(),
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl FunctionSelector for ChatSelector {
    async fn select(
        &self,
        step: &PlanStep,
        actions: &[Tool],
    ) -> triage_provider::Result<Option<ActionCall>> {
        let params = ChatParams {
            model: self.model.clone(),
            messages: vec![Message::user(format!("{}\n{}", self.instruction, step))],
            tools: actions.to_vec(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            tool_choice: ToolChoice::Auto,
        };

        let response = self.provider.chat(params).await?;

        let Some(call) = response.tool_calls.into_iter().next() else {
            debug!(
                "selector returned no tool call: {}",
                response.content.as_deref().unwrap_or("")
            );
            return Ok(None);
        };

        let args = match call.arguments {
            Value::Object(map) => map,
            _ => ActionArgs::new(),
        };

        Ok(Some(ActionCall::new(call.name, args)))
    }
}

/// Per-step outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DispatchOutcome {
    Executed { action: String },
    SkippedUnknownAction {
        action: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    FailedMalformedCall { action: String, reason: String },
}

impl DispatchOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchOutcome::Executed { .. } => "executed",
            DispatchOutcome::SkippedUnknownAction { .. } => "skipped-unknown-action",
            DispatchOutcome::FailedMalformedCall { .. } => "failed-malformed-call",
        }
    }
}

/// Outcome of one step together with what it resolved to
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub index: usize,
    pub step: PlanStep,
    pub call: Option<ActionCall>,
    pub outcome: DispatchOutcome,
}

/// Sequential step executor
pub struct Dispatcher {
    selector: Arc<dyn FunctionSelector>,
    registry: Arc<ActionRegistry>,
    tools: Vec<Tool>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        selector: Arc<dyn FunctionSelector>,
        registry: Arc<ActionRegistry>,
        timeout: Duration,
    ) -> Self {
        let tools = registry.definitions();
        Self {
            selector,
            registry,
            tools,
            timeout,
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Dispatch one step. Only a selector timeout is returned as an error.
    pub async fn dispatch(&self, index: usize, step: &PlanStep) -> Result<DispatchResult> {
        debug!("◆ STEP {}: {}", index, step);

        let unresolved = |reason: Option<String>| DispatchResult {
            index,
            step: step.clone(),
            call: None,
            outcome: DispatchOutcome::SkippedUnknownAction {
                action: None,
                reason,
            },
        };

        let selected = match with_deadline(
            Stage::Select,
            self.timeout,
            self.selector.select(step, &self.tools),
        )
        .await
        {
            Ok(selected) => selected,
            Err(AgentError::BackendUnavailable { reason, .. }) => {
                warn!("◆ STEP {} SKIPPED: SELECTOR FAILED: {}", index, reason);
                return Ok(unresolved(Some(format!("selector failed: {}", reason))));
            }
            Err(e) => return Err(e),
        };

        let Some(call) = selected else {
            warn!("◆ STEP {} SKIPPED: NO ACTION SELECTED", index);
            return Ok(unresolved(None));
        };

        let outcome = match self.registry.lookup(&call) {
            Lookup::NotFound => {
                warn!("◆ STEP {} SKIPPED: UNKNOWN ACTION '{}'", index, call.name);
                DispatchOutcome::SkippedUnknownAction {
                    action: Some(call.name.clone()),
                    reason: None,
                }
            }
            Lookup::InvalidArgs { spec, errors } => {
                warn!("◆ STEP {} MALFORMED CALL {}: {}", index, spec.name, errors);
                DispatchOutcome::FailedMalformedCall {
                    action: spec.name.clone(),
                    reason: errors.to_string(),
                }
            }
            Lookup::Ready { spec, args } => {
                let shown = Value::Object(args.clone());
                info!("◆ EXECUTE {} WITH {}", spec.name, shown);
                match spec.invoke(&args).await {
                    Ok(()) => DispatchOutcome::Executed {
                        action: spec.name.clone(),
                    },
                    Err(e) => {
                        warn!("◆ STEP {} HANDLER {} FAILED: {}", index, spec.name, e);
                        DispatchOutcome::FailedMalformedCall {
                            action: spec.name.clone(),
                            reason: e.to_string(),
                        }
                    }
                }
            }
        };

        Ok(DispatchResult {
            index,
            step: step.clone(),
            call: Some(call),
            outcome,
        })
    }

    /// Dispatch every step in plan order. When a step aborts the run, the
    /// error carries the results of the steps dispatched before it.
    pub async fn dispatch_all(&self, plan: &Plan) -> Result<Vec<DispatchResult>> {
        let mut results = Vec::with_capacity(plan.len());
        for (index, step) in plan.iter().enumerate() {
            match self.dispatch(index, step).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    return Err(AgentError::DispatchInterrupted {
                        source: Box::new(e),
                        completed: results,
                    })
                }
            }
        }
        Ok(results)
    }
}
