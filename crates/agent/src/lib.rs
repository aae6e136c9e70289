//! Triage core
//!
//! Classify free text, plan typed actions, dispatch each step to a handler.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub mod actions;
pub mod classifier;
pub mod dispatcher;
pub mod orchestrator;
pub mod planner;
pub mod repair;

pub use actions::{
    ActionArgs, ActionCall, ActionHandler, ActionRegistry, ActionSpec, ArgErrors, HandlerError,
    Lookup, ParamKind, ParamSpec,
};
pub use classifier::{cosine_similarity, Classifier, Label, LabelSet};
pub use dispatcher::{ChatSelector, DispatchOutcome, DispatchResult, Dispatcher, FunctionSelector};
pub use orchestrator::{Orchestrator, PipelineState, TriageReport};
pub use planner::{parse_plan, Plan, PlanGenerator, PlanPrompt, PlanStep};

/// Backend-facing pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Plan,
    Select,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Classify => write!(f, "classify"),
            Stage::Plan => write!(f, "plan"),
            Stage::Select => write!(f, "select"),
        }
    }
}

/// Invocation-level failures. Each one ends the current `handle` call.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("◆ CLASSIFIER UNAVAILABLE: {0}")]
    ClassifierUnavailable(String),

    #[error("◆ BACKEND UNAVAILABLE ({stage}): {reason}")]
    BackendUnavailable { stage: Stage, reason: String },

    #[error("◆ BACKEND TIMEOUT ({stage}) AFTER {}s", .after.as_secs_f64())]
    BackendTimeout { stage: Stage, after: Duration },

    #[error("◆ PLANNER RETURNED MALFORMED OUTPUT: {reason}")]
    PlanningMalformed { raw: String, reason: String },

    #[error("◆ INVALID CONFIGURATION: {0}")]
    InvalidConfig(String),

    #[error("◆ DISPATCH INTERRUPTED AFTER {} STEP(S): {source}", .completed.len())]
    DispatchInterrupted {
        source: Box<AgentError>,
        completed: Vec<DispatchResult>,
    },
}

impl AgentError {
    /// Raw planner output for diagnostics, when that is what failed
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            AgentError::PlanningMalformed { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// The failure that ended the run, unwrapped from any dispatch context
    pub fn root(&self) -> &AgentError {
        match self {
            AgentError::DispatchInterrupted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Steps dispatched (and side effects already performed) before the run ended
    pub fn completed_steps(&self) -> &[DispatchResult] {
        match self {
            AgentError::DispatchInterrupted { completed, .. } => completed,
            _ => &[],
        }
    }
}

impl From<triage_config::ConfigError> for AgentError {
    fn from(err: triage_config::ConfigError) -> Self {
        AgentError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Run a backend call under a deadline. Elapsed deadlines become `BackendTimeout`.
pub(crate) async fn with_deadline<T, F>(stage: Stage, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = triage_provider::Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(match stage {
            Stage::Classify => AgentError::ClassifierUnavailable(e.to_string()),
            _ => AgentError::BackendUnavailable {
                stage,
                reason: e.to_string(),
            },
        }),
        Err(_) => {
            warn!("◆ {} BACKEND CALL EXCEEDED {:?}", stage, timeout);
            Err(AgentError::BackendTimeout {
                stage,
                after: timeout,
            })
        }
    }
}

/// Shorten text for log lines
pub(crate) fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [{} chars]", char_count));
    preview
}
