//! Plan generator
//!
//! Asks a generation backend for an ordered list of action steps and
//! salvages whatever structure the answer carries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use triage_config::ProfileConfig;
use triage_provider::GenerationProvider;

use crate::classifier::Label;
use crate::repair::{parse_lenient, strip_fences, Parsed};
use crate::{truncate_for_log, with_deadline, AgentError, Result, Stage};

/// Keys under which a wrapped plan may sit, in priority order
const WRAPPER_KEYS: [&str; 3] = ["steps", "plan", "actions"];

const INSTRUCTIONS: &str = "Do not explain just return the steps in the plan.\n\
    Return the plan as a JSON array of steps each step contains one of the available actions.";

/// One opaque plan step. Only validated when dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanStep(Map<String, Value>);

impl PlanStep {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Action name the planner suggested, if any
    pub fn action_hint(&self) -> Option<&str> {
        ["action", "function", "tool", "name"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Ordered plan. Empty plans are valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Accept an array of objects, or an object wrapping one under a known key
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => {
                let key = WRAPPER_KEYS
                    .iter()
                    .find(|k| map.get(**k).map(Value::is_array).unwrap_or(false))
                    .ok_or_else(|| "expected a JSON array of steps".to_string())?;
                match map.remove(*key) {
                    Some(Value::Array(items)) => items,
                    _ => return Err("expected a JSON array of steps".to_string()),
                }
            }
            other => return Err(format!("expected a JSON array of steps, got {}", kind(&other))),
        };

        let steps = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(fields) => Ok(PlanStep(fields)),
                other => Err(format!("step {} is {}, not an object", i, kind(&other))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Sanitize raw generator output into a plan
pub fn parse_plan(raw: &str) -> Result<Plan> {
    let cleaned = strip_fences(raw);

    let value = match parse_lenient(&cleaned) {
        Parsed::Value(v) => v,
        Parsed::Unparsable { reason } => {
            return Err(AgentError::PlanningMalformed {
                raw: raw.to_string(),
                reason,
            })
        }
    };

    Plan::from_value(value).map_err(|reason| AgentError::PlanningMalformed {
        raw: raw.to_string(),
        reason,
    })
}

/// Planner prompt wording for one deployment
#[derive(Debug, Clone)]
pub struct PlanPrompt {
    pub role: String,
    pub subject: String,
}

impl PlanPrompt {
    pub fn new(role: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            subject: subject.into(),
        }
    }

    pub fn from_profile(profile: &ProfileConfig) -> Self {
        Self::new(&profile.planner_role, &profile.subject)
    }

    pub fn render(&self, text: &str, label: &Label, vocabulary: &[String]) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.role.trim());
        prompt.push_str("\n\n");
        prompt.push_str(INSTRUCTIONS);
        prompt.push_str("\n\nAvailable actions:\n");
        for signature in vocabulary {
            prompt.push_str("- ");
            prompt.push_str(signature);
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            "\n{}:\n{}\n\nDetected intent:\n{}\n",
            self.subject, text, label
        ));
        prompt
    }
}

/// Turns (text, label) into a [`Plan`]
pub struct PlanGenerator {
    generator: Arc<dyn GenerationProvider>,
    prompt: PlanPrompt,
    temperature: f32,
    timeout: Duration,
}

impl PlanGenerator {
    pub fn new(generator: Arc<dyn GenerationProvider>, prompt: PlanPrompt, timeout: Duration) -> Self {
        Self {
            generator,
            prompt,
            temperature: 0.0,
            timeout,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn plan(&self, text: &str, label: &Label, vocabulary: &[String]) -> Result<Plan> {
        let prompt = self.prompt.render(text, label, vocabulary);
        debug!("◆ PLANNER PROMPT: {}", truncate_for_log(&prompt, 400));

        let raw = with_deadline(
            Stage::Plan,
            self.timeout,
            self.generator.generate(&prompt, self.temperature),
        )
        .await?;
        debug!("◆ PLANNER OUTPUT: {}", truncate_for_log(&raw, 400));

        match parse_plan(&raw) {
            Ok(plan) => {
                info!("◆ PLAN READY: {} STEPS", plan.len());
                Ok(plan)
            }
            Err(e) => {
                error!("◆ PLANNER OUTPUT UNUSABLE: {}", truncate_for_log(&raw, 200));
                Err(e)
            }
        }
    }
}
