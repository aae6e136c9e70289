//! Shared stubs for agent integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use triage_agent::{
    ActionArgs, ActionCall, ActionRegistry, ActionSpec, FunctionSelector, ParamKind, PlanStep,
};
use triage_provider::{EmbeddingProvider, GenerationProvider, ProviderError, Tool};

/// Deterministic embedder: one-hot vectors for known texts
pub struct StubEmbedder {
    table: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
    pub delay_unknown: Option<Duration>,
    pub fail_unknown: bool,
}

impl StubEmbedder {
    /// Each text gets its own axis, in the order given
    pub fn one_hot(texts: &[&str]) -> Self {
        let dims = texts.len() + 1;
        let table = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut v = vec![0.0; dims];
                v[i] = 1.0;
                (text.to_string(), v)
            })
            .collect();

        Self {
            table,
            calls: AtomicUsize::new(0),
            delay_unknown: None,
            fail_unknown: false,
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(v) = self.table.get(text) {
            return Ok(v.clone());
        }
        if let Some(delay) = self.delay_unknown {
            tokio::time::sleep(delay).await;
        }
        if self.fail_unknown {
            return Err(ProviderError::Api("model not loaded".to_string()));
        }

        // unknown text lands on the last, unused axis
        let dims = self.table.values().next().map(|v| v.len()).unwrap_or(1);
        let mut v = vec![0.0; dims];
        v[dims - 1] = 1.0;
        Ok(v)
    }
}

/// Generator returning a fixed answer and recording prompts
pub struct StubGenerator {
    answer: String,
    pub prompts: Mutex<Vec<String>>,
    pub temperatures: Mutex<Vec<f32>>,
}

impl StubGenerator {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            prompts: Mutex::new(Vec::new()),
            temperatures: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for StubGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.temperatures.lock().unwrap().push(temperature);
        Ok(self.answer.clone())
    }
}

/// Selector that reads the call straight out of the step:
/// `{"action": name, "args": {...}}`. Steps without an action select nothing.
#[derive(Default)]
pub struct EchoSelector {
    pub calls: AtomicUsize,
}

impl EchoSelector {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FunctionSelector for EchoSelector {
    async fn select(
        &self,
        step: &PlanStep,
        _actions: &[Tool],
    ) -> Result<Option<ActionCall>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(name) = step.action_hint() else {
            return Ok(None);
        };
        let args = match step.fields().get("args") {
            Some(Value::Object(map)) => map.clone(),
            _ => ActionArgs::new(),
        };
        Ok(Some(ActionCall::new(name, args)))
    }
}

/// Registry with a single action `name(param)` that records its invocations
pub fn recording_registry(name: &str, param: &str) -> (ActionRegistry, Arc<Mutex<Vec<ActionArgs>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let mut registry = ActionRegistry::new();
    registry.register(
        ActionSpec::from_fn(name, "Recorded action", move |args| {
            sink.lock().unwrap().push(args.clone());
            Ok(())
        })
        .param(param, ParamKind::String, "Parameter"),
    );

    (registry, seen)
}
