//! Pipeline orchestrator
//!
//! `Received -> Classified -> (Stopped | Planned) -> Dispatched -> Done`

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use triage_config::{Config, ProfileConfig};
use triage_provider::OllamaProvider;

use crate::actions::ActionRegistry;
use crate::classifier::{Classifier, Label, LabelSet};
use crate::dispatcher::{ChatSelector, DispatchOutcome, DispatchResult, Dispatcher};
use crate::planner::{Plan, PlanGenerator, PlanPrompt};
use crate::Result;

/// Pipeline states. Only `Stopped` and `Done` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Classified,
    Stopped,
    Planned,
    Dispatched,
    Done,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Done)
    }
}

/// Terminal result of one `handle` call
#[derive(Debug, Clone, Serialize)]
pub struct TriageReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub label: Label,
    pub state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    pub results: Vec<DispatchResult>,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TriageReport {
    fn new(run_id: Uuid, started_at: DateTime<Utc>, label: Label) -> Self {
        Self {
            run_id,
            started_at,
            label,
            state: PipelineState::Classified,
            plan: None,
            results: Vec::new(),
            executed: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn tally(&mut self) {
        for result in &self.results {
            match result.outcome {
                DispatchOutcome::Executed { .. } => self.executed += 1,
                DispatchOutcome::SkippedUnknownAction { .. } => self.skipped += 1,
                DispatchOutcome::FailedMalformedCall { .. } => self.failed += 1,
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PipelineState::Stopped
    }
}

/// Classifier, planner and dispatcher wired together. Holds no per-call state,
/// so `handle` can run concurrently behind an `Arc`.
pub struct Orchestrator {
    classifier: Classifier,
    planner: PlanGenerator,
    dispatcher: Dispatcher,
    vocabulary: Vec<String>,
}

impl Orchestrator {
    pub fn new(classifier: Classifier, planner: PlanGenerator, dispatcher: Dispatcher) -> Self {
        let vocabulary = dispatcher.registry().vocabulary();
        Self {
            classifier,
            planner,
            dispatcher,
            vocabulary,
        }
    }

    /// Build against the configured Ollama backend. Embeds the label set.
    pub async fn from_config(
        config: &Config,
        profile: &ProfileConfig,
        registry: ActionRegistry,
    ) -> Result<Self> {
        let backend = &config.backend;
        let timeout = backend.timeout();
        info!(
            "◆ BUILDING PIPELINE '{}' AGAINST {}",
            profile.name, backend.api_base
        );

        let embedder = Arc::new(OllamaProvider::new(
            &backend.api_base,
            &backend.embedding_model,
        ));
        let generator = Arc::new(
            OllamaProvider::new(&backend.api_base, &backend.planner_model)
                .with_max_tokens(backend.max_tokens),
        );
        let chat = Arc::new(OllamaProvider::new(
            &backend.api_base,
            &backend.selector_model,
        ));

        let labels = LabelSet::from_profile(profile)?;
        let classifier = Classifier::initialize(embedder, labels, timeout).await?;

        let planner = PlanGenerator::new(generator, PlanPrompt::from_profile(profile), timeout)
            .with_temperature(backend.planner_temperature);

        let selector = ChatSelector::new(chat, &profile.selector_instruction)
            .with_max_tokens(backend.max_tokens);
        let dispatcher = Dispatcher::new(Arc::new(selector), Arc::new(registry), timeout);

        Ok(Self::new(classifier, planner, dispatcher))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn registry(&self) -> &ActionRegistry {
        self.dispatcher.registry()
    }

    /// Run one report through the pipeline
    pub async fn handle(&self, text: &str) -> Result<TriageReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("◆ RUN {} RECEIVED ({} chars)", run_id, text.chars().count());

        let outcome = self.run(run_id, started_at, text).await;
        if let Err(e) = &outcome {
            error!("◆ RUN {} ABORTED: {}", run_id, e);
        }
        outcome
    }

    async fn run(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        text: &str,
    ) -> Result<TriageReport> {
        let label = self.classifier.detect(text).await?;
        let mut report = TriageReport::new(run_id, started_at, label);
        info!("◆ RUN {} CLASSIFIED AS '{}'", run_id, report.label);

        if self.classifier.labels().is_sentinel(&report.label) {
            report.state = PipelineState::Stopped;
            info!("◆ RUN {} STOPPED: SENTINEL LABEL", run_id);
            return Ok(report);
        }

        let plan = self
            .planner
            .plan(text, &report.label, &self.vocabulary)
            .await?;
        report.state = PipelineState::Planned;

        report.results = self.dispatcher.dispatch_all(&plan).await?;
        report.plan = Some(plan);
        report.state = PipelineState::Dispatched;
        report.tally();

        report.state = PipelineState::Done;
        info!(
            "◆ RUN {} DONE: {} EXECUTED, {} SKIPPED, {} FAILED",
            run_id, report.executed, report.skipped, report.failed
        );
        Ok(report)
    }
}
