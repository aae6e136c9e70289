//! Similarity classifier
//!
//! Nearest-neighbour intent detection over label description embeddings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use triage_config::ProfileConfig;
use triage_provider::EmbeddingProvider;

use crate::{with_deadline, AgentError, Result, Stage};

/// Classification outcome from a closed label set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for Label {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Immutable label taxonomy with exactly one sentinel
#[derive(Debug, Clone)]
pub struct LabelSet {
    entries: Vec<(Label, String)>,
    sentinel: usize,
}

impl LabelSet {
    /// Build from `(name, description)` pairs in iteration order
    pub fn new<N, D>(labels: impl IntoIterator<Item = (N, D)>, sentinel: &str) -> Result<Self>
    where
        N: Into<String>,
        D: Into<String>,
    {
        let entries: Vec<(Label, String)> = labels
            .into_iter()
            .map(|(name, description)| (Label::new(name), description.into()))
            .collect();

        if entries.is_empty() {
            return Err(AgentError::InvalidConfig("label set is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for (label, _) in &entries {
            if label.as_str().trim().is_empty() {
                return Err(AgentError::InvalidConfig("label with empty name".to_string()));
            }
            if !seen.insert(label.as_str()) {
                return Err(AgentError::InvalidConfig(format!(
                    "duplicate label '{}'",
                    label
                )));
            }
        }

        let sentinel = entries
            .iter()
            .position(|(label, _)| label.as_str() == sentinel)
            .ok_or_else(|| {
                AgentError::InvalidConfig(format!("sentinel '{}' is not a label", sentinel))
            })?;

        Ok(Self { entries, sentinel })
    }

    pub fn from_profile(profile: &ProfileConfig) -> Result<Self> {
        profile.validate()?;
        Self::new(
            profile
                .labels
                .iter()
                .map(|l| (l.name.clone(), l.description.clone())),
            &profile.sentinel,
        )
    }

    pub fn sentinel(&self) -> &Label {
        &self.entries[self.sentinel].0
    }

    pub fn is_sentinel(&self, label: &Label) -> bool {
        label == self.sentinel()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.entries.iter().map(|(label, _)| label)
    }

    pub fn description(&self, label: &Label) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, d)| d.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cosine similarity. Zero-norm, mismatched or non-finite input scores
/// `f32::NEG_INFINITY` so it never wins against a real score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return f32::NEG_INFINITY;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return f32::NEG_INFINITY;
    }

    let score = (dot / denom) as f32;
    if score.is_finite() {
        score
    } else {
        f32::NEG_INFINITY
    }
}

/// Maps free text to a label. Reference embeddings are computed once in
/// [`Classifier::initialize`] and never change afterwards.
pub struct Classifier {
    embedder: Arc<dyn EmbeddingProvider>,
    labels: LabelSet,
    references: Vec<Vec<f32>>,
    timeout: Duration,
}

impl Classifier {
    /// Embed every label description
    pub async fn initialize(
        embedder: Arc<dyn EmbeddingProvider>,
        labels: LabelSet,
        timeout: Duration,
    ) -> Result<Self> {
        info!("◆ LOADING {} LABEL EMBEDDINGS", labels.len());

        let mut references = Vec::with_capacity(labels.len());
        for (label, description) in &labels.entries {
            let embedding =
                with_deadline(Stage::Classify, timeout, embedder.embed(description)).await?;
            debug!("label '{}' embedded ({} dims)", label, embedding.len());
            references.push(embedding);
        }

        Ok(Self {
            embedder,
            labels,
            references,
            timeout,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Detect the label of `text`. Blank text is the sentinel, without a backend call.
    pub async fn detect(&self, text: &str) -> Result<Label> {
        if text.trim().is_empty() {
            debug!("blank input, classifying as sentinel");
            return Ok(self.labels.sentinel().clone());
        }

        let embedding =
            with_deadline(Stage::Classify, self.timeout, self.embedder.embed(text)).await?;
        let (label, score) = self.nearest(&embedding);
        debug!("nearest label '{}' (score {:.4})", label, score);

        Ok(label.clone())
    }

    /// Highest-scoring label for a query vector; ties go to the earlier label
    pub fn nearest(&self, query: &[f32]) -> (&Label, f32) {
        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (i, reference) in self.references.iter().enumerate() {
            let score = cosine_similarity(query, reference);
            if score > best_score {
                best = i;
                best_score = score;
            }
        }

        (&self.labels.entries[best].0, best_score)
    }
}
