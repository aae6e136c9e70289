//! Configuration management for triage
//!
//! Loads backend settings and deployment profiles from `~/.triage/config.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG IO ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG PARSE FAILED: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UNKNOWN PROFILE: {0}")]
    UnknownProfile(String),

    #[error("INVALID PROFILE '{profile}': {reason}")]
    InvalidProfile { profile: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model backend endpoint and model names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_planner_model")]
    pub planner_model: String,
    #[serde(default = "default_selector_model")]
    pub selector_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub planner_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            embedding_model: default_embedding_model(),
            planner_model: default_planner_model(),
            selector_model: default_selector_model(),
            timeout_secs: default_timeout_secs(),
            planner_temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

impl BackendConfig {
    /// Per-call backend timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_base() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_planner_model() -> String {
    "phi3:mini".to_string()
}

fn default_selector_model() -> String {
    "functiongemma".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    1024
}

/// One classification label and the text its reference embedding is seeded from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    pub name: String,
    pub description: String,
}

impl LabelConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A deployment: label taxonomy, sentinel label and prompt wording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    /// Heading for the input text inside the planner prompt, e.g. "Employee report"
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Opening line(s) of the planner prompt
    #[serde(default = "default_planner_role")]
    pub planner_role: String,
    #[serde(default)]
    pub labels: Vec<LabelConfig>,
    /// Label that stops the pipeline after classification
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    #[serde(default = "default_selector_instruction")]
    pub selector_instruction: String,
}

fn default_subject() -> String {
    "Report".to_string()
}

fn default_planner_role() -> String {
    "You are a response planner.".to_string()
}

fn default_sentinel() -> String {
    "noise".to_string()
}

fn default_selector_instruction() -> String {
    "Select the correct function and arguments for the following action step:".to_string()
}

impl ProfileConfig {
    /// HR triage: confidential employee reports
    pub fn hr() -> Self {
        Self {
            name: "hr".to_string(),
            subject: "Employee report".to_string(),
            planner_role: "You are an HR response planner.\n\n\
                Given a confidential employee report and its classified intent,\n\
                produce an ordered plan of actions."
                .to_string(),
            labels: vec![
                LabelConfig::new(
                    "harassment",
                    "Harassment, intimidation, or misconduct at work",
                ),
                LabelConfig::new("burnout", "Employee burnout, stress, or mental health risk"),
                LabelConfig::new("policy_violation", "Internal policy or ethics violation"),
                LabelConfig::new("performance", "Performance or role-related concern"),
                LabelConfig::new("noise", "Irrelevant or non-HR related input"),
            ],
            sentinel: "noise".to_string(),
            selector_instruction:
                "Select the correct function and arguments for the following HR action step:"
                    .to_string(),
        }
    }

    /// Incident response: production alerts
    pub fn incident() -> Self {
        Self {
            name: "incident".to_string(),
            subject: "Alert".to_string(),
            planner_role: "You are an incident response planner.\n\n\
                Given an alert, produce a plan with ordered steps containing the function \
                to call and the parameters."
                .to_string(),
            labels: vec![
                LabelConfig::new("incident", "System incident or outage"),
                LabelConfig::new("question", "User question"),
                LabelConfig::new("noise", "Irrelevant input"),
            ],
            sentinel: "noise".to_string(),
            selector_instruction: "Select the correct function for the following step:"
                .to_string(),
        }
    }

    /// Check the label set invariants
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ConfigError::InvalidProfile {
            profile: self.name.clone(),
            reason,
        };

        if self.labels.is_empty() {
            return Err(invalid("label set is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for label in &self.labels {
            if label.name.trim().is_empty() {
                return Err(invalid("label with empty name".to_string()));
            }
            if !seen.insert(label.name.as_str()) {
                return Err(invalid(format!("duplicate label '{}'", label.name)));
            }
        }

        if !seen.contains(self.sentinel.as_str()) {
            return Err(invalid(format!(
                "sentinel '{}' is not one of the labels",
                self.sentinel
            )));
        }

        Ok(())
    }

    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }
}

/// Pipeline selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_profiles")]
    pub profiles: Vec<ProfileConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            profiles: default_profiles(),
        }
    }
}

fn default_profile() -> String {
    "hr".to_string()
}

fn default_profiles() -> Vec<ProfileConfig> {
    vec![ProfileConfig::hr(), ProfileConfig::incident()]
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ NO CONFIG AT {:?}, USING DEFAULTS", path);
            return Ok(Config::default());
        }

        debug!("◆ READING CONFIG FROM {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ WRITING CONFIG TO {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Result<&ProfileConfig> {
        self.pipeline
            .profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    /// The configured profile, validated
    pub fn active_profile(&self) -> Result<&ProfileConfig> {
        let profile = self.profile(&self.pipeline.profile)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.pipeline
            .profiles
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// Create the data directory and a default config
pub async fn init() -> Result<Config> {
    init_at(&config_path()).await
}

/// Same as [`init`] for an explicit config location
pub async fn init_at(path: &Path) -> Result<Config> {
    if path.exists() {
        warn!("◆ CONFIG ALREADY PRESENT AT {:?}", path);
    } else {
        Config::default().save_to(path).await?;
        info!("◆ CONFIG CREATED AT {:?}", path);
    }

    Config::load_from(path).await
}
