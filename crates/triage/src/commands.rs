//! Triage command implementations

use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

use triage_agent::{DispatchOutcome, Orchestrator, PipelineState, TriageReport};
use triage_config::{self, Config, ProfileConfig};

use crate::handlers;

/// Options for `triage run`
pub struct RunOptions {
    pub profile: Option<String>,
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub json: bool,
    pub timeout: Option<u64>,
}

/// Initialize config
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing Triage...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = triage_config::init()
        .await
        .context("could not create config")?;

    println!("Config:   {}", triage_config::config_path().display());
    println!("Profiles: {}", config.profile_names().join(", "));

    println!("\n◆ Triage initialized");
    println!("\nNext steps:");
    println!(
        "  1. Pull the models: ollama pull {} && ollama pull {} && ollama pull {}",
        config.backend.embedding_model, config.backend.planner_model, config.backend.selector_model
    );
    println!("  2. Triage a report: triage run -t \"The checkout service is down\" -p incident");

    Ok(())
}

/// Show system status
pub async fn status_command() -> Result<()> {
    let config_path = triage_config::config_path();

    println!("◆ Triage Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await.context("could not load config")?;
    let backend = &config.backend;
    println!("Backend:   {}", backend.api_base);
    println!("Embedding: {}", backend.embedding_model);
    println!("Planner:   {}", backend.planner_model);
    println!("Selector:  {}", backend.selector_model);
    println!("Timeout:   {}s", backend.timeout_secs);

    match config.active_profile() {
        Ok(profile) => println!("Profile:   {} [OK]", profile.name),
        Err(e) => println!("Profile:   {} [{}]", config.pipeline.profile, e),
    }

    println!("\n◆ Ready");

    Ok(())
}

/// List configured profiles
pub async fn profiles_command() -> Result<()> {
    let config = Config::load().await.context("could not load config")?;

    println!("◆ Profiles");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for profile in &config.pipeline.profiles {
        let marker = if profile.name == config.pipeline.profile {
            " (active)"
        } else {
            ""
        };
        println!("{}{}", profile.name, marker);
        println!("  Labels:   {}", profile.label_names().join(", "));
        println!("  Sentinel: {}", profile.sentinel);

        match handlers::registry_for(&profile.name) {
            Some(registry) => {
                println!("  Actions:");
                for signature in registry.vocabulary() {
                    println!("    - {}", signature);
                }
            }
            None => println!("  Actions:  [no handlers]"),
        }

        if let Err(e) = profile.validate() {
            println!("  Invalid:  {}", e);
        }
    }

    Ok(())
}

/// Triage a single report
pub async fn run_command(options: RunOptions) -> Result<()> {
    let mut config = Config::load().await.context("could not load config")?;
    if let Some(secs) = options.timeout {
        config.backend.timeout_secs = secs;
    }

    let profile_name = options
        .profile
        .clone()
        .unwrap_or_else(|| config.pipeline.profile.clone());
    let profile: ProfileConfig = config.profile(&profile_name)?.clone();
    profile.validate()?;

    let registry = handlers::registry_for(&profile.name)
        .with_context(|| format!("no action handlers for profile '{}'", profile.name))?;

    let text = read_report(&options)?;
    debug!("report: {} chars", text.chars().count());

    let orchestrator = Orchestrator::from_config(&config, &profile, registry)
        .await
        .context("could not start the pipeline")?;

    let report = match orchestrator.handle(&text).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(raw) = e.raw_output() {
                eprintln!("Raw planner output:\n{}", raw);
            }
            let completed = e.completed_steps();
            if !completed.is_empty() {
                eprintln!("Steps dispatched before the failure:");
                for result in completed {
                    eprintln!("  [{}] {} -> {}", result.index, result.step, result.outcome.kind());
                }
            }
            return Err(e).context("triage run failed");
        }
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&profile, &report);
    }

    info!("◆ RUN {} COMPLETE", report.run_id);
    Ok(())
}

fn read_report(options: &RunOptions) -> Result<String> {
    if let Some(text) = &options.text {
        return Ok(text.clone());
    }
    if let Some(path) = &options.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()));
    }

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("could not read report from stdin")?;
    Ok(text)
}

fn print_report(profile: &ProfileConfig, report: &TriageReport) {
    println!("◆ Triage Report");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Run:     {}", report.run_id);
    println!("Profile: {}", profile.name);
    println!("Intent:  {}", report.label);

    if report.state == PipelineState::Stopped {
        println!("State:   stopped");
        println!("\nNo action taken: '{}' needs no response", report.label);
        return;
    }
    println!("State:   done");

    let steps = report.plan.as_ref().map(|p| p.len()).unwrap_or(0);
    println!("\nPlan: {} step(s)", steps);

    for result in &report.results {
        println!("  [{}] {}", result.index, result.step);
        match &result.outcome {
            DispatchOutcome::Executed { action } => {
                let args = result
                    .call
                    .as_ref()
                    .map(|c| serde_json::Value::Object(c.args.clone()).to_string())
                    .unwrap_or_default();
                println!("      ✓ executed {} {}", action, args);
            }
            DispatchOutcome::SkippedUnknownAction {
                action: Some(name), ..
            } => {
                println!("      - skipped: unknown action '{}'", name);
            }
            DispatchOutcome::SkippedUnknownAction {
                action: None,
                reason: Some(reason),
            } => {
                println!("      - skipped: {}", reason);
            }
            DispatchOutcome::SkippedUnknownAction { action: None, .. } => {
                println!("      - skipped: no action selected");
            }
            DispatchOutcome::FailedMalformedCall { action, reason } => {
                println!("      ✗ failed {}: {}", action, reason);
            }
        }
    }

    println!(
        "\n◆ {} executed, {} skipped, {} failed",
        report.executed, report.skipped, report.failed
    );
}
