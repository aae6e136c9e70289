//! Business actions for the built-in profiles
//!
//! These stand in for the real integrations (case management, paging,
//! deployment tooling) and only log what they would do.

use serde_json::Value;
use tracing::info;

use triage_agent::{ActionArgs, ActionRegistry, ActionSpec, HandlerError, ParamKind};

const RISK_LEVELS: [&str; 3] = ["LOW", "MEDIUM", "HIGH"];
const SEVERITY_LEVELS: [&str; 3] = ["LOW", "HIGH", "SEVERE"];
const HR_CATEGORIES: [&str; 4] = ["harassment", "burnout", "policy_violation", "performance"];

/// Action registry for a built-in profile
pub fn registry_for(profile: &str) -> Option<ActionRegistry> {
    match profile {
        "hr" => Some(hr_registry()),
        "incident" => Some(incident_registry()),
        _ => None,
    }
}

pub fn hr_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();

    registry.register(
        ActionSpec::from_fn("open_hr_case", "Open a confidential HR case", open_hr_case)
            .param("employee_id", ParamKind::String, "Employee identifier")
            .param(
                "category",
                ParamKind::String,
                "harassment | burnout | policy_violation | performance",
            )
            .param("risk_level", ParamKind::String, "LOW | MEDIUM | HIGH"),
    );
    registry.register(
        ActionSpec::from_fn(
            "notify_legal",
            "Notify the legal department about a sensitive HR case",
            notify_legal,
        )
        .param("case_id", ParamKind::String, "HR case identifier"),
    );
    registry.register(
        ActionSpec::from_fn(
            "schedule_hr_meeting",
            "Schedule an HR follow-up meeting",
            schedule_hr_meeting,
        )
        .param("employee_id", ParamKind::String, "Employee identifier")
        .param("urgency", ParamKind::String, "LOW | MEDIUM | HIGH"),
    );

    registry
}

pub fn incident_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();

    registry.register(
        ActionSpec::from_fn("restart_service", "Restart a service", restart_service)
            .param("service", ParamKind::String, "Service name")
            .param("env", ParamKind::String, "Target environment"),
    );
    registry.register(
        ActionSpec::from_fn("scale_service", "Scale a service", scale_service)
            .param("service", ParamKind::String, "Service name")
            .param("replicas", ParamKind::Integer, "Desired replica count"),
    );
    registry.register(
        ActionSpec::from_fn("open_ticket", "Open an incident ticket", open_ticket)
            .param("summary", ParamKind::String, "Short summary")
            .param("severity", ParamKind::String, "LOW | HIGH | SEVERE"),
    );

    registry
}

fn text<'a>(args: &'a ActionArgs, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Uppercased value if it is one of `allowed` (case-insensitive)
fn one_of(args: &ActionArgs, key: &str, allowed: &[&str]) -> Result<String, HandlerError> {
    let value = text(args, key);
    allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(value))
        .map(|a| a.to_string())
        .ok_or_else(|| format!("{} must be one of {}, got '{}'", key, allowed.join(" | "), value).into())
}

fn open_hr_case(args: &ActionArgs) -> Result<(), HandlerError> {
    let category = one_of(args, "category", &HR_CATEGORIES)?;
    let risk = one_of(args, "risk_level", &RISK_LEVELS)?;
    info!(
        "◆ ACTION open HR case employee={} category={} risk={}",
        text(args, "employee_id"),
        category,
        risk
    );
    Ok(())
}

fn notify_legal(args: &ActionArgs) -> Result<(), HandlerError> {
    info!("◆ ACTION notify legal for HR case={}", text(args, "case_id"));
    Ok(())
}

fn schedule_hr_meeting(args: &ActionArgs) -> Result<(), HandlerError> {
    let urgency = one_of(args, "urgency", &RISK_LEVELS)?;
    info!(
        "◆ ACTION schedule HR meeting employee={} urgency={}",
        text(args, "employee_id"),
        urgency
    );
    Ok(())
}

fn restart_service(args: &ActionArgs) -> Result<(), HandlerError> {
    info!(
        "◆ ACTION restart service={} env={}",
        text(args, "service"),
        text(args, "env")
    );
    Ok(())
}

fn scale_service(args: &ActionArgs) -> Result<(), HandlerError> {
    let replicas = args.get("replicas").and_then(Value::as_i64).unwrap_or(-1);
    if replicas < 0 {
        return Err(format!("replicas must be non-negative, got {}", replicas).into());
    }
    info!(
        "◆ ACTION scale service={} replicas={}",
        text(args, "service"),
        replicas
    );
    Ok(())
}

fn open_ticket(args: &ActionArgs) -> Result<(), HandlerError> {
    let severity = one_of(args, "severity", &SEVERITY_LEVELS)?;
    info!(
        "◆ ACTION open ticket severity={} summary={}",
        severity,
        text(args, "summary")
    );
    Ok(())
}
