//! Plan generator tests

mod common;

use async_trait::async_trait;
use common::StubGenerator;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use triage_agent::{parse_plan, AgentError, Label, PlanGenerator, PlanPrompt, Stage};
use triage_config::ProfileConfig;
use triage_provider::{GenerationProvider, ProviderError};

mock! {
    pub Generator {}

    #[async_trait]
    impl GenerationProvider for Generator {
        async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError>;
    }
}

const TIMEOUT: Duration = Duration::from_secs(1);

fn hr_vocabulary() -> Vec<String> {
    vec![
        "open_hr_case(employee_id, category, risk_level)".to_string(),
        "notify_legal(case_id)".to_string(),
        "schedule_hr_meeting(employee_id, urgency)".to_string(),
    ]
}

#[tokio::test]
async fn test_plan_prompt_and_zero_temperature() {
    let generator = Arc::new(StubGenerator::new(
        r#"[{"action": "open_hr_case", "employee_id": "E-7", "category": "burnout", "risk_level": "HIGH"}]"#,
    ));
    let planner = PlanGenerator::new(
        generator.clone(),
        PlanPrompt::from_profile(&ProfileConfig::hr()),
        TIMEOUT,
    );

    let plan = planner
        .plan(
            "I have been working 80 hour weeks and can't sleep.",
            &Label::new("burnout"),
            &hr_vocabulary(),
        )
        .await
        .unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.steps[0].action_hint(), Some("open_hr_case"));

    let prompts = generator.prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert!(prompt.starts_with("You are an HR response planner."));
    assert!(prompt.contains("- notify_legal(case_id)\n"));
    assert!(prompt.contains("Employee report:\nI have been working 80 hour weeks"));
    assert!(prompt.contains("Detected intent:\nburnout"));
    assert_eq!(generator.temperatures.lock().unwrap()[0], 0.0);
}

#[tokio::test]
async fn test_fenced_output_matches_unfenced() {
    let body = r#"[{"action": "restart_service", "service": "master", "env": "production"}]"#;
    let prompt = PlanPrompt::from_profile(&ProfileConfig::incident());

    let plain = PlanGenerator::new(Arc::new(StubGenerator::new(body)), prompt.clone(), TIMEOUT);
    let fenced = PlanGenerator::new(
        Arc::new(StubGenerator::new(format!("```json\n{}\n```", body))),
        prompt,
        TIMEOUT,
    );

    let label = Label::new("incident");
    let a = plain.plan("alert", &label, &[]).await.unwrap();
    let b = fenced.plan("alert", &label, &[]).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_sloppy_output_is_repaired() {
    let raw = "Here you go:\n```\n[{action: 'notify_legal', case_id: 'HR-12',},]\n```";
    let planner = PlanGenerator::new(
        Arc::new(StubGenerator::new(raw)),
        PlanPrompt::from_profile(&ProfileConfig::hr()),
        TIMEOUT,
    );

    let plan = planner
        .plan("report", &Label::new("harassment"), &hr_vocabulary())
        .await
        .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.steps[0].fields()["case_id"], "HR-12");
}

#[tokio::test]
async fn test_unsalvageable_output_surfaces_raw_text() {
    let raw = "I'm sorry, I cannot help with that.";
    let planner = PlanGenerator::new(
        Arc::new(StubGenerator::new(raw)),
        PlanPrompt::from_profile(&ProfileConfig::hr()),
        TIMEOUT,
    );

    let err = planner
        .plan("report", &Label::new("harassment"), &hr_vocabulary())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::PlanningMalformed { .. }));
    assert_eq!(err.raw_output(), Some(raw));
}

#[tokio::test]
async fn test_with_temperature_is_passed_through() {
    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .withf(|_, temperature| (*temperature - 0.3).abs() < f32::EPSILON)
        .times(1)
        .returning(|_, _| Ok("[]".to_string()));

    let planner = PlanGenerator::new(
        Arc::new(generator),
        PlanPrompt::new("Planner.", "Alert"),
        TIMEOUT,
    )
    .with_temperature(0.3);

    let plan = planner.plan("x", &Label::new("incident"), &[]).await.unwrap();
    assert!(plan.is_empty());
}

#[tokio::test]
async fn test_backend_error_is_unavailable() {
    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .returning(|_, _| Err(ProviderError::Api("model 'phi3:mini' not found".to_string())));

    let planner = PlanGenerator::new(Arc::new(generator), PlanPrompt::new("P.", "Alert"), TIMEOUT);
    let err = planner.plan("x", &Label::new("incident"), &[]).await.unwrap_err();

    match err {
        AgentError::BackendUnavailable { stage, reason } => {
            assert_eq!(stage, Stage::Plan);
            assert!(reason.contains("phi3:mini"));
        }
        other => panic!("Expected BackendUnavailable, got {:?}", other),
    }
}

#[test]
fn test_parse_plan_object_wrapper() {
    let plan = parse_plan(r#"{"actions": [{"action": "open_ticket"}]}"#).unwrap();
    assert_eq!(plan.len(), 1);
}
