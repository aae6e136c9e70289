//! Tests for error handling

use std::io;
use triage_config::ConfigError;

#[test]
fn test_io_error_display() {
    let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let err = ConfigError::Io(io_err);

    let display = format!("{}", err);
    assert!(display.contains("CONFIG IO ERROR"));
    assert!(display.contains("file not found"));
}

#[test]
fn test_json_error_display() {
    let json_err: serde_json::Error =
        serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
    let err: ConfigError = json_err.into();

    assert!(err.to_string().contains("CONFIG PARSE FAILED"));
}

#[test]
fn test_profile_error_display() {
    let err = ConfigError::UnknownProfile("payroll".to_string());
    assert_eq!(err.to_string(), "UNKNOWN PROFILE: payroll");

    let err = ConfigError::InvalidProfile {
        profile: "hr".to_string(),
        reason: "label set is empty".to_string(),
    };
    assert_eq!(err.to_string(), "INVALID PROFILE 'hr': label set is empty");
}

#[test]
fn test_error_trait() {
    fn check_error_trait<T: std::error::Error + Send + Sync>() {}
    check_error_trait::<ConfigError>();
}
