//! Common test utilities for triage CLI tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated HOME with its own `.triage` directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".triage");

        Ok(Self { temp_dir, data_dir })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Command with HOME pointed at the test environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_triage"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write a config pointing the backend at `api_base`
    pub fn create_config(&self, api_base: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let config = format!(
            r#"{{
  "backend": {{
    "api_base": "{}",
    "timeout_secs": 5
  }},
  "pipeline": {{
    "profile": "incident"
  }}
}}"#,
            api_base
        );
        std::fs::write(self.config_file(), config)?;
        Ok(())
    }

    pub fn write_raw_config(&self, content: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.config_file(), content)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
