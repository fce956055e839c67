//! Test execution behind a trait so the validator does not depend on a
//! particular interpreter.

use crate::validation::validator::ValidationResult;
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

pub const PHASE: &str = "tests";

/// Captured stdout/stderr is truncated to this many characters.
const MAX_CAPTURED_CHARS: usize = 500;

#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run a tool's test script. Never errors: every failure mode is a
    /// failed [`ValidationResult`].
    async fn run(&self, script: &Path) -> ValidationResult;
}

/// Runs the script with an external interpreter, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct ProcessTestRunner {
    interpreter: String,
    timeout: Duration,
    env: Vec<(String, String)>,
}

impl ProcessTestRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            env: Vec::new(),
        }
    }

    /// Extra environment for the script, e.g. `TOOLSMITH_BIN`.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl TestRunner for ProcessTestRunner {
    async fn run(&self, script: &Path) -> ValidationResult {
        let mut command = Command::new(&self.interpreter);
        command.kill_on_drop(true);
        // Run from the tool directory; the script path is then relative to it.
        match (script.parent(), script.file_name()) {
            (Some(dir), Some(file)) if !dir.as_os_str().is_empty() => {
                command.current_dir(dir).arg(file);
            }
            _ => {
                command.arg(script);
            }
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                tracing::warn!(script = %script.display(), timeout = ?self.timeout, "Tests timed out");
                return ValidationResult::failed(PHASE, json!({ "error": "Tests timed out" }));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return ValidationResult::failed(
                    PHASE,
                    json!({ "error": format!("Interpreter not found: {}", self.interpreter) }),
                );
            }
            Ok(Err(e)) => return ValidationResult::failed(PHASE, json!({ "error": e.to_string() })),
            Ok(Ok(output)) => output,
        };

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout));
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr));
        let stderr = (!stderr.is_empty()).then_some(stderr);
        let passed = output.status.success();

        let mut details = json!({
            "exit_code": output.status.code(),
            "stdout": stdout,
            "stderr": stderr,
        });
        let lower = stdout.to_lowercase();
        if stdout.contains("OK") || lower.contains("passed") {
            details["tests_passed"] = json!(true);
        }

        ValidationResult::new(PHASE, passed, details)
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_CAPTURED_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("tests.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_exit_zero_passes() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "echo 'all tests passed'\nexit 0\n");
        let runner = ProcessTestRunner::new("sh", Duration::from_secs(10));

        let result = runner.run(&path).await;
        assert!(result.passed);
        assert_eq!(result.details["exit_code"], 0);
        assert_eq!(result.details["tests_passed"], true);
        assert!(result.details["stderr"].is_null());
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "echo boom >&2\nexit 1\n");
        let runner = ProcessTestRunner::new("sh", Duration::from_secs(10));

        let result = runner.run(&path).await;
        assert!(!result.passed);
        assert_eq!(result.details["exit_code"], 1);
        assert_eq!(result.details["stderr"], "boom\n");
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "i=0\nwhile [ $i -lt 200 ]; do printf 'abcdef'; i=$((i+1)); done\n");
        let runner = ProcessTestRunner::new("sh", Duration::from_secs(10));

        let result = runner.run(&path).await;
        assert_eq!(result.details["stdout"].as_str().unwrap().len(), MAX_CAPTURED_CHARS);
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_result() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "sleep 5\n");
        let runner = ProcessTestRunner::new("sh", Duration::from_millis(200));

        let result = runner.run(&path).await;
        assert!(!result.passed);
        assert_eq!(result.details["error"], "Tests timed out");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_failed_result() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "exit 0\n");
        let runner = ProcessTestRunner::new("definitely-not-an-interpreter", Duration::from_secs(1));

        let result = runner.run(&path).await;
        assert!(!result.passed);
        assert!(result.details["error"]
            .as_str()
            .unwrap()
            .starts_with("Interpreter not found"));
    }

    #[tokio::test]
    async fn test_env_is_passed_to_script() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "[ \"$TOOLSMITH_BIN\" = \"/opt/toolsmith\" ]\n");
        let runner = ProcessTestRunner::new("sh", Duration::from_secs(10))
            .with_env("TOOLSMITH_BIN", "/opt/toolsmith");

        assert!(runner.run(&path).await.passed);
    }
}
