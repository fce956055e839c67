//! Phased validation of a tool directory.
//!
//! Structure, documentation and metadata checks always run. The syntax phase
//! runs when an implementation manifest exists and the tests phase when a
//! test script exists.

use crate::layout;
use crate::validation::runner::TestRunner;
use crate::validation::syntax;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};

const REQUIRED_SECTIONS: [&str; 4] = [
    "Overview",
    "Core Capabilities",
    "Implementation Pattern",
    "Usage Examples",
];
const REQUIRED_FIELDS: [&str; 5] = ["skill_name", "created_by", "created_at", "version", "status"];
const VALID_STATUSES: [&str; 3] = ["active", "inactive", "deprecated"];
const MIN_DOC_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(rename = "check")]
    pub check_name: String,
    pub passed: bool,
    pub details: Value,
}

impl ValidationResult {
    pub fn new(check_name: &str, passed: bool, details: Value) -> Self {
        Self {
            check_name: check_name.to_string(),
            passed,
            details,
        }
    }

    pub fn failed(check_name: &str, details: Value) -> Self {
        Self::new(check_name, false, details)
    }

    /// Result for a map of named boolean checks; passes iff all are true.
    fn from_checks(check_name: &str, checks: Vec<(String, bool)>) -> Self {
        let passed = checks.iter().all(|(_, ok)| *ok);
        let details: Map<String, Value> = checks
            .into_iter()
            .map(|(name, ok)| (name, Value::Bool(ok)))
            .collect();
        Self::new(check_name, passed, Value::Object(details))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_path: Option<PathBuf>,
    /// Phase results in execution order.
    pub validations: Vec<ValidationResult>,
    pub all_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_retries_failed: bool,
}

impl ValidationReport {
    pub fn phase(&self, name: &str) -> Option<&ValidationResult> {
        self.validations.iter().find(|v| v.check_name == name)
    }

    /// Names of phases that did not pass.
    pub fn failed_phases(&self) -> Vec<&str> {
        self.validations
            .iter()
            .filter(|v| !v.passed)
            .map(|v| v.check_name.as_str())
            .collect()
    }
}

pub struct ToolValidator {
    tools_dir: PathBuf,
    runner: Box<dyn TestRunner>,
    retry_delay: Duration,
}

impl ToolValidator {
    pub fn new(tools_dir: impl Into<PathBuf>, runner: Box<dyn TestRunner>) -> Self {
        Self {
            tools_dir: tools_dir.into(),
            runner,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[instrument(skip(self))]
    pub async fn validate_tool(&self, tool_name: &str) -> ValidationReport {
        if let Err(e) = layout::check_tool_name(tool_name) {
            warn!(tool = tool_name, "Rejected tool name");
            return ValidationReport {
                tool_name: tool_name.to_string(),
                all_passed: false,
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
        let tool_path = self.tools_dir.join(tool_name);

        if !tool_path.is_dir() {
            warn!(tool = tool_name, "Tool directory does not exist");
            return ValidationReport {
                tool_name: tool_name.to_string(),
                all_passed: false,
                error: Some("Tool directory does not exist".to_string()),
                ..Default::default()
            };
        }

        let mut validations = vec![
            validate_structure(&tool_path),
            validate_documentation(&tool_path),
            validate_metadata(&tool_path),
        ];

        let manifest = tool_path.join(layout::IMPLEMENTATION);
        if manifest.exists() {
            validations.push(syntax::check_manifest(&manifest));
        }

        let tests = tool_path.join(layout::TESTS);
        if tests.exists() {
            validations.push(self.runner.run(&tests).await);
        }

        let all_passed = validations.iter().all(|v| v.passed);
        let report = ValidationReport {
            tool_name: tool_name.to_string(),
            tool_path: Some(tool_path),
            validations,
            all_passed,
            ..Default::default()
        };

        let outcome = if all_passed { "passed" } else { "failed" };
        info!(
            tool = tool_name,
            outcome,
            failed_phases = ?report.failed_phases(),
            "Validation complete"
        );
        metrics::counter!("tool_validations_total", "outcome" => outcome).increment(1);

        report
    }

    /// Re-run validation up to `max_retries` times (at least once), sleeping
    /// between attempts. Returns the first fully passing report.
    pub async fn validate_with_retry(&self, tool_name: &str, max_retries: usize) -> ValidationReport {
        let max_retries = max_retries.max(1);

        let mut attempt = 1;
        loop {
            let mut report = self.validate_tool(tool_name).await;
            report.attempts = Some(attempt);

            if report.all_passed {
                return report;
            }
            if attempt == max_retries {
                report.all_retries_failed = true;
                return report;
            }

            tokio::time::sleep(self.retry_delay).await;
            attempt += 1;
        }
    }
}

pub fn validate_structure(tool_path: &Path) -> ValidationResult {
    let skill_doc = tool_path.join(layout::SKILL_DOC);

    let front_matter_valid = std::fs::read_to_string(&skill_doc)
        .map(|content| content.starts_with("---") && content.matches("---").count() >= 2)
        .unwrap_or(false);

    ValidationResult::from_checks(
        "structure",
        vec![
            ("has_skill_md".to_string(), skill_doc.is_file()),
            (
                "has_metadata".to_string(),
                tool_path.join(layout::METADATA).is_file(),
            ),
            (
                "directory_readable".to_string(),
                std::fs::read_dir(tool_path).is_ok(),
            ),
            ("front_matter_valid".to_string(), front_matter_valid),
        ],
    )
}

pub fn validate_documentation(tool_path: &Path) -> ValidationResult {
    const PHASE: &str = "documentation";
    let skill_doc = tool_path.join(layout::SKILL_DOC);

    if !skill_doc.exists() {
        return ValidationResult::failed(PHASE, json!({ "error": "SKILL.md not found" }));
    }

    let content = match std::fs::read_to_string(&skill_doc) {
        Ok(content) => content,
        Err(e) => return ValidationResult::failed(PHASE, json!({ "error": e.to_string() })),
    };

    let mut checks: Vec<(String, bool)> = REQUIRED_SECTIONS
        .iter()
        .map(|section| {
            (
                format!("has_{}", section.to_lowercase().replace(' ', "_")),
                content.contains(&format!("## {section}")),
            )
        })
        .collect();
    checks.push(("sufficient_content".to_string(), content.len() > MIN_DOC_CHARS));
    checks.push(("has_code_examples".to_string(), content.contains("```")));

    ValidationResult::from_checks(PHASE, checks)
}

pub fn validate_metadata(tool_path: &Path) -> ValidationResult {
    const PHASE: &str = "metadata";
    let metadata_path = tool_path.join(layout::METADATA);

    if !metadata_path.exists() {
        return ValidationResult::failed(PHASE, json!({ "error": "metadata.json not found" }));
    }

    let metadata: Value = match std::fs::read_to_string(&metadata_path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON: {e}")))
    {
        Ok(metadata) => metadata,
        Err(error) => return ValidationResult::failed(PHASE, json!({ "error": error })),
    };

    let mut checks: Vec<(String, bool)> = REQUIRED_FIELDS
        .iter()
        .map(|field| (format!("has_{field}"), metadata.get(field).is_some()))
        .collect();

    if let Some(version) = metadata.get("version") {
        let valid = version.as_str().is_some_and(|v| !v.is_empty());
        checks.push(("version_valid".to_string(), valid));
    }
    if let Some(status) = metadata.get("status") {
        let valid = status
            .as_str()
            .is_some_and(|s| VALID_STATUSES.contains(&s));
        checks.push(("status_valid".to_string(), valid));
    }

    ValidationResult::from_checks(PHASE, checks)
}
