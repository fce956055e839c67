//! End-to-end on-demand tool creation.
//!
//! detect gap -> approve -> generate -> validate -> (approve on failure) ->
//! load with retries -> append to the creation log.
//!
//! Every step's result is kept in the returned [`CreationOutcome`]. A failed
//! step stops the run, but the outcome is always returned.

use crate::detection::{detect_gap, CapabilityGap, GapDecision};
use crate::persistence::ToolCreationInfo;
use crate::state::AppState;
use crate::validation::ValidationReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Human decisions taken during a run.
pub trait ApprovalGate {
    /// Whether to generate a tool for `gap`.
    fn approve_creation(&mut self, gap: &CapabilityGap) -> bool;

    /// Whether to continue after validation reported failures.
    fn continue_after_failed_validation(&mut self, report: &ValidationReport) -> bool;
}

/// Approves everything.
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    fn approve_creation(&mut self, _gap: &CapabilityGap) -> bool {
        true
    }

    fn continue_after_failed_validation(&mut self, _report: &ValidationReport) -> bool {
        true
    }
}

/// Asks `y/n` questions on stdout and reads answers from stdin.
pub struct StdinApproval;

impl StdinApproval {
    fn ask(question: &str) -> bool {
        print!("{question} (y/n): ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
            Err(_) => false,
        }
    }
}

impl ApprovalGate for StdinApproval {
    fn approve_creation(&mut self, gap: &CapabilityGap) -> bool {
        println!("Gap detected: {}", gap.description);
        println!("  Type: {}", gap.gap_type);
        println!("  Confidence: {:.1}%", gap.confidence * 100.0);
        println!("  Complexity: {}/10", gap.complexity_score);
        println!("  Suggested tool: {}", gap.suggested_tool_name);
        Self::ask("Create this tool?")
    }

    fn continue_after_failed_validation(&mut self, report: &ValidationReport) -> bool {
        println!("Some validation checks failed:");
        for result in &report.validations {
            let mark = if result.passed { "ok" } else { "FAILED" };
            println!("  [{mark}] {}", result.check_name);
        }
        Self::ask("Continue anyway?")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationStep {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotReloadStep {
    pub success: bool,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingStep {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreationSteps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_detection: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotreload: Option<HotReloadStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreationOutcome {
    pub run_id: Uuid,
    pub success: bool,
    pub request: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub steps: CreationSteps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl CreationOutcome {
    fn new(request: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            success: false,
            request: request.to_string(),
            timestamp: Utc::now(),
            message: None,
            steps: CreationSteps::default(),
            tool_id: None,
            tool_name: None,
        }
    }

    fn stop(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// Run the creation workflow for `request`. With `auto_approve` the gate is
/// never consulted.
#[instrument(skip(state, gate), fields(run_id = tracing::field::Empty))]
pub async fn create_tool_on_demand(
    state: &mut AppState,
    request: &str,
    auto_approve: bool,
    gate: &mut dyn ApprovalGate,
) -> CreationOutcome {
    let start = Instant::now();
    let outcome = run(state, request, auto_approve, gate).await;

    let status = if outcome.success { "success" } else { "failure" };
    metrics::counter!("tool_creation_runs_total", "outcome" => status).increment(1);
    metrics::histogram!("tool_creation_latency_ms").record(start.elapsed().as_millis() as f64);

    info!(
        run_id = %outcome.run_id,
        success = outcome.success,
        message = outcome.message.as_deref().unwrap_or(""),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Creation run finished"
    );

    outcome
}

async fn run(
    state: &mut AppState,
    request: &str,
    auto_approve: bool,
    gate: &mut dyn ApprovalGate,
) -> CreationOutcome {
    let mut outcome = CreationOutcome::new(request);
    tracing::Span::current().record("run_id", tracing::field::display(outcome.run_id));

    // Step 1: gap detection against everything on disk
    let available = state.loader.list_available();
    let decision = detect_gap(request, &available);
    outcome.steps.gap_detection = Some(decision.to_json());

    let gap = match decision {
        GapDecision::NoGap { reason, .. } => {
            info!(%reason, "No gap detected");
            outcome.success = true;
            return outcome.stop("No new tool needed");
        }
        GapDecision::Gap(gap) => gap,
    };
    let tool_name = gap.suggested_tool_name.clone();

    // Step 2: approval
    if !auto_approve && !gate.approve_creation(&gap) {
        info!(tool = %tool_name, "Tool creation cancelled");
        return outcome.stop("Cancelled by user");
    }

    // Step 3: generation
    match state
        .generator
        .create_tool(&tool_name, &gap.requirements, &gap)
    {
        Ok(path) => {
            outcome.steps.generation = Some(GenerationStep {
                success: true,
                path: Some(path),
                error: None,
            });
        }
        Err(e) => {
            warn!(tool = %tool_name, error = %e, "Tool generation failed");
            outcome.steps.generation = Some(GenerationStep {
                success: false,
                path: None,
                error: Some(e.to_string()),
            });
            return outcome.stop("Generation failed");
        }
    }

    // Step 4: validation
    let report = state.validator.validate_tool(&tool_name).await;
    let validation_passed = report.all_passed;
    let proceed = validation_passed
        || auto_approve
        || gate.continue_after_failed_validation(&report);
    outcome.steps.validation = Some(report);

    if !proceed {
        return outcome.stop("Validation failed, aborted");
    }

    // Step 5: hot-reload
    let hotreload = load_with_retries(state, &tool_name).await;
    if !hotreload.success {
        warn!(tool = %tool_name, attempts = hotreload.attempts, "Hot-reload failed");
    }
    let hotreload_success = hotreload.success;
    outcome.steps.hotreload = Some(hotreload);

    // Step 6: creation log, recorded even when the load failed
    let entry = ToolCreationInfo {
        name: tool_name.clone(),
        triggered_by: request.to_string(),
        capability_gap: gap.description.clone(),
        capability_gap_type: gap.gap_type.to_string(),
        complexity_score: gap.complexity_score,
        validation_passed,
        hotreload_success,
        status: "active".to_string(),
        version: crate::generation::metadata::INITIAL_VERSION.to_string(),
    };

    match state.creation_log.add_entry(entry) {
        Ok(id) => {
            outcome.steps.logging = Some(LoggingStep {
                success: true,
                error: None,
            });
            outcome.tool_id = Some(id);
        }
        Err(e) => {
            warn!(error = %e, "Failed to write creation log");
            outcome.steps.logging = Some(LoggingStep {
                success: false,
                error: Some(e.to_string()),
            });
            outcome.tool_name = Some(tool_name);
            return outcome.stop("Failed to write creation log");
        }
    }

    outcome.tool_name = Some(tool_name);
    outcome.success = true;
    let message = if hotreload_success {
        "Tool created"
    } else {
        "Tool created; hot-reload failed (may require manual load)"
    };
    outcome.stop(message)
}

/// Try to load the new tool up to `load_retries` times, sleeping
/// `load_retry_delay` between attempts.
async fn load_with_retries(state: &mut AppState, tool_name: &str) -> HotReloadStep {
    let retries = state.config.load_retries.max(1);
    let delay = state.config.load_retry_delay();

    for attempt in 1..=retries {
        if state.loader.load(tool_name, None) {
            return HotReloadStep {
                success: true,
                attempts: attempt,
            };
        }
        if attempt < retries {
            tokio::time::sleep(delay).await;
        }
    }

    HotReloadStep {
        success: false,
        attempts: retries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::loader::{HandlerRegistry, ToolLoader};
    use crate::validation::{TestRunner, ValidationResult};
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    struct PassingRunner;

    #[async_trait]
    impl TestRunner for PassingRunner {
        async fn run(&self, _script: &Path) -> ValidationResult {
            ValidationResult::new("tests", true, serde_json::json!({}))
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl TestRunner for FailingRunner {
        async fn run(&self, _script: &Path) -> ValidationResult {
            ValidationResult::failed("tests", serde_json::json!({"exit_code": 1}))
        }
    }

    /// Records what it was asked and answers from fixed values.
    struct ScriptedGate {
        create: bool,
        continue_on_failure: bool,
        asked: Vec<&'static str>,
    }

    impl ApprovalGate for ScriptedGate {
        fn approve_creation(&mut self, _gap: &CapabilityGap) -> bool {
            self.asked.push("create");
            self.create
        }

        fn continue_after_failed_validation(&mut self, _report: &ValidationReport) -> bool {
            self.asked.push("continue");
            self.continue_on_failure
        }
    }

    fn state_with(dir: &TempDir, runner: Box<dyn TestRunner>) -> AppState {
        let config = Config::for_tools_dir(dir.path().join("skills"));
        AppState::with_runner(config, runner).unwrap()
    }

    const PDF_REQUEST: &str = "Can you read and extract text from PDF files?";

    #[tokio::test]
    async fn test_full_run_creates_loads_and_logs() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(PassingRunner));

        let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.tool_name.as_deref(), Some("pdf-reader"));
        assert_eq!(outcome.tool_id.as_deref(), Some("tool_001"));
        assert!(outcome.steps.validation.as_ref().unwrap().all_passed);
        assert!(outcome.steps.hotreload.as_ref().unwrap().success);
        assert!(state.loader.is_loaded("pdf-reader"));

        let entry = &state.creation_log.get_tools()[0];
        assert_eq!(entry.info.capability_gap_type, "domain-gap");
        assert!(entry.info.validation_passed);
        assert!(entry.info.hotreload_success);
    }

    #[tokio::test]
    async fn test_existing_match_needs_no_tool() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(PassingRunner));
        let tool = dir.path().join("skills").join("data-transform-convert-csv-json");
        std::fs::create_dir_all(&tool).unwrap();
        std::fs::write(tool.join(crate::layout::SKILL_DOC), "---\nname: x\n---\n").unwrap();

        let outcome =
            create_tool_on_demand(&mut state, "Convert CSV to JSON format", true, &mut AutoApprove)
                .await;

        assert!(outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("No new tool needed"));
        assert_eq!(outcome.steps.gap_detection.as_ref().unwrap()["gap_detected"], false);
        assert!(outcome.steps.generation.is_none());
        assert!(state.creation_log.get_tools().is_empty());
    }

    #[tokio::test]
    async fn test_declined_approval_stops_before_generation() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(PassingRunner));
        let mut gate = ScriptedGate {
            create: false,
            continue_on_failure: true,
            asked: Vec::new(),
        };

        let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, false, &mut gate).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Cancelled by user"));
        assert_eq!(gate.asked, vec!["create"]);
        assert!(!dir.path().join("skills").join("pdf-reader").exists());
    }

    #[tokio::test]
    async fn test_failed_validation_can_abort() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(FailingRunner));
        let mut gate = ScriptedGate {
            create: true,
            continue_on_failure: false,
            asked: Vec::new(),
        };

        let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, false, &mut gate).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Validation failed, aborted"));
        assert_eq!(gate.asked, vec!["create", "continue"]);
        assert!(outcome.steps.hotreload.is_none());
        assert!(state.creation_log.get_tools().is_empty());
    }

    #[tokio::test]
    async fn test_auto_approve_continues_past_failed_validation() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(FailingRunner));

        let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;

        assert!(outcome.success);
        let entry = &state.creation_log.get_tools()[0];
        assert!(!entry.info.validation_passed);
        assert!(entry.info.hotreload_success);
    }

    #[tokio::test]
    async fn test_failed_load_is_still_logged() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(PassingRunner));
        state.config.load_retries = 2;
        // No handlers registered, so the generated manifest cannot be imported
        state.loader = ToolLoader::with_handlers(dir.path().join("skills"), HandlerRegistry::empty());

        let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;

        assert!(outcome.success);
        let hotreload = outcome.steps.hotreload.as_ref().unwrap();
        assert!(!hotreload.success);
        assert_eq!(hotreload.attempts, 2);
        assert!(outcome.message.unwrap().contains("hot-reload failed"));

        let entry = &state.creation_log.get_tools()[0];
        assert!(!entry.info.hotreload_success);
        assert_eq!(state.creation_log.get_stats().hotreload_success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_generation_failure_short_circuits() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(PassingRunner));
        std::fs::write(dir.path().join("skills").join("pdf-reader"), "not a directory").unwrap();

        let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Generation failed"));
        assert!(!outcome.steps.generation.as_ref().unwrap().success);
        assert!(outcome.steps.validation.is_none());
    }

    #[tokio::test]
    async fn test_outcome_serializes_steps() {
        let dir = TempDir::new().unwrap();
        let mut state = state_with(&dir, Box::new(PassingRunner));

        let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["steps"]["gap_detection"]["gap_detected"], true);
        assert_eq!(json["steps"]["gap_detection"]["gap_type"], "domain-gap");
        assert_eq!(json["steps"]["hotreload"]["attempts"], 1);
        assert!(json["run_id"].as_str().is_some());
    }
}
