//! End-to-end tool creation against a temporary tools directory.
//!
//! Generated `tests.sh` scripts call back into the compiled `toolsmith`
//! binary, so these tests exercise detection, generation, script-based
//! validation, hot-loading and the creation log together.

use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use toolsmith::layout;
use toolsmith::state::{process_runner, AppState};
use toolsmith::{create_tool_on_demand, AutoApprove, Config, GapType};

const PDF_REQUEST: &str = "Can you read and extract text from PDF files?";
const CSV_REQUEST: &str = "Convert CSV to JSON format";

fn test_state(dir: &TempDir) -> AppState {
    let config = Config::for_tools_dir(dir.path().join("skills"));
    let runner =
        process_runner(&config).with_env("TOOLSMITH_BIN", env!("CARGO_BIN_EXE_toolsmith"));
    AppState::with_runner(config, Box::new(runner)).unwrap()
}

#[tokio::test]
async fn test_pdf_request_creates_working_tool() {
    let dir = TempDir::new().unwrap();
    let mut state = test_state(&dir);

    let outcome = create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;

    assert!(outcome.success, "{outcome:#?}");
    assert_eq!(outcome.tool_name.as_deref(), Some("pdf-reader"));

    let validation = outcome.steps.validation.as_ref().unwrap();
    assert!(validation.all_passed, "{validation:#?}");
    assert_eq!(validation.phase("tests").unwrap().details["tests_passed"], true);

    assert!(state.loader.is_loaded("pdf-reader"));
    let output = state
        .loader
        .invoke("pdf-reader", "read_pdf", &json!({"path": "doc.pdf"}))
        .unwrap();
    assert_eq!(output["success"], true);
    assert_eq!(output["data"]["path"], "doc.pdf");
}

#[tokio::test]
async fn test_generated_bundle_layout() {
    let dir = TempDir::new().unwrap();
    let mut state = test_state(&dir);

    create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;

    let tool = dir.path().join("skills").join("pdf-reader");
    for file in [
        layout::SKILL_DOC,
        layout::METADATA,
        layout::IMPLEMENTATION,
        layout::TESTS,
        layout::README,
    ] {
        assert!(tool.join(file).is_file(), "missing {file}");
    }

    let doc = fs::read_to_string(tool.join(layout::SKILL_DOC)).unwrap();
    assert!(doc.starts_with("---\nname: pdf-reader\n"));

    let metadata: Value =
        serde_json::from_str(&fs::read_to_string(tool.join(layout::METADATA)).unwrap()).unwrap();
    assert_eq!(metadata["skill_name"], "pdf-reader");
    assert_eq!(metadata["gap_type"], "domain-gap");
    assert_eq!(metadata["version"], "1.0");
}

#[tokio::test]
async fn test_two_requests_log_two_entries() {
    let dir = TempDir::new().unwrap();
    let mut state = test_state(&dir);

    let first = create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;
    let second = create_tool_on_demand(&mut state, CSV_REQUEST, true, &mut AutoApprove).await;

    assert_eq!(first.tool_id.as_deref(), Some("tool_001"));
    assert_eq!(second.tool_id.as_deref(), Some("tool_002"));
    assert_eq!(second.tool_name.as_deref(), Some("csv-converter"));
    assert_eq!(
        second.steps.gap_detection.as_ref().unwrap()["gap_type"],
        GapType::Domain.as_str()
    );

    let mut loaded = state.loader.list_loaded();
    loaded.sort();
    assert_eq!(loaded, vec!["csv-converter", "pdf-reader"]);

    // A fresh process sees the same log.
    let raw: Value =
        serde_json::from_str(&fs::read_to_string(&state.config.creation_log_path).unwrap())
            .unwrap();
    assert_eq!(raw["total_tools_created"], 2);
    assert_eq!(raw["statistics"]["by_gap_type"]["domain-gap"], 2);
    assert_eq!(raw["statistics"]["validation_pass_rate"], 1.0);
    assert_eq!(raw["statistics"]["hotreload_success_rate"], 1.0);
}

#[tokio::test]
async fn test_broken_tests_script_fails_validation() {
    let dir = TempDir::new().unwrap();
    let mut state = test_state(&dir);

    create_tool_on_demand(&mut state, PDF_REQUEST, true, &mut AutoApprove).await;
    let script = dir.path().join("skills").join("pdf-reader").join(layout::TESTS);
    fs::write(&script, "#!/bin/sh\necho broken\nexit 3\n").unwrap();

    let report = state.validator.validate_tool("pdf-reader").await;

    assert!(!report.all_passed);
    assert_eq!(report.failed_phases(), vec!["tests"]);
    assert_eq!(report.phase("tests").unwrap().details["exit_code"], 3);
}
