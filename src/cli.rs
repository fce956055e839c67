//! Command-line surface over [`AppState`].
//!
//! Every command prints a human-readable report on stdout and returns whether
//! it succeeded; `main` maps that to the process exit code.

use crate::consensus::{votes_from_json, ConsensusEngine};
use crate::detection::{detect_gap, GapDecision};
use crate::orchestrator::{create_tool_on_demand, AutoApprove, StdinApproval};
use crate::state::AppState;
use crate::watcher::WatchEventKind;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::future::Future;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "toolsmith",
    version,
    about = "Detect capability gaps and generate tools on demand"
)]
pub struct Cli {
    /// Tools directory (overrides TOOLSMITH_TOOLS_DIR)
    #[arg(long, global = true)]
    pub tools_dir: Option<PathBuf>,

    /// Creation log file (overrides TOOLSMITH_CREATION_LOG)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available tools and whether they are loaded
    List,
    /// Load a tool
    Load {
        name: String,
        /// Load a specific version instead of the latest
        #[arg(long)]
        version: Option<String>,
    },
    /// Unload a tool
    Unload { name: String },
    /// Reload a tool
    Reload { name: String },
    /// Show tool information
    Info { name: String },
    /// Detect whether a request needs a new tool
    Detect {
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },
    /// Create a tool for a request
    Create {
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
        /// Skip the approval prompts
        #[arg(short, long)]
        yes: bool,
    },
    /// Validate a tool
    Validate {
        name: String,
        /// Attempts before giving up (defaults to TOOLSMITH_VALIDATION_RETRIES)
        #[arg(long)]
        retries: Option<usize>,
    },
    /// Watch the tools directory and hot-reload changes
    Watch,
    /// Show creation statistics
    Stats,
    /// Load a tool and call one of its functions
    Invoke {
        tool: String,
        function: String,
        /// JSON input (defaults to null)
        input: Option<String>,
    },
    /// Combine agent votes read from a JSON file, or stdin when omitted
    Vote {
        file: Option<PathBuf>,
        /// Factor applied to every confidence
        #[arg(long, default_value_t = 1.0)]
        calibration: f64,
    },
}

/// Run `command` against `state`. `Ok(false)` is a reported failure.
///
/// `shutdown` ends `watch`; other commands ignore it.
pub async fn execute<F>(
    command: Command,
    state: &mut AppState,
    shutdown: F,
) -> anyhow::Result<bool>
where
    F: Future<Output = ()>,
{
    match command {
        Command::List => Ok(list(state)),
        Command::Load { name, version } => Ok(load(state, &name, version.as_deref())),
        Command::Unload { name } => Ok(unload(state, &name)),
        Command::Reload { name } => Ok(reload(state, &name)),
        Command::Info { name } => Ok(info(state, &name)),
        Command::Detect { request } => Ok(detect(state, &request.join(" "))),
        Command::Create { request, yes } => Ok(create(state, &request.join(" "), yes).await),
        Command::Validate { name, retries } => Ok(validate(state, &name, retries).await),
        Command::Watch => {
            watch(state, shutdown).await;
            Ok(true)
        }
        Command::Stats => Ok(stats(state)),
        Command::Invoke {
            tool,
            function,
            input,
        } => invoke(state, &tool, &function, input.as_deref()),
        Command::Vote { file, calibration } => vote(file, calibration),
    }
}

fn list(state: &AppState) -> bool {
    let available = state.loader.list_available();
    let loaded = state.loader.list_loaded();

    println!("Available tools:");
    if available.is_empty() {
        println!("  (none)");
    }
    for tool in &available {
        let status = if loaded.contains(tool) {
            "loaded"
        } else {
            "not loaded"
        };
        println!("  - {tool} ({status})");
    }

    println!(
        "\nSummary: {} available, {} loaded",
        available.len(),
        loaded.len()
    );
    true
}

fn load(state: &mut AppState, name: &str, version: Option<&str>) -> bool {
    println!("Loading tool: {name}");
    if !state.loader.load(name, version) {
        println!("Failed to load tool");
        if let Some(error) = state.loader.tool_info(name).and_then(|i| i.error) {
            println!("  Error: {error}");
        }
        return false;
    }

    println!("Tool loaded");
    if let Some(info) = state.loader.tool_info(name) {
        println!("  Version: {}", info.version);
        println!("  Functions: {}", info.functions.join(", "));
    }
    true
}

fn unload(state: &mut AppState, name: &str) -> bool {
    println!("Unloading tool: {name}");
    let ok = state.loader.unload(name);
    if ok {
        println!("Tool unloaded");
    } else {
        println!("Failed to unload tool (not loaded in this process)");
    }
    ok
}

fn reload(state: &mut AppState, name: &str) -> bool {
    println!("Reloading tool: {name}");
    let ok = state.loader.reload(name);
    println!("{}", if ok { "Tool reloaded" } else { "Failed to reload tool" });
    ok
}

fn info(state: &mut AppState, name: &str) -> bool {
    if !state.loader.is_loaded(name) {
        state.loader.load(name, None);
    }

    let Some(info) = state.loader.tool_info(name) else {
        println!("Tool not found: {name}");
        return false;
    };

    println!("Tool: {}", info.name);
    println!("  Version: {}", info.version);
    println!("  Status: {}", info.status);
    if let Some(loaded_at) = info.loaded_at {
        println!("  Loaded at: {}", loaded_at.to_rfc3339());
    }
    println!("  Path: {}", info.path.display());
    println!("  Has implementation: {}", info.has_implementation);
    if !info.functions.is_empty() {
        println!("  Functions: {}", info.functions.join(", "));
    }
    if let Some(error) = &info.error {
        println!("  Error: {error}");
    }
    info.error.is_none()
}

fn detect(state: &AppState, request: &str) -> bool {
    let available = state.loader.list_available();
    println!("Analyzing request: \"{request}\"");
    println!("  Available tools: {}", available.len());

    match detect_gap(request, &available) {
        GapDecision::Gap(gap) => {
            println!("\nCapability gap detected");
            println!("  Type: {}", gap.gap_type);
            println!("  Description: {}", gap.description);
            println!("  Suggested tool: {}", gap.suggested_tool_name);
            println!("  Complexity: {}/10", gap.complexity_score);
            println!("  Confidence: {:.1}%", gap.confidence * 100.0);
            println!("\nSuggested functions:");
            for function in gap.requirements.core_functions.iter().take(5) {
                println!("  - {function}");
            }
        }
        GapDecision::NoGap { best_match, reason } => {
            println!("\nNo gap detected");
            println!("  Best match: {} ({:.2})", best_match.tool_name, best_match.score);
            println!("  Reason: {reason}");
        }
    }
    true
}

async fn create(state: &mut AppState, request: &str, yes: bool) -> bool {
    println!("Creating tool for request: \"{request}\"");

    let outcome = if yes {
        create_tool_on_demand(state, request, true, &mut AutoApprove).await
    } else {
        create_tool_on_demand(state, request, false, &mut StdinApproval).await
    };

    if outcome.success {
        println!("\nTool created");
        if let Some(id) = &outcome.tool_id {
            println!("  Tool ID: {id}");
        }
        if let Some(name) = &outcome.tool_name {
            println!("  Tool name: {name}");
        }
        if let Some(message) = &outcome.message {
            println!("  {message}");
        }
    } else {
        println!("\nTool creation failed");
        println!(
            "  Reason: {}",
            outcome.message.as_deref().unwrap_or("Unknown error")
        );
    }
    outcome.success
}

async fn validate(state: &AppState, name: &str, retries: Option<usize>) -> bool {
    println!("Validating tool: {name}");
    let retries = retries.unwrap_or(state.config.validation_retries);
    let report = state.validator.validate_with_retry(name, retries).await;

    println!(
        "\nOverall: {}",
        if report.all_passed { "PASSED" } else { "FAILED" }
    );
    if let Some(error) = &report.error {
        println!("  Error: {error}");
    }
    if report.all_retries_failed {
        println!("  All {} attempts failed", report.attempts.unwrap_or(retries));
    }
    for result in &report.validations {
        let mark = if result.passed { "ok" } else { "FAILED" };
        println!("  [{mark}] {}", result.check_name);
        if !result.passed {
            print_failed_details(&result.details);
        }
    }
    report.all_passed
}

fn print_failed_details(details: &Value) {
    match details {
        Value::Object(map) => {
            for (key, value) in map.iter().filter(|(_, v)| **v != Value::Bool(true)) {
                println!("      - {key}: {value}");
            }
        }
        Value::Null => {}
        other => println!("      - {other}"),
    }
}

async fn watch<F>(state: &mut AppState, shutdown: F)
where
    F: Future<Output = ()>,
{
    println!("Watching {} for changes (Ctrl+C to stop)", state.config.tools_dir.display());

    state.watcher.on(WatchEventKind::ToolAdded, |tool, _| {
        println!("  Tool added: {tool}");
        Ok(())
    });
    state.watcher.on(WatchEventKind::ToolUpdated, |tool, details| {
        let file = details["file"].as_str().unwrap_or("unknown");
        println!("  Tool updated: {tool} ({file})");
        Ok(())
    });
    state.watcher.on(WatchEventKind::ToolRemoved, |tool, _| {
        println!("  Tool removed: {tool}");
        Ok(())
    });

    tokio::select! {
        _ = state.watch(None) => {}
        _ = shutdown => {}
    }
    println!("\nWatcher stopped");
}

fn stats(state: &AppState) -> bool {
    let snapshot = state.snapshot();
    let statistics = &snapshot.statistics;

    println!("Toolsmith statistics");
    println!("\nSystem state:");
    println!("  Tools dir: {}", snapshot.tools_dir);
    println!("  Available tools: {}", snapshot.available_tools.len());
    println!("  Loaded tools: {}", snapshot.loaded_tools.len());
    println!("  Watched tools: {}", snapshot.watched_tools.len());

    println!("\nCreation statistics:");
    println!("  Average complexity: {:.1}/10", statistics.average_complexity);
    println!(
        "  Validation pass rate: {:.1}%",
        statistics.validation_pass_rate * 100.0
    );
    println!(
        "  Hot-reload success rate: {:.1}%",
        statistics.hotreload_success_rate * 100.0
    );

    if !statistics.by_gap_type.is_empty() {
        println!("\nGap types:");
        for (gap_type, count) in &statistics.by_gap_type {
            println!("  - {gap_type}: {count}");
        }
    }

    let tools = state.creation_log.get_tools();
    if !tools.is_empty() {
        println!("\nRecent tools (last 5):");
        for entry in tools.iter().rev().take(5).rev() {
            println!("  - {} (v{})", entry.info.name, entry.info.version);
            println!("    Created: {}", entry.created_at.format("%Y-%m-%dT%H:%M:%S"));
        }
    }
    true
}

fn invoke(
    state: &mut AppState,
    tool: &str,
    function: &str,
    input: Option<&str>,
) -> anyhow::Result<bool> {
    let input: Value = match input {
        Some(raw) => serde_json::from_str(raw).context("Input is not valid JSON")?,
        None => Value::Null,
    };

    if !state.loader.is_loaded(tool) && !state.loader.load(tool, None) {
        println!("Failed to load tool: {tool}");
        return Ok(false);
    }

    match state.loader.invoke(tool, function, &input) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(true)
        }
        Err(error) => {
            println!("Error: {error}");
            Ok(false)
        }
    }
}

fn vote(file: Option<PathBuf>, calibration: f64) -> anyhow::Result<bool> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };

    let votes = votes_from_json(&raw)?;
    match ConsensusEngine::new(calibration).collect_votes(&votes) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(true)
        }
        Err(error) => {
            println!("Error: {error}");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> AppState {
        AppState::new(Config::for_tools_dir(dir.path().join("skills"))).unwrap()
    }

    #[test]
    fn test_parse_create_joins_request_words() {
        let cli = Cli::try_parse_from([
            "toolsmith",
            "--tools-dir",
            "/tmp/skills",
            "create",
            "Read",
            "PDF",
            "files",
            "--yes",
        ])
        .unwrap();

        assert_eq!(cli.tools_dir, Some(PathBuf::from("/tmp/skills")));
        match cli.command {
            Command::Create { request, yes } => {
                assert_eq!(request.join(" "), "Read PDF files");
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_detect_requires_request() {
        assert!(Cli::try_parse_from(["toolsmith", "detect"]).is_err());
    }

    #[tokio::test]
    async fn test_unload_never_loaded_fails() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir);

        let ok = execute(
            Command::Unload {
                name: "missing".to_string(),
            },
            &mut state,
            std::future::pending(),
        )
        .await
        .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_invoke_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir);

        let result = execute(
            Command::Invoke {
                tool: "anything".to_string(),
                function: "f".to_string(),
                input: Some("{not json".to_string()),
            },
            &mut state,
            std::future::pending(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_watch_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir);

        let ok = execute(Command::Watch, &mut state, async {}).await.unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_vote_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("votes.json");
        fs::write(
            &path,
            r#"[{"agent_id": "a", "decision": "YES", "confidence": 0.9}]"#,
        )
        .unwrap();
        let mut state = state(&dir);

        let ok = execute(
            Command::Vote {
                file: Some(path),
                calibration: 1.0,
            },
            &mut state,
            std::future::pending(),
        )
        .await
        .unwrap();
        assert!(ok);
    }
}
