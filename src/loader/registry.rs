//! Runtime registry of tools discovered under the tools directory.
//!
//! # State machine
//! Each tool name moves `unloaded -> loaded -> unloaded`, or
//! `unloaded -> error` when its implementation manifest cannot be imported.
//! `error` persists until the next load attempt. Loading a name that is
//! already loaded swaps in the new version only after it imports; a failed
//! load leaves the loaded version in place.

use crate::error::{AppError, Result};
use crate::layout;
use crate::loader::plugin::{HandlerRegistry, LoadedPlugin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// One on-disk tool directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub has_skill_md: bool,
    pub has_metadata: bool,
    pub has_implementation: bool,
    pub has_tests: bool,
    pub metadata: Value,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Unloaded,
    Loaded,
    Error,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolStatus::Unloaded => "unloaded",
            ToolStatus::Loaded => "loaded",
            ToolStatus::Error => "error",
        })
    }
}

/// A registry entry: a specific version of a tool and its load state.
#[derive(Debug, Clone)]
pub struct ToolVersion {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub metadata: Value,
    pub status: ToolStatus,
    pub loaded_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub plugin: Option<LoadedPlugin>,
}

impl ToolVersion {
    fn from_record(name: &str, record: &ToolRecord) -> Self {
        Self {
            name: name.to_string(),
            version: record.version.clone(),
            path: record.path.clone(),
            metadata: record.metadata.clone(),
            status: ToolStatus::Unloaded,
            loaded_at: None,
            error: None,
            plugin: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadEventKind {
    LoadSuccess,
    LoadFailed,
    UnloadSuccess,
    FallbackSuccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadEvent {
    pub timestamp: DateTime<Utc>,
    pub event: LoadEventKind,
    pub tool: String,
    pub details: Value,
}

/// Read-only view of a registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
    pub status: ToolStatus,
    pub loaded_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
    pub has_implementation: bool,
    pub functions: Vec<String>,
    pub metadata: Value,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedSummary {
    pub version: String,
    pub status: ToolStatus,
    pub loaded_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoaderState {
    pub tools_dir: PathBuf,
    pub loaded_tools: BTreeMap<String, LoadedSummary>,
    pub available_tools: BTreeMap<String, Vec<ToolRecord>>,
    pub load_log_count: usize,
}

#[derive(Debug)]
pub struct ToolLoader {
    tools_dir: PathBuf,
    handlers: HandlerRegistry,
    entries: BTreeMap<String, ToolVersion>,
    load_log: Vec<LoadEvent>,
}

impl ToolLoader {
    pub fn new(tools_dir: impl Into<PathBuf>) -> Self {
        Self::with_handlers(tools_dir, HandlerRegistry::with_builtins())
    }

    pub fn with_handlers(tools_dir: impl Into<PathBuf>, handlers: HandlerRegistry) -> Self {
        Self {
            tools_dir: tools_dir.into(),
            handlers,
            entries: BTreeMap::new(),
            load_log: Vec::new(),
        }
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    /// Scan the tools directory. A directory is a tool iff it contains
    /// `SKILL.md`. Records are grouped by `metadata.skill_name`, falling back
    /// to the directory name. Never cached.
    pub fn discover(&self) -> BTreeMap<String, Vec<ToolRecord>> {
        let mut discovered: BTreeMap<String, Vec<ToolRecord>> = BTreeMap::new();

        let entries = match std::fs::read_dir(&self.tools_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(tools_dir = %self.tools_dir.display(), error = %e, "Tools directory not readable");
                return discovered;
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            if !dir.join(layout::SKILL_DOC).is_file() {
                continue;
            }
            let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let metadata_path = dir.join(layout::METADATA);
            let has_metadata = metadata_path.is_file();
            let metadata = if has_metadata {
                read_metadata(&metadata_path)
            } else {
                json!({})
            };

            let name = metadata
                .get("skill_name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .unwrap_or(dir_name)
                .to_string();
            let version = metadata
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_VERSION)
                .to_string();

            let record = ToolRecord {
                name: name.clone(),
                version,
                has_skill_md: true,
                has_metadata,
                has_implementation: dir.join(layout::IMPLEMENTATION).is_file(),
                has_tests: dir.join(layout::TESTS).is_file(),
                metadata,
                discovered_at: Utc::now(),
                path: dir,
            };
            discovered.entry(name).or_default().push(record);
        }

        discovered
    }

    /// Load `tool_name` at `version`, or the lexically greatest version when
    /// `None`. Returns whether the requested version was loaded; on failure
    /// a previously loaded version keeps serving.
    pub fn load(&mut self, tool_name: &str, version: Option<&str>) -> bool {
        if let Err(e) = layout::check_tool_name(tool_name) {
            self.record_failure(
                tool_name,
                json!({ "reason": "invalid_name", "error": e.to_string() }),
            );
            return false;
        }

        let discovered = self.discover();
        let Some(records) = discovered.get(tool_name) else {
            self.record_failure(tool_name, json!({ "reason": "tool_not_found" }));
            return false;
        };

        let record = match version {
            Some(wanted) => match records.iter().find(|r| r.version == wanted) {
                Some(record) => record,
                None => {
                    self.record_failure(
                        tool_name,
                        json!({ "reason": "version_not_found", "version": wanted }),
                    );
                    return false;
                }
            },
            None => match newest_first(records).first() {
                Some(record) => *record,
                None => {
                    self.record_failure(tool_name, json!({ "reason": "tool_not_found" }));
                    return false;
                }
            },
        };

        let mut entry = ToolVersion::from_record(tool_name, record);
        let manifest = record.path.join(layout::IMPLEMENTATION);
        let has_implementation = manifest.is_file();

        if has_implementation {
            match self.handlers.load_manifest(&manifest) {
                Ok(plugin) => entry.plugin = Some(plugin),
                Err(e) => {
                    warn!(tool = tool_name, version = %entry.version, error = %e, "Tool import failed");
                    if !self.is_loaded(tool_name) {
                        entry.status = ToolStatus::Error;
                        entry.error = Some(e.to_string());
                        self.entries.insert(tool_name.to_string(), entry);
                    }
                    self.record_failure(
                        tool_name,
                        json!({ "reason": e.kind(), "error": e.to_string() }),
                    );
                    return false;
                }
            }
        }

        if self.is_loaded(tool_name) {
            self.unload(tool_name);
        }

        entry.status = ToolStatus::Loaded;
        entry.loaded_at = Some(Utc::now());
        let loaded_version = entry.version.clone();
        self.entries.insert(tool_name.to_string(), entry);

        info!(tool = tool_name, version = %loaded_version, has_implementation, "Tool loaded");
        metrics::counter!("tool_loads_total", "outcome" => "success").increment(1);
        self.log_event(
            LoadEventKind::LoadSuccess,
            tool_name,
            json!({ "version": loaded_version, "has_implementation": has_implementation }),
        );

        true
    }

    /// Drop a loaded tool. Returns `false` if it is not currently loaded.
    pub fn unload(&mut self, tool_name: &str) -> bool {
        if !self.is_loaded(tool_name) {
            return false;
        }
        let Some(entry) = self.entries.remove(tool_name) else {
            return false;
        };

        info!(tool = tool_name, version = %entry.version, "Tool unloaded");
        self.log_event(
            LoadEventKind::UnloadSuccess,
            tool_name,
            json!({ "version": entry.version }),
        );
        true
    }

    /// Load again from disk, keeping the currently loaded version. If the
    /// new contents fail to import, the previous load stays active.
    pub fn reload(&mut self, tool_name: &str) -> bool {
        let version = self
            .entries
            .get(tool_name)
            .filter(|e| e.status == ToolStatus::Loaded)
            .map(|e| e.version.clone());

        self.load(tool_name, version.as_deref())
    }

    /// Try `preferred` first, then every other known version newest first.
    pub fn load_with_fallback(&mut self, tool_name: &str, preferred: Option<&str>) -> bool {
        let mut versions = self.versions(tool_name);
        if versions.is_empty() {
            return false;
        }
        versions.sort_by(|a, b| b.cmp(a));

        if let Some(preferred) = preferred.filter(|p| versions.iter().any(|v| v.as_str() == *p)) {
            if self.load(tool_name, Some(preferred)) {
                return true;
            }
            versions.retain(|v| v != preferred);
        }

        for version in versions {
            if self.load(tool_name, Some(version.as_str())) {
                self.log_event(
                    LoadEventKind::FallbackSuccess,
                    tool_name,
                    json!({ "preferred_version": preferred, "loaded_version": version }),
                );
                return true;
            }
        }

        false
    }

    /// Tool name served by the directory `dir_name`. Registry entries are
    /// checked first so a directory that was just removed still resolves.
    pub fn name_for_dir(&self, dir_name: &str) -> Option<String> {
        let backed_by = |path: &Path| path.file_name().is_some_and(|n| n == dir_name);

        if let Some(entry) = self.entries.values().find(|e| backed_by(&e.path)) {
            return Some(entry.name.clone());
        }
        self.discover()
            .into_values()
            .flatten()
            .find(|record| backed_by(&record.path))
            .map(|record| record.name)
    }

    pub fn is_loaded(&self, tool_name: &str) -> bool {
        self.entries
            .get(tool_name)
            .is_some_and(|e| e.status == ToolStatus::Loaded)
    }

    /// Registry entry for `tool_name`, loaded or errored.
    pub fn tool_info(&self, tool_name: &str) -> Option<ToolInfo> {
        self.entries.get(tool_name).map(|entry| ToolInfo {
            name: entry.name.clone(),
            version: entry.version.clone(),
            status: entry.status,
            loaded_at: entry.loaded_at,
            path: entry.path.clone(),
            has_implementation: entry.plugin.is_some(),
            functions: entry
                .plugin
                .as_ref()
                .map(|p| p.functions().map(str::to_string).collect())
                .unwrap_or_default(),
            metadata: entry.metadata.clone(),
            error: entry.error.clone(),
        })
    }

    pub fn list_loaded(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.status == ToolStatus::Loaded)
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn list_available(&self) -> Vec<String> {
        self.discover().into_keys().collect()
    }

    /// Versions on disk for `tool_name`, in discovery order.
    pub fn versions(&self, tool_name: &str) -> Vec<String> {
        self.discover()
            .remove(tool_name)
            .map(|records| records.into_iter().map(|r| r.version).collect())
            .unwrap_or_default()
    }

    /// Call a function of a loaded tool.
    pub fn invoke(&self, tool_name: &str, function: &str, input: &Value) -> Result<Value> {
        let entry = self
            .entries
            .get(tool_name)
            .filter(|e| e.status == ToolStatus::Loaded)
            .ok_or_else(|| AppError::NotFound(format!("Tool not loaded: {tool_name}")))?;

        let plugin = entry.plugin.as_ref().ok_or_else(|| {
            AppError::NotFound(format!("Tool has no implementation: {tool_name}"))
        })?;

        plugin.invoke(function, input)
    }

    /// The most recent `limit` events, oldest first.
    pub fn load_log(&self, limit: usize) -> &[LoadEvent] {
        let start = self.load_log.len().saturating_sub(limit);
        &self.load_log[start..]
    }

    pub fn export_state(&self) -> LoaderState {
        LoaderState {
            tools_dir: self.tools_dir.clone(),
            loaded_tools: self
                .entries
                .iter()
                .map(|(name, e)| {
                    (
                        name.clone(),
                        LoadedSummary {
                            version: e.version.clone(),
                            status: e.status,
                            loaded_at: e.loaded_at,
                            error: e.error.clone(),
                        },
                    )
                })
                .collect(),
            available_tools: self.discover(),
            load_log_count: self.load_log.len(),
        }
    }

    fn record_failure(&mut self, tool_name: &str, details: Value) {
        debug!(tool = tool_name, %details, "Tool load failed");
        metrics::counter!("tool_loads_total", "outcome" => "failure").increment(1);
        self.log_event(LoadEventKind::LoadFailed, tool_name, details);
    }

    fn log_event(&mut self, event: LoadEventKind, tool_name: &str, details: Value) {
        self.load_log.push(LoadEvent {
            timestamp: Utc::now(),
            event,
            tool: tool_name.to_string(),
            details,
        });
    }
}

/// Records sorted by version string, greatest first. Lexical, so "10.0"
/// sorts below "2.0".
fn newest_first(records: &[ToolRecord]) -> Vec<&ToolRecord> {
    let mut sorted: Vec<&ToolRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.version.cmp(&a.version));
    sorted
}

fn read_metadata(path: &Path) -> Value {
    match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string()))
    {
        Ok(metadata) => metadata,
        Err(error) => json!({ "error": error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_tool(root: &Path, dir: &str, metadata: Option<Value>, manifest: Option<&str>) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(layout::SKILL_DOC), "---\nname: x\n---\n").unwrap();
        if let Some(metadata) = metadata {
            fs::write(path.join(layout::METADATA), metadata.to_string()).unwrap();
        }
        if let Some(manifest) = manifest {
            fs::write(path.join(layout::IMPLEMENTATION), manifest).unwrap();
        }
    }

    #[test]
    fn test_discover_skips_dirs_without_doc() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, None);
        fs::create_dir_all(dir.path().join("not-a-tool")).unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();

        let discovered = ToolLoader::new(dir.path()).discover();

        assert_eq!(discovered.keys().collect::<Vec<_>>(), vec!["alpha"]);
        assert_eq!(discovered["alpha"][0].version, "1.0");
        assert!(!discovered["alpha"][0].has_metadata);
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        let loader = ToolLoader::new("/nonexistent/toolsmith/tools");
        assert!(loader.discover().is_empty());
        assert!(loader.list_available().is_empty());
    }

    #[test]
    fn test_discover_groups_versions_by_skill_name() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "reader-v1",
            Some(json!({"skill_name": "reader", "version": "1.0"})),
            None,
        );
        write_tool(
            dir.path(),
            "reader-v2",
            Some(json!({"skill_name": "reader", "version": "2.0"})),
            None,
        );

        let loader = ToolLoader::new(dir.path());
        assert_eq!(loader.list_available(), vec!["reader"]);
        assert_eq!(loader.versions("reader"), vec!["1.0", "2.0"]);
    }

    #[test]
    fn test_bad_metadata_is_recorded_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "broken", None, None);
        fs::write(dir.path().join("broken").join(layout::METADATA), "{oops").unwrap();

        let discovered = ToolLoader::new(dir.path()).discover();
        assert!(discovered["broken"][0].metadata.get("error").is_some());
    }

    #[test]
    fn test_documentation_only_tool_loads() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "docs-only", None, None);
        let mut loader = ToolLoader::new(dir.path());

        assert!(loader.load("docs-only", None));
        let info = loader.tool_info("docs-only").unwrap();
        assert_eq!(info.status, ToolStatus::Loaded);
        assert!(!info.has_implementation);
        assert!(info.loaded_at.is_some());
    }

    #[test]
    fn test_load_missing_tool_logs_failure() {
        let dir = TempDir::new().unwrap();
        let mut loader = ToolLoader::new(dir.path());

        assert!(!loader.load("ghost", None));
        let log = loader.load_log(DEFAULT_LOG_LIMIT);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event, LoadEventKind::LoadFailed);
        assert_eq!(log[0].details["reason"], "tool_not_found");
        assert!(loader.tool_info("ghost").is_none());
    }

    #[test]
    fn test_load_missing_version() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, None);
        let mut loader = ToolLoader::new(dir.path());

        assert!(!loader.load("alpha", Some("9.9")));
        assert_eq!(loader.load_log(1)[0].details["reason"], "version_not_found");
    }

    #[test]
    fn test_failed_version_load_keeps_loaded_tool() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, Some(r#"{"functions": {"run": "echo"}}"#));
        let mut loader = ToolLoader::new(dir.path());
        assert!(loader.load("alpha", None));

        assert!(!loader.load("alpha", Some("9.9")));

        assert!(loader.is_loaded("alpha"));
        let info = loader.tool_info("alpha").unwrap();
        assert_eq!(info.version, "1.0");
        assert!(info.error.is_none());
        assert!(loader.invoke("alpha", "run", &json!({"x": 1})).is_ok());

        let kinds: Vec<LoadEventKind> = loader.load_log(10).iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![LoadEventKind::LoadSuccess, LoadEventKind::LoadFailed]);
    }

    #[test]
    fn test_broken_reload_keeps_previous_import() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, Some(r#"{"functions": {"run": "echo"}}"#));
        let mut loader = ToolLoader::new(dir.path());
        assert!(loader.load("alpha", None));

        fs::write(dir.path().join("alpha").join(layout::IMPLEMENTATION), "{ broken").unwrap();
        assert!(!loader.reload("alpha"));

        assert!(loader.is_loaded("alpha"));
        assert_eq!(loader.tool_info("alpha").unwrap().status, ToolStatus::Loaded);
        assert!(loader.invoke("alpha", "run", &json!({"x": 1})).is_ok());
        assert_eq!(loader.load_log(1)[0].event, LoadEventKind::LoadFailed);
    }

    #[test]
    fn test_load_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, None);
        let mut loader = ToolLoader::new(dir.path().join("alpha"));

        for bad in ["..", "../alpha", ".", ""] {
            assert!(!loader.load(bad, None), "{bad:?} loaded");
            assert_eq!(loader.load_log(1)[0].details["reason"], "invalid_name");
        }
        assert!(loader.list_loaded().is_empty());
    }

    #[test]
    fn test_name_for_dir_follows_skill_name() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "reader-v1",
            Some(json!({"skill_name": "reader", "version": "1.0"})),
            None,
        );
        write_tool(dir.path(), "alpha", None, None);
        let mut loader = ToolLoader::new(dir.path());

        assert_eq!(loader.name_for_dir("reader-v1").as_deref(), Some("reader"));
        assert_eq!(loader.name_for_dir("alpha").as_deref(), Some("alpha"));
        assert_eq!(loader.name_for_dir("ghost"), None);

        assert!(loader.load("reader", None));
        fs::remove_dir_all(dir.path().join("reader-v1")).unwrap();
        assert_eq!(loader.name_for_dir("reader-v1").as_deref(), Some("reader"));
    }

    #[test]
    fn test_import_failure_sets_error_status() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "bad",
            None,
            Some(r#"{"functions": {"run": "no_such_handler"}}"#),
        );
        let mut loader = ToolLoader::new(dir.path());

        assert!(!loader.load("bad", None));
        assert!(!loader.is_loaded("bad"));
        let info = loader.tool_info("bad").unwrap();
        assert_eq!(info.status, ToolStatus::Error);
        assert!(info.error.unwrap().contains("no_such_handler"));
        assert_eq!(loader.load_log(1)[0].details["reason"], "import_error");
        assert!(!loader.unload("bad"));
    }

    #[test]
    fn test_unload_never_loaded_fails() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, None);
        let mut loader = ToolLoader::new(dir.path());

        assert!(!loader.unload("alpha"));
        assert!(loader.load_log(DEFAULT_LOG_LIMIT).is_empty());
    }

    #[test]
    fn test_load_unload_load_ends_loaded() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, None);
        let mut loader = ToolLoader::new(dir.path());

        assert!(loader.load("alpha", None));
        assert!(loader.unload("alpha"));
        assert!(!loader.is_loaded("alpha"));
        assert!(loader.load("alpha", None));

        assert!(loader.is_loaded("alpha"));
        assert_eq!(loader.list_loaded(), vec!["alpha"]);
        let kinds: Vec<LoadEventKind> = loader.load_log(10).iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![
                LoadEventKind::LoadSuccess,
                LoadEventKind::UnloadSuccess,
                LoadEventKind::LoadSuccess
            ]
        );
    }

    #[test]
    fn test_loading_twice_unloads_first() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, None);
        let mut loader = ToolLoader::new(dir.path());

        loader.load("alpha", None);
        loader.load("alpha", None);

        assert_eq!(loader.list_loaded().len(), 1);
        assert_eq!(loader.load_log(10)[1].event, LoadEventKind::UnloadSuccess);
    }

    #[test]
    fn test_latest_version_is_lexical() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "v2",
            Some(json!({"skill_name": "reader", "version": "2.0"})),
            None,
        );
        write_tool(
            dir.path(),
            "v10",
            Some(json!({"skill_name": "reader", "version": "10.0"})),
            None,
        );
        let mut loader = ToolLoader::new(dir.path());

        assert!(loader.load("reader", None));
        assert_eq!(loader.tool_info("reader").unwrap().version, "2.0");
    }

    #[test]
    fn test_reload_keeps_version() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "v1",
            Some(json!({"skill_name": "reader", "version": "1.0"})),
            None,
        );
        write_tool(
            dir.path(),
            "v2",
            Some(json!({"skill_name": "reader", "version": "2.0"})),
            None,
        );
        let mut loader = ToolLoader::new(dir.path());

        loader.load("reader", Some("1.0"));
        assert!(loader.reload("reader"));
        assert_eq!(loader.tool_info("reader").unwrap().version, "1.0");
    }

    #[test]
    fn test_fallback_skips_broken_preferred() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "v1",
            Some(json!({"skill_name": "reader", "version": "1.0"})),
            None,
        );
        write_tool(
            dir.path(),
            "v2",
            Some(json!({"skill_name": "reader", "version": "2.0"})),
            Some("not json"),
        );
        let mut loader = ToolLoader::new(dir.path());

        assert!(loader.load_with_fallback("reader", Some("2.0")));
        assert_eq!(loader.tool_info("reader").unwrap().version, "1.0");

        let last = loader.load_log(1)[0].clone();
        assert_eq!(last.event, LoadEventKind::FallbackSuccess);
        assert_eq!(last.details["preferred_version"], "2.0");
        assert_eq!(last.details["loaded_version"], "1.0");
    }

    #[test]
    fn test_fallback_all_fail() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "bad", None, Some("not json"));
        let mut loader = ToolLoader::new(dir.path());

        assert!(!loader.load_with_fallback("bad", None));
        assert!(!loader.load_with_fallback("ghost", None));
    }

    #[test]
    fn test_invoke_loaded_tool() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "pdf-reader",
            None,
            Some(r#"{"functions": {"read_pdf": "echo"}}"#),
        );
        let mut loader = ToolLoader::new(dir.path());

        assert!(matches!(
            loader.invoke("pdf-reader", "read_pdf", &json!({})),
            Err(AppError::NotFound(_))
        ));

        loader.load("pdf-reader", None);
        let out = loader
            .invoke("pdf-reader", "read_pdf", &json!({"test": "data"}))
            .unwrap();
        assert_eq!(out["data"]["test"], "data");
        assert_eq!(
            loader.tool_info("pdf-reader").unwrap().functions,
            vec!["read_pdf"]
        );
    }

    #[test]
    fn test_load_log_limit() {
        let dir = TempDir::new().unwrap();
        let mut loader = ToolLoader::new(dir.path());
        for _ in 0..5 {
            loader.load("ghost", None);
        }

        assert_eq!(loader.load_log(3).len(), 3);
        assert_eq!(loader.load_log(DEFAULT_LOG_LIMIT).len(), 5);
    }

    #[test]
    fn test_export_state() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "alpha", None, None);
        write_tool(dir.path(), "beta", None, None);
        let mut loader = ToolLoader::new(dir.path());
        loader.load("alpha", None);

        let state = loader.export_state();
        assert_eq!(state.loaded_tools.len(), 1);
        assert_eq!(state.loaded_tools["alpha"].status, ToolStatus::Loaded);
        assert_eq!(state.available_tools.len(), 2);
        assert_eq!(state.load_log_count, 1);
    }
}
