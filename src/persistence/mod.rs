//! Persistent audit log of tools created on demand.
//!
//! The log is a single JSON document. Every append recomputes the statistics
//! block from the full entry list and rewrites the whole file. There is no
//! file locking: one writer per log file.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Log document format version.
pub const LOG_VERSION: &str = "1.0";

/// What the orchestrator records about one created tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCreationInfo {
    pub name: String,
    #[serde(default)]
    pub triggered_by: String,
    #[serde(default)]
    pub capability_gap: String,
    #[serde(default = "unknown_gap_type")]
    pub capability_gap_type: String,
    #[serde(default)]
    pub complexity_score: f64,
    #[serde(default)]
    pub validation_passed: bool,
    #[serde(default)]
    pub hotreload_success: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
}

fn unknown_gap_type() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationLogEntry {
    /// Sequential id, `tool_001`, `tool_002`, ...
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub info: ToolCreationInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreationStatistics {
    pub by_gap_type: BTreeMap<String, usize>,
    pub average_complexity: f64,
    pub validation_pass_rate: f64,
    pub hotreload_success_rate: f64,
}

impl CreationStatistics {
    /// Statistics over `entries`. All zero for an empty list.
    pub fn compute(entries: &[CreationLogEntry]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }

        let total = entries.len() as f64;
        let mut by_gap_type = BTreeMap::new();
        for entry in entries {
            *by_gap_type
                .entry(entry.info.capability_gap_type.clone())
                .or_insert(0) += 1;
        }

        let rate = |flag: fn(&ToolCreationInfo) -> bool| {
            entries.iter().filter(|e| flag(&e.info)).count() as f64 / total
        };

        Self {
            by_gap_type,
            average_complexity: entries.iter().map(|e| e.info.complexity_score).sum::<f64>()
                / total,
            validation_pass_rate: rate(|info| info.validation_passed),
            hotreload_success_rate: rate(|info| info.hotreload_success),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationLogDocument {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub total_tools_created: usize,
    pub tools: Vec<CreationLogEntry>,
    pub statistics: CreationStatistics,
}

impl Default for CreationLogDocument {
    fn default() -> Self {
        Self {
            version: LOG_VERSION.to_string(),
            created_at: Utc::now(),
            total_tools_created: 0,
            tools: Vec::new(),
            statistics: CreationStatistics::default(),
        }
    }
}

#[derive(Debug)]
pub struct CreationLog {
    path: PathBuf,
    data: CreationLogDocument,
}

impl CreationLog {
    /// Open the log at `path`. A missing or unreadable file starts a fresh log;
    /// nothing is written until the first append.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load(&path).unwrap_or_default();
        Self { path, data }
    }

    fn load(path: &Path) -> Option<CreationLogDocument> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Creation log does not exist");
            return None;
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(data) => Some(data),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "Invalid creation log, starting fresh");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry, recompute statistics and rewrite the file.
    /// Returns the new entry's id.
    pub fn add_entry(&mut self, info: ToolCreationInfo) -> Result<String> {
        let id = format!("tool_{:03}", self.data.tools.len() + 1);

        self.data.tools.push(CreationLogEntry {
            id: id.clone(),
            created_at: Utc::now(),
            info,
        });
        self.data.total_tools_created = self.data.tools.len();
        self.data.statistics = CreationStatistics::compute(&self.data.tools);

        self.save()?;

        tracing::info!(
            id = %id,
            path = %self.path.display(),
            total = self.data.total_tools_created,
            "Creation log entry added"
        );

        Ok(id)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn get_tools(&self) -> &[CreationLogEntry] {
        &self.data.tools
    }

    pub fn get_stats(&self) -> &CreationStatistics {
        &self.data.statistics
    }

    pub fn document(&self) -> &CreationLogDocument {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info(name: &str, gap_type: &str, complexity: f64, validated: bool, loaded: bool) -> ToolCreationInfo {
        ToolCreationInfo {
            name: name.to_string(),
            triggered_by: format!("request for {name}"),
            capability_gap: "missing".to_string(),
            capability_gap_type: gap_type.to_string(),
            complexity_score: complexity,
            validation_passed: validated,
            hotreload_success: loaded,
            status: "active".to_string(),
            version: "1.0".to_string(),
        }
    }

    #[test]
    fn test_sequential_ids_and_counts() {
        let dir = TempDir::new().unwrap();
        let mut log = CreationLog::open(dir.path().join("log.json"));
        let gap_types = ["domain-gap", "format-gap", "domain-gap", "integration-gap"];

        let ids: Vec<String> = gap_types
            .iter()
            .enumerate()
            .map(|(i, gap)| log.add_entry(info(&format!("t{i}"), gap, 5.0, true, true)).unwrap())
            .collect();

        assert_eq!(ids, vec!["tool_001", "tool_002", "tool_003", "tool_004"]);
        assert_eq!(log.get_tools().len(), 4);
        assert_eq!(log.document().total_tools_created, 4);
        let stats = log.get_stats();
        assert_eq!(stats.by_gap_type.values().sum::<usize>(), 4);
        assert_eq!(stats.by_gap_type["domain-gap"], 2);
    }

    #[test]
    fn test_statistics_rates() {
        let dir = TempDir::new().unwrap();
        let mut log = CreationLog::open(dir.path().join("log.json"));
        log.add_entry(info("a", "domain-gap", 7.0, true, false)).unwrap();
        log.add_entry(info("b", "domain-gap", 5.0, false, true)).unwrap();
        log.add_entry(info("c", "format-gap", 3.0, true, true)).unwrap();
        log.add_entry(info("d", "format-gap", 1.0, true, true)).unwrap();

        let stats = log.get_stats();
        assert!((stats.average_complexity - 4.0).abs() < 1e-9);
        assert!((stats.validation_pass_rate - 0.75).abs() < 1e-9);
        assert!((stats.hotreload_success_rate - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("log.json");

        let mut log = CreationLog::open(&path);
        log.add_entry(info("a", "domain-gap", 7.5, true, true)).unwrap();
        drop(log);

        let mut reopened = CreationLog::open(&path);
        assert_eq!(reopened.get_tools().len(), 1);
        assert_eq!(reopened.get_tools()[0].info.name, "a");
        let id = reopened.add_entry(info("b", "format-gap", 4.0, false, false)).unwrap();
        assert_eq!(id, "tool_002");
    }

    #[test]
    fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        let mut log = CreationLog::open(&path);
        log.add_entry(info("pdf-reader", "domain-gap", 7.5, true, true)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], "1.0");
        assert_eq!(raw["total_tools_created"], 1);
        assert_eq!(raw["tools"][0]["id"], "tool_001");
        assert_eq!(raw["tools"][0]["name"], "pdf-reader");
        assert_eq!(raw["tools"][0]["capability_gap_type"], "domain-gap");
        assert_eq!(raw["statistics"]["by_gap_type"]["domain-gap"], 1);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, "{ truncated").unwrap();

        let log = CreationLog::open(&path);
        assert!(log.get_tools().is_empty());
        assert_eq!(log.get_stats(), &CreationStatistics::default());
    }

    #[test]
    fn test_open_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        let _log = CreationLog::open(&path);

        assert!(!path.exists());
    }
}
