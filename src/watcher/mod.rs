//! Polling change detection over the tools directory.
//!
//! Each [`ToolWatcher::check`] first diffs the set of top-level directories
//! (firing `ToolAdded` / `ToolRemoved`), then rehashes every watched file
//! and fires `ToolUpdated` for those whose content changed.

use crate::layout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info};

/// Tracks one file by modification stamp (mtime and length) and SHA-256
/// content hash. The hash is only recomputed when the stamp moves.
#[derive(Debug, Clone)]
pub struct FileWatcher {
    path: PathBuf,
    last_modified: Option<(SystemTime, u64)>,
    last_hash: Option<String>,
}

impl FileWatcher {
    /// Snapshot the file's current state. A missing file is tracked too and
    /// reports a change once it appears.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        let last_hash = last_modified.and_then(|_| hash_file(&path));
        Self {
            path,
            last_modified,
            last_hash,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the content differs from the last observed state. Updates the
    /// snapshot, so a single change is reported once.
    pub fn has_changed(&mut self) -> bool {
        let Some(current_modified) = modified(&self.path) else {
            let existed = self.last_hash.is_some();
            self.last_modified = None;
            self.last_hash = None;
            return existed;
        };

        if Some(current_modified) == self.last_modified {
            return false;
        }
        self.last_modified = Some(current_modified);

        let current_hash = hash_file(&self.path);
        if current_hash == self.last_hash {
            return false;
        }
        self.last_hash = current_hash;
        true
    }
}

fn modified(path: &Path) -> Option<(SystemTime, u64)> {
    let metadata = std::fs::metadata(path).ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

fn hash_file(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    Some(format!("{:x}", Sha256::digest(&bytes)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    ToolAdded,
    ToolUpdated,
    ToolRemoved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub event: WatchEventKind,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Subscriber for watch events. Receives the tool name and event details.
pub type WatchCallback = Box<dyn FnMut(&str, &Value) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Serialize)]
pub struct WatcherState {
    pub tools_dir: PathBuf,
    pub watched_tools: Vec<String>,
    pub total_watchers: usize,
    pub last_scan: Option<DateTime<Utc>>,
}

pub struct ToolWatcher {
    tools_dir: PathBuf,
    watchers: BTreeMap<String, BTreeMap<&'static str, FileWatcher>>,
    callbacks: BTreeMap<WatchEventKind, Vec<WatchCallback>>,
    last_scan: Option<DateTime<Utc>>,
}

impl ToolWatcher {
    /// Create a watcher and record the tools already present. Existing tools
    /// do not produce `ToolAdded` events.
    pub fn new(tools_dir: impl Into<PathBuf>) -> Self {
        let mut watcher = Self {
            tools_dir: tools_dir.into(),
            watchers: BTreeMap::new(),
            callbacks: BTreeMap::new(),
            last_scan: None,
        };
        watcher.scan_tools(false);
        watcher
    }

    pub fn on<F>(&mut self, event: WatchEventKind, callback: F)
    where
        F: FnMut(&str, &Value) -> anyhow::Result<()> + 'static,
    {
        self.callbacks
            .entry(event)
            .or_default()
            .push(Box::new(callback));
    }

    /// Run one detection pass and return every change found, in the order
    /// callbacks were fired.
    pub fn check(&mut self) -> Vec<ChangeEvent> {
        let mut changes = self.scan_tools(true);

        let mut updates = Vec::new();
        for (tool, files) in &mut self.watchers {
            for (file, watcher) in files.iter_mut() {
                if watcher.has_changed() {
                    updates.push(ChangeEvent {
                        timestamp: Utc::now(),
                        event: WatchEventKind::ToolUpdated,
                        tool: tool.clone(),
                        file: Some(file.to_string()),
                        path: Some(watcher.path().to_path_buf()),
                    });
                }
            }
        }

        for update in &updates {
            let details = json!({ "file": update.file });
            self.trigger(WatchEventKind::ToolUpdated, &update.tool, &details);
        }
        changes.extend(updates);

        if !changes.is_empty() {
            metrics::counter!("watch_changes_total").increment(changes.len() as u64);
        }
        changes
    }

    /// Poll every `interval` until `max_iterations` checks have run, or
    /// forever when `None`.
    pub async fn watch_loop(&mut self, interval: Duration, max_iterations: Option<u64>) {
        let mut iteration = 0;

        while max_iterations.map_or(true, |max| iteration < max) {
            let changes = self.check();
            if !changes.is_empty() {
                info!(count = changes.len(), "Detected tool changes");
                for change in &changes {
                    info!(
                        event = ?change.event,
                        tool = %change.tool,
                        file = change.file.as_deref().unwrap_or("N/A"),
                        "Tool change"
                    );
                }
            }

            tokio::time::sleep(interval).await;
            iteration += 1;
        }
    }

    pub fn watched_tools(&self) -> Vec<String> {
        self.watchers.keys().cloned().collect()
    }

    pub fn export_state(&self) -> WatcherState {
        WatcherState {
            tools_dir: self.tools_dir.clone(),
            watched_tools: self.watched_tools(),
            total_watchers: self.watchers.values().map(BTreeMap::len).sum(),
            last_scan: self.last_scan,
        }
    }

    /// Diff the top-level directories against the known set. With `notify`
    /// unset, new directories are recorded silently.
    fn scan_tools(&mut self, notify: bool) -> Vec<ChangeEvent> {
        let Ok(entries) = std::fs::read_dir(&self.tools_dir) else {
            return Vec::new();
        };

        let mut dirs: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                Some((name, path))
            })
            .collect();
        dirs.sort();

        let current: BTreeSet<&str> = dirs.iter().map(|(name, _)| name.as_str()).collect();
        let mut changes = Vec::new();

        for (name, path) in &dirs {
            if self.watchers.contains_key(name) {
                continue;
            }

            let files = layout::WATCHED_FILES
                .iter()
                .map(|file| (*file, FileWatcher::new(path.join(file))))
                .collect();
            self.watchers.insert(name.clone(), files);

            if notify {
                debug!(tool = %name, "Tool added");
                changes.push(ChangeEvent {
                    timestamp: Utc::now(),
                    event: WatchEventKind::ToolAdded,
                    tool: name.clone(),
                    file: None,
                    path: Some(path.clone()),
                });
            }
        }

        let removed: Vec<String> = self
            .watchers
            .keys()
            .filter(|name| !current.contains(name.as_str()))
            .cloned()
            .collect();
        for name in removed {
            debug!(tool = %name, "Tool removed");
            self.watchers.remove(&name);
            changes.push(ChangeEvent {
                timestamp: Utc::now(),
                event: WatchEventKind::ToolRemoved,
                tool: name,
                file: None,
                path: None,
            });
        }

        self.last_scan = Some(Utc::now());

        for change in &changes {
            self.trigger(change.event, &change.tool, &json!({}));
        }
        changes
    }

    /// Call every subscriber for `event`. Errors and panics are logged and
    /// swallowed so one broken subscriber cannot stop the watcher.
    fn trigger(&mut self, event: WatchEventKind, tool: &str, details: &Value) {
        let Some(callbacks) = self.callbacks.get_mut(&event) else {
            return;
        };

        for callback in callbacks.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(tool, details))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(?event, tool, error = %e, "Watch callback failed"),
                Err(_) => error!(?event, tool, "Watch callback panicked"),
            }
        }
    }
}
