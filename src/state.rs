use crate::config::Config;
use crate::error::Result;
use crate::generation::ToolGenerator;
use crate::loader::{ToolLoader, ToolStatus};
use crate::persistence::CreationLog;
use crate::validation::{ProcessTestRunner, TestRunner, ToolValidator};
use crate::watcher::{ChangeEvent, ToolWatcher, WatchEventKind};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Every component of the tool pipeline, constructed once and passed to the
/// entry points that need it.
pub struct AppState {
    pub config: Config,
    pub loader: ToolLoader,
    pub watcher: ToolWatcher,
    pub generator: ToolGenerator,
    pub validator: ToolValidator,
    pub creation_log: CreationLog,
}

/// Combined view used by `stats` and for debugging.
#[derive(Debug, Serialize)]
pub struct StateSnapshot {
    pub tools_dir: String,
    pub available_tools: Vec<String>,
    pub loaded_tools: Vec<String>,
    pub watched_tools: Vec<String>,
    pub statistics: crate::persistence::CreationStatistics,
}

impl AppState {
    /// Initialize state with the default process test runner.
    pub fn new(config: Config) -> Result<Self> {
        let runner = process_runner(&config);
        Self::with_runner(config, Box::new(runner))
    }

    /// Initialize state with a caller-supplied test runner.
    ///
    /// Creates the tools directory if needed so the watcher starts from a
    /// known baseline.
    pub fn with_runner(config: Config, runner: Box<dyn TestRunner>) -> Result<Self> {
        std::fs::create_dir_all(&config.tools_dir)?;

        let loader = ToolLoader::new(&config.tools_dir);
        let watcher = ToolWatcher::new(&config.tools_dir);
        let generator = ToolGenerator::new(&config.tools_dir);
        let validator = ToolValidator::new(&config.tools_dir, runner)
            .with_retry_delay(config.validation_retry_delay());
        let creation_log = CreationLog::open(&config.creation_log_path);

        info!(
            tools_dir = %config.tools_dir.display(),
            creation_log = %config.creation_log_path.display(),
            available = loader.list_available().len(),
            "State initialized"
        );

        Ok(Self {
            config,
            loader,
            watcher,
            generator,
            validator,
            creation_log,
        })
    }

    /// Hot-reload: bring the loader in line with watcher events. Added tools
    /// are loaded, updated tools reloaded and removed tools unloaded.
    ///
    /// Watcher events name directories while the loader keys tools by
    /// `skill_name`, so each directory is resolved to its tool name first.
    pub fn apply_changes(&mut self, changes: &[ChangeEvent]) {
        for change in changes {
            let dir = change.tool.as_str();
            let tool = self
                .loader
                .name_for_dir(dir)
                .unwrap_or_else(|| change.tool.clone());

            let ok = match change.event {
                WatchEventKind::ToolAdded => self.loader.load(&tool, None),
                WatchEventKind::ToolUpdated => self.loader.reload(&tool),
                WatchEventKind::ToolRemoved => {
                    !self.loaded_from(&tool, dir) || self.loader.unload(&tool)
                }
            };

            if ok {
                info!(%tool, dir, event = ?change.event, "Hot-reload applied");
            } else {
                warn!(%tool, dir, event = ?change.event, "Hot-reload failed");
            }
        }
    }

    /// Whether `tool` is loaded from the directory `dir`. Removing one version
    /// directory leaves a different loaded version alone.
    fn loaded_from(&self, tool: &str, dir: &str) -> bool {
        self.loader
            .tool_info(tool)
            .filter(|info| info.status == ToolStatus::Loaded)
            .is_some_and(|info| info.path.file_name().is_some_and(|n| n == dir))
    }

    /// Poll for changes and hot-reload until `max_iterations` checks have run,
    /// or forever when `None`.
    pub async fn watch(&mut self, max_iterations: Option<u64>) {
        let interval = self.config.watch_interval();
        let mut iteration = 0;

        while max_iterations.map_or(true, |max| iteration < max) {
            let changes = self.watcher.check();
            self.apply_changes(&changes);

            tokio::time::sleep(interval).await;
            iteration += 1;
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            tools_dir: self.config.tools_dir.display().to_string(),
            available_tools: self.loader.list_available(),
            loaded_tools: self.loader.list_loaded(),
            watched_tools: self.watcher.watched_tools(),
            statistics: self.creation_log.get_stats().clone(),
        }
    }
}

/// Runner for `tests.sh` with the configured interpreter and timeout. The
/// script sees the absolute tools directory as `TOOLSMITH_TOOLS_DIR`.
pub fn process_runner(config: &Config) -> ProcessTestRunner {
    let runner = ProcessTestRunner::new(&config.test_interpreter, config.test_timeout());
    match absolute(&config.tools_dir) {
        Some(dir) => runner.with_env("TOOLSMITH_TOOLS_DIR", dir),
        None => runner,
    }
}

fn absolute(path: &Path) -> Option<String> {
    std::path::absolute(path)
        .ok()
        .and_then(|p| p.to_str().map(str::to_string))
}
