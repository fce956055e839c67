use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one sub-directory per tool.
    pub tools_dir: PathBuf,
    /// JSON document recording every tool created on demand.
    pub creation_log_path: PathBuf,
    /// Program used to execute generated `tests.sh` files.
    pub test_interpreter: String,
    /// Upper bound for a single test run before it is reported as failed.
    pub test_timeout_secs: u64,
    /// Poll interval of the watch loop.
    pub watch_interval_ms: u64,
    /// Load attempts made by the orchestrator after generating a tool.
    pub load_retries: usize,
    pub load_retry_delay_ms: u64,
    /// Attempts made by the `validate` command unless `--retries` is given.
    pub validation_retries: usize,
    pub validation_retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Every variable is prefixed with `TOOLSMITH_`:
    /// - `TOOLS_DIR` (default `skills`)
    /// - `CREATION_LOG` (default `tool-creation-log.json`)
    /// - `TEST_INTERPRETER` (default `sh`), `TEST_TIMEOUT_SECS` (default 30)
    /// - `WATCH_INTERVAL_MS` (default 1000)
    /// - `LOAD_RETRIES` (default 5), `LOAD_RETRY_DELAY_MS` (default 1000)
    /// - `VALIDATION_RETRIES` (default 3), `VALIDATION_RETRY_DELAY_MS` (default 1000)
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            tools_dir: PathBuf::from(
                env::var("TOOLSMITH_TOOLS_DIR").unwrap_or_else(|_| "skills".to_string()),
            ),
            creation_log_path: PathBuf::from(
                env::var("TOOLSMITH_CREATION_LOG")
                    .unwrap_or_else(|_| "tool-creation-log.json".to_string()),
            ),
            test_interpreter: env::var("TOOLSMITH_TEST_INTERPRETER")
                .unwrap_or_else(|_| "sh".to_string()),
            test_timeout_secs: env::var("TOOLSMITH_TEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            watch_interval_ms: env::var("TOOLSMITH_WATCH_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            load_retries: env::var("TOOLSMITH_LOAD_RETRIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            load_retry_delay_ms: env::var("TOOLSMITH_LOAD_RETRY_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            validation_retries: env::var("TOOLSMITH_VALIDATION_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            validation_retry_delay_ms: env::var("TOOLSMITH_VALIDATION_RETRY_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
        })
    }

    /// Defaults rooted at an explicit directory, with the creation log stored beside it.
    ///
    /// Retry delays are zero so embedders and tests do not sleep.
    pub fn for_tools_dir(tools_dir: impl Into<PathBuf>) -> Self {
        let tools_dir = tools_dir.into();
        let creation_log_path = tools_dir
            .parent()
            .map(|p| p.join("tool-creation-log.json"))
            .unwrap_or_else(|| PathBuf::from("tool-creation-log.json"));

        Self {
            tools_dir,
            creation_log_path,
            test_interpreter: "sh".to_string(),
            test_timeout_secs: 30,
            watch_interval_ms: 1000,
            load_retries: 5,
            load_retry_delay_ms: 0,
            validation_retries: 3,
            validation_retry_delay_ms: 0,
        }
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    pub fn load_retry_delay(&self) -> Duration {
        Duration::from_millis(self.load_retry_delay_ms)
    }

    pub fn validation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.validation_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_tools_dir_places_log_beside_tools() {
        let config = Config::for_tools_dir("/data/skills");

        assert_eq!(config.tools_dir, PathBuf::from("/data/skills"));
        assert_eq!(
            config.creation_log_path,
            PathBuf::from("/data/tool-creation-log.json")
        );
        assert_eq!(config.load_retry_delay(), Duration::ZERO);
        assert_eq!(config.test_timeout(), Duration::from_secs(30));
    }
}
