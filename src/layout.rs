//! On-disk layout of a tool bundle: `<tools_dir>/<tool-name>/<file>`.

use crate::error::{AppError, Result};

/// Markdown documentation with `---` front matter. Its presence marks a directory as a tool.
pub const SKILL_DOC: &str = "SKILL.md";
pub const METADATA: &str = "metadata.json";
/// Function manifest resolved against the host's handler registry.
pub const IMPLEMENTATION: &str = "implementation.json";
pub const TESTS: &str = "tests.sh";
pub const README: &str = "README.md";

/// Files the watcher tracks for content changes.
pub const WATCHED_FILES: [&str; 3] = [SKILL_DOC, METADATA, IMPLEMENTATION];

/// A tool name must be a single path component directly under the tools
/// directory: non-empty, no separators, not starting with `.`.
pub fn check_tool_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(AppError::InvalidInput(format!("Invalid tool name: {name:?}")));
    }
    Ok(())
}
