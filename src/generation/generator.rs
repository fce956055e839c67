//! Writes a complete tool bundle to `<tools_dir>/<tool_name>/`.

use crate::detection::gap::{CapabilityGap, GapType, Requirements};
use crate::error::{AppError, Result};
use crate::generation::templates;
use crate::layout;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Manifest written alongside the docs so the bundle can be loaded at once.
/// Bindings come from [`templates::manifest_bindings`].
pub fn render_implementation(core_functions: &[String], gap_type: GapType) -> String {
    let functions: serde_json::Map<String, serde_json::Value> =
        templates::manifest_bindings(core_functions, gap_type)
            .into_iter()
            .map(|(func, handler)| (func, serde_json::Value::String(handler.to_string())))
            .collect();
    let manifest = serde_json::json!({ "functions": functions });
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ToolGenerator {
    tools_dir: PathBuf,
}

impl ToolGenerator {
    pub fn new(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: tools_dir.into(),
        }
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    /// Create (or overwrite) the bundle for `tool_name`. Files written before
    /// a failure are left in place.
    #[instrument(skip(self, requirements, gap), fields(tools_dir = %self.tools_dir.display()))]
    pub fn create_tool(
        &self,
        tool_name: &str,
        requirements: &Requirements,
        gap: &CapabilityGap,
    ) -> Result<PathBuf> {
        layout::check_tool_name(tool_name)?;

        let tool_dir = self.tools_dir.join(tool_name);
        fs::create_dir_all(&tool_dir).map_err(|e| {
            AppError::GenerationFailure(format!(
                "Failed to create {}: {}",
                tool_dir.display(),
                e
            ))
        })?;

        let files = [
            (
                layout::SKILL_DOC,
                templates::render_skill_doc(tool_name, requirements, gap),
            ),
            (
                layout::METADATA,
                templates::render_metadata(tool_name, requirements, gap),
            ),
            (
                layout::IMPLEMENTATION,
                render_implementation(&requirements.core_functions, gap.gap_type),
            ),
            (
                layout::TESTS,
                templates::render_tests(tool_name, &requirements.core_functions),
            ),
            (layout::README, templates::render_readme(tool_name)),
        ];

        for (file_name, contents) in files {
            let path = tool_dir.join(file_name);
            fs::write(&path, contents).map_err(|e| {
                AppError::GenerationFailure(format!("Failed to write {}: {}", path.display(), e))
            })?;
        }

        info!(tool = tool_name, path = %tool_dir.display(), "Tool generated");
        metrics::counter!("tools_generated_total").increment(1);

        Ok(tool_dir)
    }
}
