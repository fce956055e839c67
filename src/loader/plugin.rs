//! Statically registered tool handlers.
//!
//! A tool's `implementation.json` declares its functions and names the
//! handler that serves each one:
//!
//! ```json
//! { "functions": { "read_pdf": "echo" } }
//! ```
//!
//! Loading a tool resolves every entry against the [`HandlerRegistry`].
//! Nothing discovered on disk is ever executed.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A handler serving one or more tool functions.
pub trait ToolHandler: Send + Sync {
    /// Handle a call to `function`. Errors are user-facing messages.
    fn call(&self, function: &str, input: &Value) -> std::result::Result<Value, String>;
}

/// Returns its input wrapped in a success envelope. Rejects `null`.
pub struct EchoHandler;

impl ToolHandler for EchoHandler {
    fn call(&self, function: &str, input: &Value) -> std::result::Result<Value, String> {
        if input.is_null() {
            return Err("Invalid input: expected a JSON value, got null".to_string());
        }
        Ok(json!({
            "success": true,
            "data": input,
            "metadata": { "function": function },
        }))
    }
}

/// Accepts non-empty JSON objects.
pub struct ValidateInputHandler;

impl ToolHandler for ValidateInputHandler {
    fn call(&self, function: &str, input: &Value) -> std::result::Result<Value, String> {
        let Some(object) = input.as_object() else {
            return Err(format!("Invalid input: expected a JSON object, got {}", type_name(input)));
        };
        if object.is_empty() {
            return Err("Invalid input: object is empty".to_string());
        }
        Ok(json!({
            "success": true,
            "valid": true,
            "fields": object.keys().collect::<Vec<_>>(),
            "metadata": { "function": function },
        }))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Function name -> handler id.
    pub functions: BTreeMap<String, String>,
}

impl PluginManifest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ImportFailure(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::ImportFailure(format!("Invalid manifest {}: {}", path.display(), e))
        })
    }
}

/// Handler ids available to tool manifests.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the `echo` and `validate_input` handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("echo", Arc::new(EchoHandler));
        registry.register("validate_input", Arc::new(ValidateInputHandler));
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(id.into(), handler);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Bind every manifest entry to its handler. Unknown ids fail the whole import.
    pub fn resolve(&self, manifest: &PluginManifest) -> Result<LoadedPlugin> {
        let mut functions = BTreeMap::new();

        for (function, handler_id) in &manifest.functions {
            let handler = self.handlers.get(handler_id).ok_or_else(|| {
                AppError::ImportFailure(format!(
                    "Unknown handler '{handler_id}' for function '{function}'"
                ))
            })?;
            functions.insert(function.clone(), Arc::clone(handler));
        }

        Ok(LoadedPlugin { functions })
    }

    pub fn load_manifest(&self, path: &Path) -> Result<LoadedPlugin> {
        self.resolve(&PluginManifest::from_file(path)?)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &ids).finish()
    }
}

/// A tool's functions bound to their handlers.
#[derive(Clone)]
pub struct LoadedPlugin {
    functions: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl LoadedPlugin {
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn invoke(&self, function: &str, input: &Value) -> Result<Value> {
        let handler = self
            .functions
            .get(function)
            .ok_or_else(|| AppError::NotFound(format!("Function not found: {function}")))?;
        handler.call(function, input).map_err(AppError::InvalidInput)
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
