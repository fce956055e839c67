//! Syntax phase: the implementation manifest must be well-formed JSON.

use crate::validation::validator::ValidationResult;
use serde_json::json;
use std::path::Path;

pub const PHASE: &str = "syntax";

pub fn check_manifest(path: &Path) -> ValidationResult {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => return ValidationResult::failed(PHASE, json!({ "error": e.to_string() })),
    };

    match serde_json::from_str::<serde_json::Value>(&source) {
        Ok(_) => ValidationResult::new(PHASE, true, json!({ "message": "Valid JSON manifest" })),
        Err(e) => ValidationResult::failed(
            PHASE,
            json!({
                "error": "Syntax error",
                "line": e.line(),
                "column": e.column(),
                "message": e.to_string(),
            }),
        ),
    }
}
