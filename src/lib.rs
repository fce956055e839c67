//! Toolsmith - capability-gap detection and on-demand tool generation
//!
//! A request is checked against the tools already present in a tools
//! directory. When none covers it, a new tool is generated from templates,
//! validated, hot-loaded and recorded in a creation log.

pub mod cli;
pub mod config;
pub mod consensus;
pub mod detection;
pub mod error;
pub mod generation;
pub mod layout;
pub mod loader;
pub mod orchestrator;
pub mod persistence;
pub mod state;
pub mod validation;
pub mod watcher;

// Re-export key types for convenience
pub use config::Config;
pub use detection::{detect_gap, CapabilityGap, GapDecision, GapType};
pub use error::{AppError, Result};
pub use orchestrator::{create_tool_on_demand, ApprovalGate, AutoApprove, CreationOutcome};
pub use state::AppState;
