//! Capability-gap detection.
//!
//! A request flows through three pure stages: [`intent::extract_intent`]
//! summarizes it, [`matcher::find_matching_tools`] scores the known tool
//! names, and [`gap::classify`] decides whether a new tool is needed.

pub mod gap;
pub mod intent;
pub mod matcher;

pub use gap::{detect_gap, CapabilityGap, GapDecision, GapType, Requirements};
pub use intent::{extract_intent, Intent};
pub use matcher::{find_matching_tools, MatchCandidate};
