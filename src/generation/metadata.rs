//! Typed form of a tool's `metadata.json`.

use crate::detection::gap::{CapabilityGap, GapType, Requirements};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CREATED_BY: &str = "toolsmith";
pub const INITIAL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStatus {
    Active,
    Inactive,
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub skill_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub capability_gap: String,
    pub gap_type: GapType,
    pub requirements: MetadataRequirements,
    pub testing: TestingSummary,
    pub status: MetadataStatus,
    pub version: String,
    pub hotreload_enabled: bool,
    pub last_tested: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRequirements {
    pub core_functions: Vec<String>,
    pub dependencies: Vec<String>,
    pub complexity_score: f64,
    pub estimated_build_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestingSummary {
    pub unit_tests: usize,
    pub integration_tests: usize,
    pub pass_rate: f64,
}

impl ToolMetadata {
    pub fn for_gap(tool_name: &str, requirements: &Requirements, gap: &CapabilityGap) -> Self {
        Self {
            skill_name: tool_name.to_string(),
            created_by: CREATED_BY.to_string(),
            created_at: Utc::now(),
            capability_gap: gap.description.clone(),
            gap_type: gap.gap_type,
            requirements: MetadataRequirements {
                core_functions: requirements.core_functions.clone(),
                dependencies: requirements.dependencies.clone(),
                complexity_score: gap.complexity_score,
                estimated_build_time: estimate_build_time(gap.complexity_score).to_string(),
            },
            testing: TestingSummary {
                unit_tests: requirements.core_functions.len() * 2,
                integration_tests: 0,
                pass_rate: 0.0,
            },
            status: MetadataStatus::Active,
            version: INITIAL_VERSION.to_string(),
            hotreload_enabled: true,
            last_tested: None,
        }
    }
}

pub fn estimate_build_time(complexity: f64) -> &'static str {
    if complexity < 4.0 {
        "15-20 minutes"
    } else if complexity < 7.0 {
        "30-45 minutes"
    } else {
        "1-2 hours"
    }
}
