//! Gap classification: decides whether a request is covered by an existing
//! tool and, when it is not, characterizes the missing capability.

use crate::detection::intent::{extract_intent, Intent};
use crate::detection::matcher::{find_matching_tools, MatchCandidate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A best match strictly above this score means no new tool is needed.
pub const NO_GAP_THRESHOLD: f64 = 0.85;

const DOMAIN_GAP_BELOW: f64 = 0.3;
const INTEGRATION_GAP_BELOW: f64 = 0.5;
const COMPLEXITY_GAP_ABOVE: f64 = 0.5;

const MAX_CORE_FUNCTIONS: usize = 5;
const MAX_DEPENDENCIES: usize = 3;
const MAX_SUCCESS_CRITERIA: usize = 2;

const BASE_COMPLEXITY: f64 = 5.0;
const COMPLEXITY_PER_ENTITY: f64 = 0.5;
const KEYWORD_DENSITY_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GapType {
    #[serde(rename = "domain-gap")]
    Domain,
    #[serde(rename = "integration-gap")]
    Integration,
    #[serde(rename = "complexity-gap")]
    Complexity,
    #[serde(rename = "format-gap")]
    Format,
    #[serde(rename = "workflow-gap")]
    Workflow,
}

impl GapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapType::Domain => "domain-gap",
            GapType::Integration => "integration-gap",
            GapType::Complexity => "complexity-gap",
            GapType::Format => "format-gap",
            GapType::Workflow => "workflow-gap",
        }
    }

    /// Offset applied to the base complexity estimate.
    fn complexity_offset(&self) -> f64 {
        match self {
            GapType::Domain => 2.0,
            GapType::Integration => 1.5,
            GapType::Complexity => 1.0,
            GapType::Format => -1.0,
            GapType::Workflow => 1.5,
        }
    }
}

impl fmt::Display for GapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic requirements handed to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub core_functions: Vec<String>,
    pub input_format: String,
    pub output_format: String,
    pub dependencies: Vec<String>,
    pub success_criteria: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityGap {
    pub gap_type: GapType,
    #[serde(rename = "missing_capability")]
    pub description: String,
    #[serde(rename = "suggested_skill_name")]
    pub suggested_tool_name: String,
    #[serde(rename = "tool_requirements")]
    pub requirements: Requirements,
    /// Estimated implementation effort in `[1, 10]`, one decimal place.
    pub complexity_score: f64,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

/// Outcome of gap detection for a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum GapDecision {
    NoGap {
        best_match: MatchCandidate,
        reason: String,
    },
    Gap(CapabilityGap),
}

impl GapDecision {
    pub fn gap_detected(&self) -> bool {
        matches!(self, GapDecision::Gap(_))
    }

    pub fn gap(&self) -> Option<&CapabilityGap> {
        match self {
            GapDecision::Gap(gap) => Some(gap),
            GapDecision::NoGap { .. } => None,
        }
    }

    /// JSON view with a `gap_detected` discriminator, used for reports and logs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            GapDecision::NoGap { best_match, reason } => serde_json::json!({
                "gap_detected": false,
                "reason": reason,
                "best_match": best_match,
            }),
            GapDecision::Gap(gap) => {
                let mut value = serde_json::to_value(gap).unwrap_or_default();
                if let Some(map) = value.as_object_mut() {
                    map.insert("gap_detected".into(), serde_json::Value::Bool(true));
                }
                value
            }
        }
    }
}

/// Run the full detection pipeline for a request against a list of tool names.
pub fn detect_gap(request: &str, available_tools: &[String]) -> GapDecision {
    let intent = extract_intent(request);
    let matches = find_matching_tools(&intent, available_tools);
    let decision = classify(&intent, &matches);

    match &decision {
        GapDecision::Gap(gap) => {
            tracing::info!(
                gap_type = %gap.gap_type,
                suggested_tool = %gap.suggested_tool_name,
                complexity = gap.complexity_score,
                confidence = gap.confidence,
                "Capability gap detected"
            );
            metrics::counter!("capability_gaps_detected_total", "gap_type" => gap.gap_type.as_str())
                .increment(1);
        }
        GapDecision::NoGap { best_match, .. } => {
            tracing::info!(
                tool = %best_match.tool_name,
                score = best_match.score,
                "Request covered by existing tool"
            );
        }
    }

    decision
}

/// Decide whether the ranked candidates cover the intent.
pub fn classify(intent: &Intent, matches: &[MatchCandidate]) -> GapDecision {
    if let Some(best) = matches.first() {
        if best.score > NO_GAP_THRESHOLD {
            return GapDecision::NoGap {
                reason: format!("Matching tool exists: {}", best.tool_name),
                best_match: best.clone(),
            };
        }
    }

    GapDecision::Gap(characterize_gap(intent, matches))
}

fn characterize_gap(intent: &Intent, matches: &[MatchCandidate]) -> CapabilityGap {
    let best = matches.first();
    let best_score = best.map(|m| m.score);

    let (gap_type, description) = match best {
        None => (
            GapType::Domain,
            format!("No existing tool handles {} operations", intent.category),
        ),
        Some(m) if m.score < DOMAIN_GAP_BELOW => (
            GapType::Domain,
            format!("No existing tool handles {} operations", intent.category),
        ),
        Some(m) if intent.entities.len() > 1 && m.score < INTEGRATION_GAP_BELOW => (
            GapType::Integration,
            format!("Need to combine {} handling", intent.entities.join(", ")),
        ),
        Some(m) if m.score > COMPLEXITY_GAP_ABOVE => (
            GapType::Complexity,
            format!(
                "Existing {} tool insufficient for advanced {} operations",
                m.tool_name, intent.action
            ),
        ),
        Some(_) => (
            GapType::Format,
            format!(
                "Need different format handling for {}",
                intent.entities.first().unwrap_or(&intent.category)
            ),
        ),
    };

    CapabilityGap {
        gap_type,
        description,
        suggested_tool_name: suggest_tool_name(intent),
        requirements: derive_requirements(intent),
        complexity_score: estimate_complexity(intent, gap_type),
        confidence: gap_confidence(best_score),
        detected_at: Utc::now(),
    }
}

/// `{first-entity}-{action}er`, or `{category}-{action}er` without entities.
pub fn suggest_tool_name(intent: &Intent) -> String {
    let raw = match intent.entities.first() {
        Some(entity) => format!("{}-{}er", entity.to_lowercase(), intent.action),
        None => format!("{}-{}er", intent.category, intent.action),
    };

    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_whitespace() || c == '_' { '-' } else { c };
        if c == '-' && name.ends_with('-') {
            continue;
        }
        name.push(c);
    }
    name
}

pub fn derive_requirements(intent: &Intent) -> Requirements {
    let core_functions: Vec<String> = if intent.entities.is_empty() {
        vec![
            format!("{}_data", intent.action),
            format!("process_{}", intent.category),
        ]
    } else {
        intent
            .entities
            .iter()
            .take(MAX_CORE_FUNCTIONS)
            .map(|entity| format!("{}_{}", intent.action, entity.to_lowercase()))
            .collect()
    };

    let success_criteria = if intent.entities.is_empty() {
        vec![format!("Handles {} operations correctly", intent.category)]
    } else {
        intent
            .entities
            .iter()
            .take(MAX_SUCCESS_CRITERIA)
            .map(|entity| format!("Successfully {}s {}", intent.action, entity))
            .collect()
    };

    Requirements {
        core_functions,
        input_format: "json".to_string(),
        output_format: "json".to_string(),
        dependencies: intent.entities.iter().take(MAX_DEPENDENCIES).cloned().collect(),
        success_criteria,
    }
}

/// Effort estimate clamped to `[1, 10]` and rounded to one decimal place.
pub fn estimate_complexity(intent: &Intent, gap_type: GapType) -> f64 {
    let mut complexity = BASE_COMPLEXITY + gap_type.complexity_offset();
    complexity += intent.entities.len() as f64 * COMPLEXITY_PER_ENTITY;

    if intent.keywords.len() > KEYWORD_DENSITY_THRESHOLD {
        complexity += 1.0;
    }

    let clamped = complexity.clamp(1.0, 10.0);
    (clamped * 10.0).round() / 10.0
}

/// Confidence that the gap is real: high when nothing comes close.
fn gap_confidence(best_score: Option<f64>) -> f64 {
    match best_score {
        None => 0.95,
        Some(s) if s < 0.2 => 0.9,
        Some(s) if s < 0.5 => 0.7,
        Some(_) => 0.5,
    }
}
