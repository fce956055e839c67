//! Keyword-overlap scoring of tool names against an [`Intent`].

use crate::detection::intent::Intent;
use serde::{Deserialize, Serialize};

const CATEGORY_WEIGHT: f64 = 0.3;
const ACTION_WEIGHT: f64 = 0.3;
const ENTITY_WEIGHT: f64 = 0.2;
const KEYWORD_WEIGHT: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    #[serde(rename = "name")]
    pub tool_name: String,
    /// Heuristic relevance in `[0, 1]`.
    #[serde(rename = "match_score")]
    pub score: f64,
}

/// Score every available tool name and return those with a positive score,
/// best first. Equal scores keep the order of `available_tools`.
pub fn find_matching_tools(intent: &Intent, available_tools: &[String]) -> Vec<MatchCandidate> {
    let mut matches: Vec<MatchCandidate> = available_tools
        .iter()
        .filter_map(|tool_name| {
            let score = score_tool(intent, tool_name);
            (score > 0.0).then(|| MatchCandidate {
                tool_name: tool_name.clone(),
                score,
            })
        })
        .collect();

    // sort_by is stable, so ties stay in discovery order
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    tracing::debug!(
        available = available_tools.len(),
        matched = matches.len(),
        "Tool matching complete"
    );

    matches
}

/// Additive score: category and action hits are worth 0.3 each, every
/// entity hit 0.2 and every keyword hit 0.05. Capped at 1.0.
pub fn score_tool(intent: &Intent, tool_name: &str) -> f64 {
    let tool_lower = tool_name.to_lowercase();
    let mut score = 0.0;

    if tool_lower.contains(&intent.category.to_lowercase()) {
        score += CATEGORY_WEIGHT;
    }

    if tool_lower.contains(&intent.action.to_lowercase()) {
        score += ACTION_WEIGHT;
    }

    for entity in &intent.entities {
        if tool_lower.contains(&entity.to_lowercase()) {
            score += ENTITY_WEIGHT;
        }
    }

    for keyword in &intent.keywords {
        if tool_lower.contains(keyword.as_str()) {
            score += KEYWORD_WEIGHT;
        }
    }

    f64::min(score, 1.0)
}
