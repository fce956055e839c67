//! Confidence-weighted voting.
//!
//! Each vote contributes `+confidence` (yes), `-confidence` (no) or nothing
//! (abstain). The sign of the sum decides; unanimity measures how lopsided
//! the yes/no weights are.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    #[serde(alias = "yes", alias = "Yes")]
    Yes,
    #[serde(alias = "no", alias = "No")]
    No,
    #[serde(alias = "abstain", alias = "Abstain")]
    Abstain,
}

impl Decision {
    fn sign(&self) -> f64 {
        match self {
            Decision::Yes => 1.0,
            Decision::No => -1.0,
            Decision::Abstain => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Yes => "YES",
            Decision::No => "NO",
            Decision::Abstain => "ABSTAIN",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub agent_id: String,
    pub decision: Decision,
    /// In `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Vote {
    pub fn new(agent_id: impl Into<String>, decision: Decision, confidence: f64) -> Self {
        Self {
            agent_id: agent_id.into(),
            decision,
            confidence,
            reasoning: String::new(),
        }
    }

    pub fn weight(&self) -> f64 {
        self.decision.sign() * self.confidence
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct VoteBreakdown {
    pub yes: usize,
    pub no: usize,
    pub abstain: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusResult {
    pub final_decision: Decision,
    /// Sum of signed calibrated confidences.
    #[serde(serialize_with = "round3")]
    pub weighted_score: f64,
    /// Unanimity in `[0, 1]`: 1.0 unanimous, 0.0 an even split.
    #[serde(serialize_with = "round3")]
    pub confidence_level: f64,
    pub vote_breakdown: VoteBreakdown,
    /// The votes as cast, before calibration.
    pub individual_votes: Vec<Vote>,
    pub reasoning: String,
}

fn round3<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 1000.0).round() / 1000.0)
}

#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    calibration: f64,
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ConsensusEngine {
    /// `calibration` scales every confidence before weighting; values below
    /// 1.0 damp overconfident voters. Calibrated confidences are capped at 1.0.
    pub fn new(calibration: f64) -> Self {
        Self { calibration }
    }

    pub fn collect_votes(&self, votes: &[Vote]) -> Result<ConsensusResult> {
        if votes.is_empty() {
            return Err(AppError::InvalidInput("No votes to process".to_string()));
        }

        let calibrated = self.calibrate(votes);
        let weighted_score: f64 = calibrated.iter().map(Vote::weight).sum();
        let final_decision = decide(weighted_score);
        let confidence_level = unanimity(&calibrated);

        let result = ConsensusResult {
            final_decision,
            weighted_score,
            confidence_level,
            vote_breakdown: count_votes(votes),
            individual_votes: votes.to_vec(),
            reasoning: reasoning(&calibrated, weighted_score, final_decision, confidence_level),
        };

        tracing::debug!(
            decision = %result.final_decision,
            weighted_score,
            confidence_level,
            votes = votes.len(),
            "Consensus reached"
        );

        Ok(result)
    }

    fn calibrate(&self, votes: &[Vote]) -> Vec<Vote> {
        votes
            .iter()
            .map(|vote| Vote {
                confidence: f64::min(1.0, vote.confidence * self.calibration),
                ..vote.clone()
            })
            .collect()
    }
}

fn decide(weighted_score: f64) -> Decision {
    if weighted_score > 0.0 {
        Decision::Yes
    } else if weighted_score < 0.0 {
        Decision::No
    } else {
        Decision::Abstain
    }
}

/// Summed confidence of yes and no votes.
fn side_weights(votes: &[Vote]) -> (f64, f64) {
    votes.iter().fold((0.0, 0.0), |(yes, no), v| match v.decision {
        Decision::Yes => (yes + v.confidence, no),
        Decision::No => (yes, no + v.confidence),
        Decision::Abstain => (yes, no),
    })
}

fn unanimity(votes: &[Vote]) -> f64 {
    let (yes, no) = side_weights(votes);
    let total = yes + no;
    if total == 0.0 {
        return 0.0;
    }

    let max = f64::max(yes, no);
    ((max - (total - max)) / total).clamp(0.0, 1.0)
}

fn count_votes(votes: &[Vote]) -> VoteBreakdown {
    let mut counts = VoteBreakdown::default();
    for vote in votes {
        match vote.decision {
            Decision::Yes => counts.yes += 1,
            Decision::No => counts.no += 1,
            Decision::Abstain => counts.abstain += 1,
        }
    }
    counts
}

fn reasoning(votes: &[Vote], weighted_score: f64, decision: Decision, confidence: f64) -> String {
    let (yes_weight, no_weight) = side_weights(votes);
    let breakdown = count_votes(votes);

    format!(
        "Decision: {decision} | Weighted score: {weighted_score:.2} | Unanimity: {:.1}% | \
         Pro ({yes_weight:.2}): {} agents | Con ({no_weight:.2}): {} agents",
        confidence * 100.0,
        breakdown.yes,
        breakdown.no,
    )
}

/// Parse votes from a JSON array of `{agent_id, decision, confidence, reasoning?}`.
/// Decisions are accepted in upper, lower or title case.
pub fn votes_from_json(raw: &str) -> Result<Vec<Vote>> {
    Ok(serde_json::from_str(raw)?)
}
