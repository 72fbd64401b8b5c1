use derive_more::Display;
use serde::{Deserialize, Serialize};

use samadhaan_dispute_model::Negotiation;

/// What the mediator advises the MSME to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    #[display(fmt = "make_initial_offer")]
    MakeInitialOffer,
    #[display(fmt = "wait_for_response")]
    WaitForResponse,
    #[display(fmt = "accept")]
    Accept,
    #[display(fmt = "counter")]
    Counter,
    #[display(fmt = "escalate")]
    Escalate,
}

/// How likely the negotiation is to settle, with the advice derived
/// from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementAnalysis {
    pub probability: f64,
    pub reasoning: String,
    pub recommended_action: RecommendedAction,
    pub confidence: f64,
    /// How much the gap between consecutive positions shrank in the
    /// last exchange, relative to the gap before it.
    pub convergence_rate: f64,
    pub rounds_remaining: u32,
}

/// Relative shrinkage of the last gap against the one before it.
/// Positive means the parties are closing in, zero or negative that
/// they stalled or drifted apart. Needs at least three amounts to say
/// anything.
pub fn convergence_rate(amounts: &[f64]) -> f64 {
    let diffs: Vec<f64> = amounts
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();
    if diffs.len() < 2 {
        return 0.0;
    }
    let previous = diffs[diffs.len() - 2];
    let last = diffs[diffs.len() - 1];
    if previous > 0.0 {
        (previous - last) / previous
    } else {
        0.0
    }
}

/// Reads the merged offer timeline and grades settlement likelihood.
pub fn analyze(negotiation: &Negotiation) -> SettlementAnalysis {
    let amounts = negotiation.amount_trail();
    let rounds_remaining = negotiation.rounds_remaining();

    if amounts.is_empty() {
        return SettlementAnalysis {
            probability: 0.0,
            reasoning: "No offers have been made yet".to_string(),
            recommended_action: RecommendedAction::MakeInitialOffer,
            confidence: 1.0,
            convergence_rate: 0.0,
            rounds_remaining,
        };
    }
    if amounts.len() == 1 {
        return SettlementAnalysis {
            probability: 0.3,
            reasoning: "Initial offer made, awaiting response".to_string(),
            recommended_action: RecommendedAction::WaitForResponse,
            confidence: 0.8,
            convergence_rate: 0.0,
            rounds_remaining,
        };
    }

    let rate = convergence_rate(&amounts);
    let (probability, reasoning, mut action) = if rate > 0.5 {
        (
            0.85,
            "Offers are converging rapidly. Settlement highly likely.",
            if amounts.len() >= 3 {
                RecommendedAction::Accept
            } else {
                RecommendedAction::Counter
            },
        )
    } else if rate > 0.2 {
        (
            0.65,
            "Offers are converging steadily. Continue negotiation.",
            RecommendedAction::Counter,
        )
    } else if rate > 0.0 {
        (
            0.45,
            "Offers are converging slowly. More rounds may be needed.",
            RecommendedAction::Counter,
        )
    } else {
        (
            0.25,
            "Offers are not converging. Consider escalation.",
            if negotiation.current_round >= 4 {
                RecommendedAction::Escalate
            } else {
                RecommendedAction::Counter
            },
        )
    };

    let mut reasoning = reasoning.to_string();
    // Low probability this close to the round limit means countering
    // again would only burn the last rounds.
    if negotiation.current_round >= negotiation.max_rounds.saturating_sub(1) && probability < 0.6 {
        action = RecommendedAction::Escalate;
        reasoning.push_str(" Maximum rounds approaching.");
    }

    SettlementAnalysis {
        probability,
        reasoning,
        recommended_action: action,
        confidence: 0.75,
        convergence_rate: round2(rate),
        rounds_remaining,
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
