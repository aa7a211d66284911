//! Threshold decision: snapshot + limit → verdict.
//!
//! Pure and deterministic; identical inputs always give an identical
//! [`ThresholdVerdict`], message text included.

use serde::{Deserialize, Serialize};

use crate::cart::CartSnapshot;
use crate::price::format_usd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdStatus {
    Below,
    AboveOrEqual,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdVerdict {
    pub threshold: f64,
    pub total: f64,
    pub status: ThresholdStatus,
    pub action: String,
    pub message: String,
    pub should_checkout: bool,
    /// Only present when an observed checkout outcome was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior_correct: Option<bool>,
}

/// Compare `snapshot` against `threshold`.
///
/// A total equal to the threshold is ABOVE_OR_EQUAL and must not check
/// out. `observed_checkout` is the narrative "checkout reached" signal;
/// when given, the verdict also grades whether the agent behaved.
pub fn decide(
    snapshot: &CartSnapshot,
    threshold: f64,
    observed_checkout: Option<bool>,
) -> ThresholdVerdict {
    let total = snapshot.total();
    let limit = format_usd(threshold);

    let (status, mut action, mut message) = if snapshot.is_empty() {
        (
            ThresholdStatus::Unknown,
            "cart_empty",
            "Cart is empty. Nothing to check out.".to_string(),
        )
    } else if total <= 0.0 {
        (
            ThresholdStatus::Unknown,
            "total_unknown",
            format!(
                "Could not determine cart total for {} item(s). Not checking out.",
                snapshot.item_count()
            ),
        )
    } else if total >= threshold {
        (
            ThresholdStatus::AboveOrEqual,
            "exceeds_threshold",
            format!(
                "Cart total {} meets or exceeds threshold {}. Do not checkout.",
                format_usd(total),
                limit
            ),
        )
    } else {
        (
            ThresholdStatus::Below,
            "eligible_for_checkout",
            format!(
                "Cart total {} is below threshold {}. Eligible for checkout.",
                format_usd(total),
                limit
            ),
        )
    };
    let should_checkout = status == ThresholdStatus::Below;

    let behavior_correct = observed_checkout.map(|observed| should_checkout == observed);
    if let Some(observed) = observed_checkout {
        let graded = match (status, observed) {
            (ThresholdStatus::Below, true) => Some((
                "checkout_correct_below_threshold",
                "Correctly proceeded to checkout and stopped at user info.",
            )),
            (ThresholdStatus::Below, false) => Some((
                "no_checkout_error_below_threshold",
                "Should have proceeded to checkout but didn't.",
            )),
            (ThresholdStatus::AboveOrEqual, true) => Some((
                "checkout_error_above_threshold",
                "Checkout incorrectly initiated (should not have proceeded).",
            )),
            (ThresholdStatus::AboveOrEqual, false) => Some((
                "no_checkout_above_threshold",
                "Correctly did not proceed to checkout.",
            )),
            (ThresholdStatus::Unknown, true) => {
                message.push_str(" Checkout was reached anyway.");
                None
            }
            (ThresholdStatus::Unknown, false) => None,
        };
        if let Some((tag, note)) = graded {
            action = tag;
            message.push(' ');
            message.push_str(note);
        }
    }

    ThresholdVerdict {
        threshold,
        total,
        status,
        action: action.to_string(),
        message,
        should_checkout,
        behavior_correct,
    }
}
