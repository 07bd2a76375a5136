//! History Tuner — re-centers the band on the current price using the median relative
//! width of past recommendations in the same scope.
//!
//! Never touches upsell or notes. Skips silently when the corpus is too thin.

use crate::models::recommendation::{RecommendationResult, ScopeType};
use crate::pricing::band::{round_price, Draft, PriceBand, PricingRule};

const MIN_SCOPE_ENTRIES: usize = 5;
const MIN_WIDTH_SAMPLES: usize = 3;
/// Relative widths at or above this are treated as corrupted entries.
const MAX_SAMPLE_WIDTH: f64 = 1.5;
const MIN_TUNED_WIDTH: f64 = 0.15;
const MAX_TUNED_WIDTH: f64 = 0.45;

/// Median relative band width for `scope`, or `None` if there is not enough usable data.
pub fn peer_width(scope: ScopeType, corpus: &[RecommendationResult]) -> Option<f64> {
    let peers: Vec<&RecommendationResult> =
        corpus.iter().filter(|r| r.scope_type == scope).collect();
    if peers.len() < MIN_SCOPE_ENTRIES {
        return None;
    }

    let mut widths: Vec<f64> = peers
        .iter()
        .map(|r| (r.ai_high - r.ai_low) as f64 / r.price)
        .filter(|w| w.is_finite() && *w > 0.0 && *w < MAX_SAMPLE_WIDTH)
        .collect();
    if widths.len() < MIN_WIDTH_SAMPLES {
        return None;
    }

    widths.sort_by(f64::total_cmp);
    Some(median(&widths).clamp(MIN_TUNED_WIDTH, MAX_TUNED_WIDTH))
}

/// `values` must be sorted and non-empty.
fn median(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Re-centers `draft` around `price` with the peer width, whichever rule produced it.
/// Upsell and note kind are kept.
pub fn tune(
    draft: Draft,
    price: f64,
    scope: ScopeType,
    corpus: &[RecommendationResult],
) -> Draft {
    let Some(width) = peer_width(scope, corpus) else {
        return draft;
    };

    let low = round_price(price * (1.0 - width / 2.0));
    let high = round_price(price * (1.0 + width / 2.0));
    if low <= 0 || high <= low {
        return draft;
    }

    Draft {
        band: PriceBand::new(low, high),
        rule: PricingRule::HistoryTuned,
        ..draft
    }
}
