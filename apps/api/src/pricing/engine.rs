//! Smart Pricing Band Engine — turns one submission plus a read-only corpus snapshot into a
//! bounded recommendation.
//!
//! Flow: extract_signals → synthesize (base band + override rules) → tune (peer width)
//!       → shield (final sanity override) → render_note.
//!
//! Pure and synchronous: the same submission and corpus always give the same result. Note
//! refinement (`notes::refine_note`) is the only async step and runs after this.

use tracing::debug;

use crate::models::recommendation::{JobSubmission, RecommendationResult};
use crate::pricing::band::{synthesize, PricingRule, RuleInput};
use crate::pricing::history::tune;
use crate::pricing::notes::{render_note, NoteKind};
use crate::pricing::shield::shield;
use crate::pricing::signals::extract_signals;

pub fn recommend(
    submission: &JobSubmission,
    corpus: &[RecommendationResult],
) -> RecommendationResult {
    let Some(price) = submission.usable_price() else {
        debug!("Insufficient input: price {:?}", submission.price);
        return insufficient_input(submission);
    };

    let signals = extract_signals(&submission.description);
    let input = RuleInput::new(price, signals);

    let draft = synthesize(&input);
    let draft = tune(draft, price, submission.scope_type, corpus);
    let draft = shield(draft, price);

    debug!(
        "Recommendation for {price}: band {}..{} upsell {} via {}",
        draft.band.low(),
        draft.band.high(),
        draft.upsell,
        draft.rule.as_str()
    );

    RecommendationResult {
        price,
        scope_type: submission.scope_type,
        description: submission.description.clone(),
        operator_id: submission.operator_id.clone(),
        ai_low: draft.band.low(),
        ai_high: draft.band.high(),
        upsell_potential: draft.upsell,
        notes: render_note(
            draft.note,
            draft.band.low(),
            draft.band.high(),
            draft.upsell,
            submission.scope_type,
        ),
        implied_hourly_rate: input.implied_hourly_rate,
        pricing_rule: draft.rule,
        media_ref: None,
    }
}

/// The zero-band variant. Callers tell it apart by `price == 0`.
fn insufficient_input(submission: &JobSubmission) -> RecommendationResult {
    RecommendationResult {
        price: 0.0,
        scope_type: submission.scope_type,
        description: submission.description.clone(),
        operator_id: submission.operator_id.clone(),
        ai_low: 0,
        ai_high: 0,
        upsell_potential: 0,
        notes: render_note(NoteKind::InsufficientInput, 0, 0, 0, submission.scope_type),
        implied_hourly_rate: None,
        pricing_rule: PricingRule::InsufficientInput,
        media_ref: None,
    }
}
