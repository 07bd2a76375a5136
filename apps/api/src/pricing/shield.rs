//! Stress-Test Shield — the last pass. Makes sure the band never contradicts the price the
//! operator already charged.
//!
//! Runs after the synthesizer and the history tuner and overrides both when it triggers.
//! The under-band path uses its own upsell range (`UNDER_BAND_UPSELL_FLOOR..=CAP`), which
//! is wider than the standard cap applied by the synthesizer.

use crate::pricing::band::{
    round_price, Draft, PriceBand, PricingRule, UNDER_BAND_UPSELL_CAP, UNDER_BAND_UPSELL_FLOOR,
};
use crate::pricing::notes::NoteKind;

/// `price / high` at or above this means the operator is well above the recommended ceiling.
const TOP_END_RATIO: f64 = 1.35;
/// `price / low` at or below this means the operator is well under the recommended floor.
const UNDER_BAND_RATIO: f64 = 0.65;

pub fn shield(draft: Draft, price: f64) -> Draft {
    let high_ratio = price / draft.band.high() as f64;
    if high_ratio >= TOP_END_RATIO {
        return Draft {
            band: PriceBand::new(round_price(price * 0.9), round_price(price * 1.05)),
            upsell: 0,
            note: NoteKind::TopEnd,
            rule: PricingRule::ShieldTopEnd,
        };
    }

    let low_ratio = price / draft.band.low() as f64;
    if low_ratio <= UNDER_BAND_RATIO {
        let headroom = (draft.band.high() as f64 - price).max(0.0);
        let pct = (headroom / price * 100.0).round();
        let upsell = pct.clamp(UNDER_BAND_UPSELL_FLOOR as f64, UNDER_BAND_UPSELL_CAP as f64) as u32;
        return Draft {
            upsell,
            note: NoteKind::RoomToRaise,
            rule: PricingRule::ShieldUnderBand,
            ..draft
        };
    }

    draft
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(low: i64, high: i64) -> Draft {
        Draft {
            band: PriceBand::new(low, high),
            upsell: 15,
            note: NoteKind::WorkableLane,
            rule: PricingRule::HistoryTuned,
        }
    }

    #[test]
    fn test_band_consistent_with_price_is_untouched() {
        let d = draft(750, 1250);
        assert_eq!(shield(d, 1000.0), d);
    }

    #[test]
    fn test_price_far_above_band_forces_top_end() {
        // 1400 / 1000 = 1.4
        let shielded = shield(draft(600, 1000), 1400.0);
        assert_eq!(shielded.band, PriceBand::new(1260, 1470));
        assert_eq!(shielded.upsell, 0);
        assert_eq!(shielded.note, NoteKind::TopEnd);
        assert_eq!(shielded.rule, PricingRule::ShieldTopEnd);
    }

    #[test]
    fn test_price_just_under_top_end_ratio_is_untouched() {
        let d = draft(600, 1000);
        assert_eq!(shield(d, 1349.0), d);
    }

    #[test]
    fn test_price_far_below_band_raises_upsell() {
        // 100 / 200 = 0.5, headroom (300 - 100) / 100 = 200% -> capped at 60
        let shielded = shield(draft(200, 300), 100.0);
        assert_eq!(shielded.band, PriceBand::new(200, 300));
        assert_eq!(shielded.upsell, UNDER_BAND_UPSELL_CAP);
        assert_eq!(shielded.note, NoteKind::RoomToRaise);
        assert_eq!(shielded.rule, PricingRule::ShieldUnderBand);
    }

    #[test]
    fn test_under_band_upsell_is_headroom_percentage() {
        // 650 / 1000 = 0.65, headroom (1010 - 650) / 650 = 55.4%
        let shielded = shield(draft(1000, 1010), 650.0);
        assert_eq!(shielded.upsell, 55);
        assert!(shielded.upsell >= UNDER_BAND_UPSELL_FLOOR);
    }

    #[test]
    fn test_top_end_check_runs_before_under_band_check() {
        let d = draft(1000, 1000);
        assert_eq!(shield(d, 1000.0), d);
        assert_eq!(shield(d, 1500.0).rule, PricingRule::ShieldTopEnd);
        assert_eq!(shield(d, 600.0).rule, PricingRule::ShieldUnderBand);
    }
}
