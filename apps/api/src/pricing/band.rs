//! Band Synthesizer — turns a raw price plus text signals into a provisional band, upsell
//! score and note kind.
//!
//! The override rules are an explicit ordered table of guard-conditioned functions. Each
//! rule sees the draft produced so far and either returns a replacement or `None`; the
//! last rule whose guard matches wins.

use serde::{Deserialize, Serialize};

use crate::pricing::notes::NoteKind;
use crate::pricing::signals::TextSignals;

/// Ceiling for every path except the under-band shield.
pub const STANDARD_UPSELL_CAP: u32 = 40;
/// Floor and ceiling used only by the under-band shield path.
pub const UNDER_BAND_UPSELL_FLOOR: u32 = 25;
pub const UNDER_BAND_UPSELL_CAP: u32 = 60;

const BASE_UPSELL: u32 = 15;
const TINY_JOB_MIN_PRICE: f64 = 400.0;
const TINY_JOB_MAX_HOURS: f64 = 0.25;
const EXTREME_HOURLY_RATE: f64 = 1000.0;
const LARGE_TICKET_PRICE: f64 = 2000.0;

/// The rule that last shaped a recommendation. Persisted for transparency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingRule {
    #[default]
    Base,
    TinyJobCeiling,
    ExtremeHourlyRate,
    LargeTicket,
    HistoryTuned,
    ShieldTopEnd,
    ShieldUnderBand,
    InsufficientInput,
}

impl PricingRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingRule::Base => "base",
            PricingRule::TinyJobCeiling => "tiny_job_ceiling",
            PricingRule::ExtremeHourlyRate => "extreme_hourly_rate",
            PricingRule::LargeTicket => "large_ticket",
            PricingRule::HistoryTuned => "history_tuned",
            PricingRule::ShieldTopEnd => "shield_top_end",
            PricingRule::ShieldUnderBand => "shield_under_band",
            PricingRule::InsufficientInput => "insufficient_input",
        }
    }

    /// Unknown labels fall back to `Base`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw {
            "tiny_job_ceiling" => PricingRule::TinyJobCeiling,
            "extreme_hourly_rate" => PricingRule::ExtremeHourlyRate,
            "large_ticket" => PricingRule::LargeTicket,
            "history_tuned" => PricingRule::HistoryTuned,
            "shield_top_end" => PricingRule::ShieldTopEnd,
            "shield_under_band" => PricingRule::ShieldUnderBand,
            "insufficient_input" => PricingRule::InsufficientInput,
            _ => PricingRule::Base,
        }
    }
}

/// Recommended inclusive price range. Always `0 < low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBand {
    low: i64,
    high: i64,
}

impl PriceBand {
    /// Floors `low` at 1 and lifts `high` to `low` if rounding inverted them.
    pub fn new(low: i64, high: i64) -> Self {
        let low = low.max(1);
        Self {
            low,
            high: high.max(low),
        }
    }

    pub fn low(&self) -> i64 {
        self.low
    }

    pub fn high(&self) -> i64 {
        self.high
    }
}

pub(crate) fn round_price(value: f64) -> i64 {
    value.round() as i64
}

/// Band, upsell and note as they move through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draft {
    pub band: PriceBand,
    pub upsell: u32,
    pub note: NoteKind,
    pub rule: PricingRule,
}

/// Everything a rule guard may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput {
    pub price: f64,
    pub signals: TextSignals,
    pub implied_hourly_rate: Option<f64>,
}

impl RuleInput {
    pub fn new(price: f64, signals: TextSignals) -> Self {
        Self {
            price,
            signals,
            implied_hourly_rate: implied_hourly_rate(price, signals.approx_hours),
        }
    }
}

/// `price / hours`, only when a positive duration is known.
pub fn implied_hourly_rate(price: f64, approx_hours: Option<f64>) -> Option<f64> {
    approx_hours
        .filter(|h| *h > 0.0)
        .map(|h| price / h)
        .filter(|rate| rate.is_finite())
}

type Rule = fn(&Draft, &RuleInput) -> Option<Draft>;

/// Applied in order after the base band.
const OVERRIDE_RULES: &[Rule] = &[tiny_job_ceiling, extreme_hourly_rate, large_ticket];

pub fn synthesize(input: &RuleInput) -> Draft {
    let draft = OVERRIDE_RULES
        .iter()
        .fold(base_band(input.price), |draft, rule| {
            rule(&draft, input).unwrap_or(draft)
        });

    Draft {
        upsell: draft.upsell.min(STANDARD_UPSELL_CAP),
        ..draft
    }
}

/// ±25% around the price, kept within [50%, 160%] of it.
fn base_band(price: f64) -> Draft {
    let low = round_price(price * 0.75).max(round_price(price * 0.5));
    let high = round_price(price * 1.25).min(round_price(price * 1.6));
    Draft {
        band: PriceBand::new(low, high),
        upsell: BASE_UPSELL,
        note: NoteKind::WorkableLane,
        rule: PricingRule::Base,
    }
}

/// A tiny job billed at 400+ is already at the ceiling. The only rule that pins `high`
/// to the literal price.
fn tiny_job_ceiling(_draft: &Draft, input: &RuleInput) -> Option<Draft> {
    let short = input
        .signals
        .approx_hours
        .is_some_and(|h| h <= TINY_JOB_MAX_HOURS);
    if !(input.signals.tiny_job || short) || input.price < TINY_JOB_MIN_PRICE {
        return None;
    }
    Some(Draft {
        band: PriceBand::new(round_price(input.price * 0.8), round_price(input.price)),
        upsell: 0,
        note: NoteKind::AtCeiling,
        rule: PricingRule::TinyJobCeiling,
    })
}

/// Implied hourly rate above 1000. Does not override a tiny-job ceiling, whose short
/// duration always implies an extreme rate.
fn extreme_hourly_rate(draft: &Draft, input: &RuleInput) -> Option<Draft> {
    if draft.rule == PricingRule::TinyJobCeiling {
        return None;
    }
    let rate = input.implied_hourly_rate?;
    if rate <= EXTREME_HOURLY_RATE {
        return None;
    }
    Some(Draft {
        band: PriceBand::new(round_price(input.price * 0.6), round_price(input.price * 0.9)),
        upsell: 0,
        note: NoteKind::ExtremeHourlyRate,
        rule: PricingRule::ExtremeHourlyRate,
    })
}

/// Large tickets get no upsell. Keeps the band and any more specific note.
fn large_ticket(draft: &Draft, input: &RuleInput) -> Option<Draft> {
    if input.price < LARGE_TICKET_PRICE || draft.rule == PricingRule::ExtremeHourlyRate {
        return None;
    }
    let (note, rule) = match draft.rule {
        PricingRule::Base => (NoteKind::PremiumOnly, PricingRule::LargeTicket),
        _ => (draft.note, draft.rule),
    };
    Some(Draft {
        upsell: 0,
        note,
        rule,
        ..*draft
    })
}
