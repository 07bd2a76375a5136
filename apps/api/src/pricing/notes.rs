//! Coaching Note Selector — the boundary between deterministic numbers and free text.
//!
//! Every rule picks a `NoteKind`; the text is rendered from the FINAL band, so a
//! deterministic note can never quote a number the band does not contain. An optional
//! `NoteRefiner` may rephrase it, but its output is only accepted if every price it
//! mentions lies inside the band and every percentage equals the upsell. Anything else falls
//! back to the deterministic note.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm_client::{LlmClient, LlmError};
use crate::models::recommendation::{RecommendationResult, ScopeType};
use crate::pricing::prompts::{note_refine_system, NOTE_REFINE_PROMPT_TEMPLATE};

/// Refined notes longer than this are rejected.
const MAX_NOTE_CHARS: usize = 600;

/// Bare numbers from this size up read as prices ("charge 2,000"); smaller ones ("2 hours")
/// are left alone.
const BARE_PRICE_MIN: f64 = 100.0;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\$\s*)?(\d[\d,]*(?:\.\d+)?)(?:\s*(k\b|%|dollars?\b|bucks?\b|usd\b))?")
        .expect("valid number regex")
});

/// Which coaching message applies. Set by whichever rule shaped the band last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    InsufficientInput,
    WorkableLane,
    AtCeiling,
    ExtremeHourlyRate,
    PremiumOnly,
    TopEnd,
    RoomToRaise,
}

pub fn render_note(kind: NoteKind, low: i64, high: i64, upsell: u32, scope: ScopeType) -> String {
    match kind {
        NoteKind::InsufficientInput => "Not enough to go on yet. Enter the price you charged as a \
            number greater than zero and a fair band will be built around it."
            .to_string(),
        NoteKind::WorkableLane => format!(
            "You're in a workable lane for {} work. A fair band for this job is ${low} to \
             ${high}, with roughly {upsell}% room to grow on similar jobs.",
            scope.as_str()
        ),
        NoteKind::AtCeiling => format!(
            "This is a tiny job and you're already at the ceiling for it. Hold the line \
             between ${low} and ${high}; there's no upsell room here, so win on speed and a \
             clean finish."
        ),
        NoteKind::ExtremeHourlyRate => format!(
            "The implied hourly rate on this job is extreme for the time described. A \
             defensible band is ${low} to ${high}; trend toward the lower end on similar work."
        ),
        NoteKind::PremiumOnly => format!(
            "This is a large ticket. Stay inside ${low} to ${high}, and only reach for the top \
             of that range when the work is genuinely premium."
        ),
        NoteKind::TopEnd => format!(
            "You're already at the top end for this kind of job. A defensible band is ${low} \
             to ${high}; keep delivering at that level."
        ),
        NoteKind::RoomToRaise => format!(
            "You're pricing lean. There's real room to move: a fair band is ${low} to ${high}, \
             about {upsell}% above what you charged."
        ),
    }
}

/// True if `text` asserts no price outside `[low, high]` and no percentage other than
/// `upsell`.
///
/// A number is a price when it carries `$`, a `k`/`dollars`/`bucks`/`usd` suffix, or is at
/// least `BARE_PRICE_MIN`.
pub fn note_respects_band(text: &str, low: i64, high: i64, upsell: u32) -> bool {
    let in_band = |amount: f64| amount >= low as f64 && amount <= high as f64;

    NUMBER_RE.captures_iter(text).all(|caps| {
        let Some(value) = caps
            .get(2)
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        else {
            return false;
        };
        let suffix = caps.get(3).map(|m| m.as_str().to_ascii_lowercase());
        match suffix.as_deref() {
            Some("%") => value == f64::from(upsell),
            Some("k") => in_band(value * 1000.0),
            Some(_) => in_band(value),
            None if caps.get(1).is_some() || value >= BARE_PRICE_MIN => in_band(value),
            None => true,
        }
    })
}

/// Picks the candidate text if it is usable, otherwise the deterministic note.
pub fn select_note(
    deterministic: &str,
    candidate: Option<&str>,
    low: i64,
    high: i64,
    upsell: u32,
) -> String {
    match candidate.map(str::trim) {
        Some(text)
            if !text.is_empty()
                && text.chars().count() <= MAX_NOTE_CHARS
                && note_respects_band(text, low, high, upsell) =>
        {
            text.to_string()
        }
        Some(text) => {
            debug!(
                "Rejected refined note ({} chars), keeping deterministic note",
                text.chars().count()
            );
            deterministic.to_string()
        }
        None => deterministic.to_string(),
    }
}

/// The fixed numbers a refiner must work within.
#[derive(Debug, Clone)]
pub struct RefineRequest<'a> {
    pub price: f64,
    pub low: i64,
    pub high: i64,
    pub upsell: u32,
    pub implied_hourly_rate: Option<f64>,
    pub scope: ScopeType,
    pub description: &'a str,
    pub note: &'a str,
}

impl<'a> RefineRequest<'a> {
    pub fn from_result(result: &'a RecommendationResult) -> Self {
        Self {
            price: result.price,
            low: result.ai_low,
            high: result.ai_high,
            upsell: result.upsell_potential,
            implied_hourly_rate: result.implied_hourly_rate,
            scope: result.scope_type,
            description: &result.description,
            note: &result.notes,
        }
    }
}

/// Best-effort rephrasing of a coaching note. Implementations may fail or be slow; callers
/// always hold a deterministic fallback.
///
/// Carried in `AppState` as `Option<Arc<dyn NoteRefiner>>`.
#[async_trait]
pub trait NoteRefiner: Send + Sync {
    async fn refine(&self, request: &RefineRequest<'_>) -> Result<String, LlmError>;
}

/// Rephrases notes through the shared LLM client.
pub struct LlmNoteRefiner(pub LlmClient);

#[derive(Debug, Deserialize)]
struct RefinedNote {
    note: String,
}

#[async_trait]
impl NoteRefiner for LlmNoteRefiner {
    async fn refine(&self, request: &RefineRequest<'_>) -> Result<String, LlmError> {
        let prompt = build_refine_prompt(request);
        let refined: RefinedNote = self.0.complete_json(&prompt, &note_refine_system()).await?;
        Ok(refined.note)
    }
}

fn build_refine_prompt(request: &RefineRequest<'_>) -> String {
    let hourly = request
        .implied_hourly_rate
        .map(|rate| format!("{rate:.0}"))
        .unwrap_or_else(|| "unknown".to_string());

    NOTE_REFINE_PROMPT_TEMPLATE
        .replace("{price}", &format!("{:.2}", request.price))
        .replace("{low}", &request.low.to_string())
        .replace("{high}", &request.high.to_string())
        .replace("{upsell}", &request.upsell.to_string())
        .replace("{hourly}", &hourly)
        .replace("{scope}", request.scope.as_str())
        .replace("{description}", request.description)
        .replace("{note}", request.note)
}

/// Calls `refiner` at most once, bounded by `timeout`, and swaps in its text if usable.
/// Numeric fields are never touched.
pub async fn refine_note(
    mut result: RecommendationResult,
    refiner: Option<&dyn NoteRefiner>,
    timeout: Duration,
) -> RecommendationResult {
    let Some(refiner) = refiner else {
        return result;
    };
    if result.is_insufficient_input() {
        return result;
    }

    let request = RefineRequest::from_result(&result);
    let candidate = match tokio::time::timeout(timeout, refiner.refine(&request)).await {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!("Note refinement failed, keeping deterministic note: {e}");
            None
        }
        Err(_) => {
            warn!(
                "Note refinement timed out after {}ms, keeping deterministic note",
                timeout.as_millis()
            );
            None
        }
    };

    result.notes = select_note(
        &result.notes,
        candidate.as_deref(),
        result.ai_low,
        result.ai_high,
        result.upsell_potential,
    );
    result
}
