use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::pricing::band::PricingRule;

/// Largest price accepted for a real recommendation. Anything above is insufficient input,
/// which keeps every band value exactly representable as `i64`.
pub const MAX_PRICE: f64 = 1_000_000_000.0;

/// Operator identifier used when a submission does not carry one.
pub const ANONYMOUS_OPERATOR: &str = "anonymous";

/// Coarse job-size category used to partition historical comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    #[default]
    Snapshot,
    Walkaround,
}

impl ScopeType {
    /// Any value other than `walkaround` (case-insensitive) is a snapshot.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("walkaround") {
            ScopeType::Walkaround
        } else {
            ScopeType::Snapshot
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Snapshot => "snapshot",
            ScopeType::Walkaround => "walkaround",
        }
    }
}

/// An operator-submitted job, already normalised from untrusted input.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    /// `None` when the raw price was missing or not a number.
    pub price: Option<f64>,
    pub description: String,
    pub scope_type: ScopeType,
    pub operator_id: String,
}

impl JobSubmission {
    pub fn from_raw(
        price: Option<&str>,
        description: &str,
        scope_type: Option<&str>,
        operator_id: Option<&str>,
    ) -> Self {
        Self {
            price: price.and_then(parse_price),
            description: description.trim().to_string(),
            scope_type: scope_type.map(ScopeType::parse_lenient).unwrap_or_default(),
            operator_id: operator_id
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(ANONYMOUS_OPERATOR)
                .to_string(),
        }
    }

    /// The price, if it is usable for a real recommendation (finite, > 0, <= `MAX_PRICE`).
    pub fn usable_price(&self) -> Option<f64> {
        self.price
            .filter(|p| p.is_finite() && *p > 0.0 && *p <= MAX_PRICE)
    }
}

/// Parses an operator-typed price: `"500"`, `" $1,250.50 "`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed).trim_start();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', "").parse::<f64>().ok()
}

/// Reference to a stored media file attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub key: String,
    pub filename: String,
    pub mimetype: String,
    pub size: u64,
}

/// The engine's output for one submission.
///
/// `price == 0` marks the "insufficient input" variant: band and upsell are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub price: f64,
    pub scope_type: ScopeType,
    pub description: String,
    #[serde(default = "default_operator")]
    pub operator_id: String,
    pub ai_low: i64,
    pub ai_high: i64,
    pub upsell_potential: u32,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_hourly_rate: Option<f64>,
    #[serde(default)]
    pub pricing_rule: PricingRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<MediaRef>,
}

fn default_operator() -> String {
    ANONYMOUS_OPERATOR.to_string()
}

impl RecommendationResult {
    pub fn is_insufficient_input(&self) -> bool {
        self.price == 0.0
    }
}

/// A persisted recommendation, as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecommendation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: RecommendationResult,
}

impl StoredRecommendation {
    /// Stamps a fresh id and creation time on a result about to be appended.
    pub fn new(result: RecommendationResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            result,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RecommendationRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub operator_id: String,
    pub price: f64,
    pub scope_type: String,
    pub description: String,
    pub ai_low: i64,
    pub ai_high: i64,
    pub upsell_potential: i32,
    pub notes: String,
    pub implied_hourly_rate: Option<f64>,
    pub pricing_rule: String,
    pub media_ref: Option<Value>,
}

impl TryFrom<RecommendationRow> for StoredRecommendation {
    type Error = serde_json::Error;

    fn try_from(row: RecommendationRow) -> Result<Self, Self::Error> {
        let media_ref = row.media_ref.map(serde_json::from_value).transpose()?;
        Ok(StoredRecommendation {
            id: row.id,
            created_at: row.created_at,
            result: RecommendationResult {
                price: row.price,
                scope_type: ScopeType::parse_lenient(&row.scope_type),
                description: row.description,
                operator_id: row.operator_id,
                ai_low: row.ai_low,
                ai_high: row.ai_high,
                upsell_potential: row.upsell_potential.max(0) as u32,
                notes: row.notes,
                implied_hourly_rate: row.implied_hourly_rate,
                pricing_rule: PricingRule::parse_lenient(&row.pricing_rule),
                media_ref,
            },
        })
    }
}
