//! Text Signal Extractor — pulls duration cues and "tiny job" markers out of a free-text
//! job description.
//!
//! Heuristic only: signals feed rule triggers downstream, they never decide whether the
//! input is valid.

use once_cell::sync::Lazy;
use regex::Regex;

static HOURS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:hours|hour|hrs|hr)\b").expect("valid hours regex")
});

static MINUTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:minutes|minute|mins|min)\b")
        .expect("valid minutes regex")
});

/// Lower-case markers that flag a job as tiny.
const TINY_JOB_MARKERS: &[&str] = &[
    "1 min",
    "5 min",
    "one min",
    "one minute",
    "two minute",
    "five min",
    "five minute",
    "tiny",
    "quick touch",
    "quick stop",
    "real quick",
    "super quick",
    "in and out",
    "few seconds",
];

/// Signals extracted from a job description.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextSignals {
    /// `None` means no duration was mentioned. It is never a stand-in for zero.
    pub approx_hours: Option<f64>,
    pub tiny_job: bool,
}

pub fn extract_signals(description: &str) -> TextSignals {
    TextSignals {
        approx_hours: extract_hours(description),
        tiny_job: has_tiny_job_marker(description),
    }
}

/// Hour mentions win over minute mentions; within a pattern only the first match counts.
pub fn extract_hours(description: &str) -> Option<f64> {
    if let Some(hours) = first_quantity(&HOURS_RE, description) {
        return Some(hours);
    }
    first_quantity(&MINUTES_RE, description).map(|minutes| minutes / 60.0)
}

fn first_quantity(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

pub fn has_tiny_job_marker(description: &str) -> bool {
    let lower = description.to_lowercase();
    TINY_JOB_MARKERS
        .iter()
        .any(|marker| contains_marker(&lower, marker))
}

/// Substring match, except that a marker starting with a digit must not continue a
/// longer number ("45 min" is not "5 min").
fn contains_marker(haystack: &str, marker: &str) -> bool {
    let starts_with_digit = marker.chars().next().is_some_and(|c| c.is_ascii_digit());
    haystack.match_indices(marker).any(|(idx, _)| {
        !starts_with_digit
            || !haystack[..idx]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_digit() || c == '.')
    })
}
