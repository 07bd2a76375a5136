// LLM prompt constants for coaching-note refinement.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{FIXED_NUMBERS_INSTRUCTION, JSON_ONLY_SYSTEM};

/// Role half of the refinement system prompt. See `note_refine_system`.
const NOTE_REFINE_ROLE: &str = "You are a blunt, supportive pricing coach for independent \
    detailing and repair operators. You rewrite short coaching notes so they sound human.";

/// Full system prompt for note refinement: role, JSON-only output, locked numbers.
pub fn note_refine_system() -> String {
    format!("{NOTE_REFINE_ROLE} {JSON_ONLY_SYSTEM} {FIXED_NUMBERS_INSTRUCTION}")
}

/// Note refinement prompt template.
/// Replace: {price}, {low}, {high}, {upsell}, {hourly}, {scope}, {description}, {note}
pub const NOTE_REFINE_PROMPT_TEMPLATE: &str = r#"Rewrite the coaching note below for the operator who submitted this job.

FIXED NUMBERS (already decided — you may restate them but never change them):
- Price charged: ${price}
- Recommended band: ${low} to ${high}
- Upsell potential: {upsell}%
- Implied hourly rate: {hourly}
- Scope: {scope}

JOB DESCRIPTION (operator's words, may be informal):
{description}

CURRENT NOTE (the meaning you must preserve):
{note}

Return a JSON object:
{
  "note": "Two or three plain sentences for the operator."
}

HARD RULES:
1. Any dollar amount you write MUST be between ${low} and ${high} inclusive
2. If upsell potential is 0, do NOT suggest raising the price
3. Keep it under 80 words, no lists, no headings"#;
