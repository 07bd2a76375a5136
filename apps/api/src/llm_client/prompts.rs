// Shared prompt fragments.
// Each module that needs LLM calls defines its own prompts.rs alongside it;
// this file holds the cross-cutting pieces.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Locks every number handed to the model.
pub const FIXED_NUMBERS_INSTRUCTION: &str = "\
    CRITICAL: Every number in the request was computed by a deterministic pricing engine. \
    Do NOT change, round, re-derive or contradict any of them. \
    Do NOT introduce a price, percentage or dollar amount that was not supplied. \
    If you cannot phrase the note without new numbers, repeat the supplied note unchanged.";
