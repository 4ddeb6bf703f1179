// Shared prompt fragments used by every analysis prompt.
// Each analysis defines its own template in analysis/prompts.rs.

/// System instruction that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every template so the model does not invent resources.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    Only reference real, publicly reachable resources and real technologies. \
    If you are unsure about a URL, omit it rather than guessing.";
