// Shared prompt constants and prompt-building utilities.
// Each interview stage defines its own templates in interview::prompts;
// this file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Alignment policy injected into every interviewer-facing prompt.
pub const ALIGNMENT_POLICY: &str = "\
    Alignment rules (follow strictly):\n\
    - Stay strictly relevant to the candidate's role and the current topic.\n\
    - Personalize to the candidate's role and domain.\n\
    - Avoid toxicity, discrimination, and disclosure of personal data.\n\
    - Be brief and professional.\n\
    - Do not hallucinate facts.\n\
    - When generating questions: exactly ONE concrete question, no preamble and no explanation.";
