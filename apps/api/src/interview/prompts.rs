// All LLM prompt constants for the interview engine.
// Cross-cutting fragments (JSON-only system, alignment policy) live in
// llm_client::prompts; stage code fills the {placeholders} before sending.

/// System prompt for interview planning — enforces JSON-only output.
pub const PLANNING_SYSTEM: &str =
    "You are an experienced technical interviewer designing a personalized interview plan. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Planning prompt. Replace: {alignment}, {role}, {resume}, {job_description}
pub const PLANNING_PROMPT_TEMPLATE: &str = r#"Create a personalized technical interview plan.

Alignment policy:
{alignment}

Role: {role}
Candidate resume: {resume}
Job description: {job_description}

Plan requirements:
1. Start with a discussion of the resume and past experience (topic name exactly "Resume Discussion").
2. Include only topics strictly relevant to the job description and the resume content.
3. Order topics from general to more specific competency areas.
4. Cover both HARD and SOFT aspects.
5. Neutral wording (no seniority levels or job titles). No Markdown.

Return ONLY valid JSON:
{"topics": [{"name": "...", "description": "..."}, ...], "interview_style": "conversational"}"#;

/// Resume-question prompt. Replace: {alignment}, {role}, {resume},
/// {job_description}, {q_index}
pub const RESUME_QUESTION_PROMPT_TEMPLATE: &str = r#"You are a technical interviewer opening an interview.

Alignment policy:
{alignment}

Role: {role}
Candidate resume: {resume}
Job description: {job_description}
Question number within this topic: {q_index}

Ask ONE open-ended question about the candidate's resume and past experience,
tailored to the role and the job description. Focus on concrete projects,
decisions, and outcomes.

Return ONLY the question text, one line, no preamble and no explanation."#;

/// System prompt for answer evaluation — enforces JSON-only output.
pub const EVALUATION_SYSTEM: &str =
    "You are a strict but fair technical interviewer scoring a candidate's answer. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Evaluation prompt. Replace: {alignment}, {role}, {topic}, {question}, {answer}
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"Score the candidate's answer on six criteria, each an integer from 0 to 10.

Alignment policy:
{alignment}

Role: {role}
Topic: {topic}
Question: {question}
Candidate answer: {answer}

Return ONLY valid JSON with this EXACT schema:
{
  "technical_accuracy": 0,
  "depth_of_knowledge": 0,
  "practical_experience": 0,
  "communication_clarity": 0,
  "problem_solving_approach": 0,
  "examples_and_use_cases": 0,
  "inconsistencies": ["..."],
  "red_flags": ["..."],
  "strengths": ["..."],
  "weaknesses": ["..."],
  "follow_up_suggestions": ["..."]
}

Scoring rules:
- 0 means no answer or entirely wrong; 10 means expert-level.
- If the candidate says they do not know or gives no substantive answer,
  score the relevant criteria 0-2 and record it in red_flags.
- Keep every list entry short and concrete. Use empty arrays when nothing applies."#;

/// Follow-up generation prompt used by the Adaptive Controller.
/// Replace: {alignment}, {difficulty}, {style}, {topic}, {current_question},
/// {last_answer}, {question_number}
pub const FOLLOWUP_PROMPT_TEMPLATE: &str = r#"You are a creative technical interviewer. Generate a {difficulty} {style} question on the topic "{topic}".

Alignment policy:
{alignment}

CONTEXT:
- Previous question: {current_question}
- Candidate answer: {last_answer}
- Question number: {question_number}

CRITICAL:
1. The question must be COMPLETELY DIFFERENT from the previous one in content and wording.
2. Use DIFFERENT aspects of the topic: theory, practice, tooling, examples, comparisons.
3. Vary the format: "How...", "What happens if...", "Compare...", "Give an example of...", "Explain the difference...".
4. Do not mention the candidate's level or job title. No preamble, no hints, no answers, no lists.
5. Return ONLY ONE short question on a single line with no extra text.
6. Avoid generic questions; be concrete and practical.

CHECK BEFORE GENERATING:
- Does the question fit the current topic and context without repeating earlier ones?
- Is it specific (no vague phrasing) and varied in formulation?
- Is the format correct: one line, no preamble, no explanation, no lists?"#;

/// Guided-hint reformulation prompt used when the candidate struggled.
/// Replace: {alignment}, {topic}, {prev_question}, {last_answer},
/// {improvement_hint}, {question_number}
pub const GUIDED_HINT_PROMPT_TEMPLATE: &str = r#"You are a strict but tactful interviewer. Reformulate the previous question so the candidate intuitively understands where to strengthen the answer, without explicit hints.

Alignment policy:
{alignment}

Context:
- Topic: {topic}
- Previous question: {prev_question}
- Candidate answer: {last_answer}
- What to steer attention toward (subtly, no direct hints): {improvement_hint}
- Question number: {question_number}

Requirements:
1. Return ONLY ONE short question on a single line.
2. Do not use explicit hint phrasing such as "note that" or "think about".
3. Word the question so it gently nudges the candidate to cover the missed aspect through specifics.
4. Do not repeat the previous question verbatim: change the angle, tighten the wording, add a criterion or a constraint.
5. No preamble, no explanation, no lists, no answers."#;

/// System prompt for the final report.
pub const REPORT_SYSTEM: &str =
    "You are a hiring committee assistant writing a final interview report. \
    Be factual and concise. Base every statement on the data provided.";

/// Report prompt. Replace: {resume}, {job_description}, {topics_summary},
/// {avg_score}, {inconsistencies}, {red_flags}, {strengths}, {weaknesses}
pub const REPORT_PROMPT_TEMPLATE: &str = r#"Write the final interview report.

Candidate resume: {resume}
Job description: {job_description}

Per-topic results:
{topics_summary}

Average score: {avg_score}

Detected inconsistencies: {inconsistencies}
Red flags: {red_flags}
Strengths: {strengths}
Weaknesses: {weaknesses}

Structure the report as: overall impression, strengths, weaknesses and risks,
topic-by-topic notes, and a closing verdict. End the verdict with exactly one
of the keywords HIRE, MAYBE, or REJECT."#;

/// Truncates to at most `limit` characters on a char boundary.
/// Prompt inputs are user-supplied and unbounded; every template caps them.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
