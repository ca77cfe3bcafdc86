//! Adaptive Controller — the policy engine steering the interview.
//!
//! Two halves, deliberately separated so the policy is testable without any
//! model call:
//!   * `decide` — a pure, ordered rule table over the current topic's
//!     evaluation suffix and the session counters. First matching rule wins.
//!   * `execute_decision` — turns a decision into a `StatePatch`, generating
//!     the follow-up question on demand for every action except
//!     `SkipTopic`/`Continue`.

use tracing::{debug, info, warn};

use crate::config::ControllerPolicy;
use crate::interview::prompts::{
    truncate_chars, FOLLOWUP_PROMPT_TEMPLATE, GUIDED_HINT_PROMPT_TEMPLATE,
};
use crate::interview::state::{
    AnswerEvaluation, ControllerVerdict, InterviewState, Question, QuestionSource, QuestionType,
    StatePatch,
};
use crate::llm_client::prompts::ALIGNMENT_POLICY;
use crate::llm_client::ModelClient;

/// Score bands for streak classification.
const POOR_BELOW: f64 = 40.0;
const GOOD_AT_LEAST: f64 = 80.0;
/// Last-score thresholds for the closing rule.
const DEEPEN_AT_LEAST: f64 = 70.0;
const SAME_LEVEL_AT_LEAST: f64 = 40.0;

/// Generated questions longer than this are cut down to their first sentence.
const MAX_GENERATED_CHARS: usize = 500;
const MIN_GENERATED_CHARS: usize = 10;

/// Rotating style hints keyed by `questions_asked_count % 5` to discourage
/// repetitive phrasing.
const STYLE_ROTATION: &[&str] = &[
    "theoretical",
    "practical",
    "comparative",
    "example-driven",
    "problem-solving",
];

/// Fixed follow-up fallbacks, indexed by `questions_asked_count % 5`.
const FOLLOWUP_FALLBACKS: &[&str] = &[
    "Tell me about a task you are particularly proud of: the goal, your contribution, and the result.",
    "How do you usually approach solving non-trivial problems? Describe the steps.",
    "Give an example of a time you improved the quality or efficiency of a process.",
    "Which tools and practices help you maintain the quality of your work?",
    "Describe a situation where a difficulty came up: what did you do and what did you conclude?",
];

// ────────────────────────────────────────────────────────────────────────────
// Decisions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// First question of the topic: nothing to adapt to yet.
    Continue,
    SkipTopic,
    DeepenTopic,
    SameLevelQuestion,
    ProvideHint,
    /// Not produced by the default rule table; available to custom tables.
    IncreaseDifficulty,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
    /// Set when a cap rule consumed the deepening counter.
    pub reset_deepening: bool,
    /// Set when a cap rule consumed the hint counter.
    pub reset_hints: bool,
}

impl Decision {
    fn new(action: Action, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            reset_deepening: false,
            reset_hints: false,
        }
    }
}

/// Everything a rule may look at. Built once per `decide` call.
struct RuleContext<'a> {
    /// Evaluation scores for the current topic, oldest first.
    scores: Vec<f64>,
    last_evaluation: Option<&'a AnswerEvaluation>,
    questions_in_topic: u32,
    /// Quota of the topic under the cursor; `None` when the cursor ran off
    /// the plan (the Router terminates in that case).
    topic_quota: Option<u32>,
    deepening_count: u32,
    hints_count: u32,
    policy: &'a ControllerPolicy,
}

type Rule = fn(&RuleContext) -> Option<Decision>;

/// The ordered rule table. Evaluated top-to-bottom; first match wins.
const RULES: &[(&str, Rule)] = &[
    ("first-question", rule_first_question),
    ("topic-quota", rule_topic_quota),
    ("deepening-cap", rule_deepening_cap),
    ("hint-cap", rule_hint_cap),
    ("unknown-answer", rule_unknown_answer),
    ("flagged-answer", rule_flagged_answer),
    ("streaks", rule_streaks),
    ("score-band", rule_score_band),
];

/// Pure decision step. No model calls, no side effects.
pub fn decide(state: &InterviewState, policy: &ControllerPolicy) -> Decision {
    let ctx = RuleContext {
        scores: state.current_topic_scores(),
        last_evaluation: state.last_evaluation(),
        questions_in_topic: state.questions_in_current_topic,
        topic_quota: state.current_topic_quota().map(|q| if q > 0 { q } else { 2 }),
        deepening_count: state.deepening_questions_count,
        hints_count: state.hints_given_count,
        policy,
    };

    debug!(
        "Topic scores: {:?}; deepening {}/{}, hints {}/{}",
        ctx.scores,
        ctx.deepening_count,
        policy.max_deepening_questions,
        ctx.hints_count,
        policy.max_hints
    );

    for (name, rule) in RULES {
        if let Some(decision) = rule(&ctx) {
            debug!("Rule '{name}' fired: {:?} ({})", decision.action, decision.reason);
            return decision;
        }
    }

    // The score-band rule is total once any evaluation exists, and the
    // first-question rule covers the empty case.
    unreachable!("rule table is total")
}

fn rule_first_question(ctx: &RuleContext) -> Option<Decision> {
    if ctx.scores.is_empty() {
        return Some(Decision::new(Action::Continue, "first question of the topic"));
    }
    None
}

fn rule_topic_quota(ctx: &RuleContext) -> Option<Decision> {
    let quota = ctx.topic_quota?;
    if ctx.questions_in_topic >= quota {
        return Some(Decision::new(
            Action::SkipTopic,
            format!(
                "topic question quota reached ({}/{})",
                ctx.questions_in_topic, quota
            ),
        ));
    }
    None
}

fn rule_deepening_cap(ctx: &RuleContext) -> Option<Decision> {
    if ctx.deepening_count >= ctx.policy.max_deepening_questions {
        let mut decision = Decision::new(
            Action::SameLevelQuestion,
            format!(
                "deepening question cap reached ({}/{}), resetting the counter",
                ctx.deepening_count, ctx.policy.max_deepening_questions
            ),
        );
        decision.reset_deepening = true;
        return Some(decision);
    }
    None
}

fn rule_hint_cap(ctx: &RuleContext) -> Option<Decision> {
    if ctx.hints_count >= ctx.policy.max_hints {
        let mut decision = Decision::new(
            Action::SameLevelQuestion,
            format!(
                "hint cap reached ({}/{}), resetting the counter",
                ctx.hints_count, ctx.policy.max_hints
            ),
        );
        decision.reset_hints = true;
        return Some(decision);
    }
    None
}

fn rule_unknown_answer(ctx: &RuleContext) -> Option<Decision> {
    let last = ctx.last_evaluation?;
    if is_unknown_response(last, ctx.policy) && ctx.hints_count < ctx.policy.max_hints {
        return Some(Decision::new(
            Action::ProvideHint,
            "the evaluation flagged a no-answer/unsure response",
        ));
    }
    None
}

fn rule_flagged_answer(ctx: &RuleContext) -> Option<Decision> {
    let last = ctx.last_evaluation?;
    if !last.analysis.inconsistencies.is_empty() || !last.analysis.red_flags.is_empty() {
        return Some(Decision::new(
            Action::DeepenTopic,
            format!(
                "inconsistencies/red flags found: {:?}",
                [
                    last.analysis.inconsistencies.as_slice(),
                    last.analysis.red_flags.as_slice()
                ]
                .concat()
            ),
        ));
    }
    None
}

fn rule_streaks(ctx: &RuleContext) -> Option<Decision> {
    let poor = count_poor_streak(&ctx.scores);
    let good = count_good_streak(&ctx.scores);
    let medium = count_medium_streak(&ctx.scores);

    if poor >= ctx.policy.max_poor_answers {
        return Some(Decision::new(
            Action::SkipTopic,
            format!("{poor} poor answers in a row"),
        ));
    }
    if good >= ctx.policy.max_good_answers {
        return Some(Decision::new(
            Action::SkipTopic,
            format!("{good} good answers in a row"),
        ));
    }
    if medium >= ctx.policy.max_medium_answers {
        return Some(Decision::new(
            Action::SkipTopic,
            format!("{medium} medium answers in a row"),
        ));
    }
    None
}

fn rule_score_band(ctx: &RuleContext) -> Option<Decision> {
    let last = *ctx.scores.last()?;
    if last >= DEEPEN_AT_LEAST {
        Some(Decision::new(
            Action::DeepenTopic,
            format!("strong result ({last:.0}%), digging deeper"),
        ))
    } else if last >= SAME_LEVEL_AT_LEAST {
        Some(Decision::new(
            Action::SameLevelQuestion,
            format!("medium result ({last:.0}%), staying at this level"),
        ))
    } else {
        Some(Decision::new(
            Action::ProvideHint,
            format!("weak result ({last:.0}%), offering a hint"),
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Streaks and the unknown-answer heuristic
// ────────────────────────────────────────────────────────────────────────────

/// Consecutive trailing scores below the poor threshold.
pub fn count_poor_streak(scores: &[f64]) -> u32 {
    scores.iter().rev().take_while(|s| **s < POOR_BELOW).count() as u32
}

/// Consecutive trailing scores at or above the good threshold.
pub fn count_good_streak(scores: &[f64]) -> u32 {
    scores
        .iter()
        .rev()
        .take_while(|s| **s >= GOOD_AT_LEAST)
        .count() as u32
}

/// Consecutive trailing scores in the medium band.
pub fn count_medium_streak(scores: &[f64]) -> u32 {
    scores
        .iter()
        .rev()
        .take_while(|s| **s >= POOR_BELOW && **s < GOOD_AT_LEAST)
        .count() as u32
}

/// Classifies an "I don't know" style answer: marker substrings over the
/// evaluation's red flags and weaknesses, ≥4 of 6 sub-scores ≤2, or an
/// overall score below 10. The marker list is policy, not code.
fn is_unknown_response(evaluation: &AnswerEvaluation, policy: &ControllerPolicy) -> bool {
    let texts = evaluation
        .analysis
        .red_flags
        .iter()
        .chain(evaluation.analysis.weaknesses.iter());
    for text in texts {
        let lower = text.to_lowercase();
        if policy.unknown_markers.iter().any(|m| lower.contains(m)) {
            return true;
        }
    }

    let low_count = evaluation
        .detailed_scores
        .as_array()
        .iter()
        .filter(|s| **s <= 2)
        .count();
    if low_count >= 4 {
        return true;
    }

    evaluation.score_percent < 10.0
}

// ────────────────────────────────────────────────────────────────────────────
// Execution
// ────────────────────────────────────────────────────────────────────────────

/// Turns a decision into a state patch, generating the follow-up question
/// where the action calls for one.
pub async fn execute_decision(
    state: &InterviewState,
    decision: &Decision,
    model: &dyn ModelClient,
) -> StatePatch {
    info!("Controller decision: {:?} ({})", decision.action, decision.reason);

    let mut patch = match decision.action {
        Action::SkipTopic => skip_topic_patch(state),
        Action::Continue => StatePatch {
            controller_decision: Some(Some(ControllerVerdict::ContinueStandard)),
            ..Default::default()
        },
        Action::DeepenTopic => {
            generated_patch(
                generate_followup(state, model, QuestionType::Deepening).await,
                QuestionType::Deepening,
            )
        }
        Action::SameLevelQuestion => {
            generated_patch(
                generate_followup(state, model, QuestionType::SameLevel).await,
                QuestionType::SameLevel,
            )
        }
        Action::IncreaseDifficulty => {
            generated_patch(
                generate_followup(state, model, QuestionType::Harder).await,
                QuestionType::Harder,
            )
        }
        Action::ProvideHint => {
            generated_patch(
                generate_guided_hint(state, model).await,
                QuestionType::Hint,
            )
        }
    };

    if decision.reset_deepening {
        patch.deepening_questions_count = Some(0);
    }
    if decision.reset_hints {
        patch.hints_given_count = Some(0);
    }
    patch
}

/// Decide + execute in one call, the shape the engine uses.
pub async fn run_controller(
    state: &InterviewState,
    policy: &ControllerPolicy,
    model: &dyn ModelClient,
) -> StatePatch {
    let decision = decide(state, policy);
    execute_decision(state, &decision, model).await
}

fn skip_topic_patch(state: &InterviewState) -> StatePatch {
    info!("Moving on to the next topic");
    StatePatch {
        controller_decision: Some(Some(ControllerVerdict::SkipTopic)),
        current_topic_index: Some(state.current_topic_index + 1),
        questions_in_current_topic: Some(0),
        deepening_questions_count: Some(0),
        hints_given_count: Some(0),
        question_type: Some(None),
        ..Default::default()
    }
}

fn generated_patch(question: Question, question_type: QuestionType) -> StatePatch {
    debug!("Generated question: '{}'", truncate_chars(&question.content, 60));
    StatePatch {
        controller_decision: Some(Some(ControllerVerdict::ContinueTopic)),
        generated_question: Some(Some(question)),
        question_type: Some(Some(question_type)),
        ..Default::default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Question generation
// ────────────────────────────────────────────────────────────────────────────

fn difficulty_phrase(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Harder => "advanced, higher-difficulty",
        QuestionType::Deepening => "detailed, nuance-probing",
        QuestionType::SameLevel => "comparable-difficulty",
        // The hint path goes through the guided reformulation instead.
        QuestionType::Hint | QuestionType::Normal => "comparable-difficulty",
    }
}

fn difficulty_label(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Harder => "harder",
        QuestionType::Deepening => "deepening",
        QuestionType::SameLevel => "same_level",
        QuestionType::Hint => "hint",
        QuestionType::Normal => "normal",
    }
}

async fn generate_followup(
    state: &InterviewState,
    model: &dyn ModelClient,
    question_type: QuestionType,
) -> Question {
    let topic = state.current_topic.as_deref().unwrap_or("Programming");
    let prev_question = state
        .current_question
        .as_ref()
        .map(|q| q.content.as_str())
        .unwrap_or("");
    let last_answer = state.last_candidate_answer.as_deref().unwrap_or("");
    let n = state.questions_asked_count;
    let style = STYLE_ROTATION[n as usize % STYLE_ROTATION.len()];

    let prompt = FOLLOWUP_PROMPT_TEMPLATE
        .replace("{alignment}", ALIGNMENT_POLICY)
        .replace("{difficulty}", difficulty_phrase(question_type))
        .replace("{style}", style)
        .replace("{topic}", topic)
        .replace("{current_question}", prev_question)
        .replace("{last_answer}", truncate_chars(last_answer, 200))
        .replace("{question_number}", &n.to_string());

    let content = match model.invoke(&prompt, ALIGNMENT_POLICY).await {
        Ok(raw) => sanitize_generated(&raw, topic, prev_question)
            .unwrap_or_else(|| followup_fallback(n)),
        Err(e) => {
            warn!("Follow-up generation failed ({e}), using a fallback question");
            followup_fallback(n)
        }
    };

    Question {
        id: format!("llm_{}_{}", difficulty_label(question_type), n),
        content,
        source: QuestionSource::Generated,
    }
}

/// Rephrases the previous question to nudge the candidate toward an
/// unaddressed weakness without naming it explicitly.
async fn generate_guided_hint(state: &InterviewState, model: &dyn ModelClient) -> Question {
    let topic = state.current_topic.as_deref().unwrap_or("Programming");
    let prev_question = state
        .current_question
        .as_ref()
        .map(|q| q.content.as_str())
        .unwrap_or("");
    let last_answer = state.last_candidate_answer.as_deref().unwrap_or("");
    let n = state.questions_asked_count;

    let weaknesses: Vec<&str> = state
        .last_evaluation()
        .map(|e| e.analysis.weaknesses.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let improvement_hint = if weaknesses.is_empty() {
        "the key aspect you have not yet covered concretely".to_string()
    } else {
        weaknesses[..weaknesses.len().min(2)].join(", ")
    };

    let prompt = GUIDED_HINT_PROMPT_TEMPLATE
        .replace("{alignment}", ALIGNMENT_POLICY)
        .replace("{topic}", topic)
        .replace("{prev_question}", prev_question)
        .replace("{last_answer}", truncate_chars(last_answer, 300))
        .replace("{improvement_hint}", &improvement_hint)
        .replace("{question_number}", &n.to_string());

    let content = match model.invoke(&prompt, ALIGNMENT_POLICY).await {
        Ok(raw) => sanitize_generated(&raw, topic, prev_question)
            .unwrap_or_else(|| guided_fallback(weaknesses.first().copied())),
        Err(e) => {
            warn!("Guided hint generation failed ({e}), using the fallback template");
            guided_fallback(weaknesses.first().copied())
        }
    };

    Question {
        id: format!("llm_guided_{n}"),
        content,
        source: QuestionSource::Generated,
    }
}

fn followup_fallback(questions_asked: u32) -> String {
    FOLLOWUP_FALLBACKS[questions_asked as usize % FOLLOWUP_FALLBACKS.len()].to_string()
}

fn guided_fallback(first_weakness: Option<&str>) -> String {
    let base = first_weakness.unwrap_or("the concrete steps and metrics of your approach");
    format!("Could you clarify {base}: how exactly do you do this in practice?")
}

/// Cleans raw model output into a single-line question. Returns `None` when
/// the result is empty, too short, or identical to the previous question —
/// callers substitute their fallback.
fn sanitize_generated(raw: &str, topic: &str, prev_question: &str) -> Option<String> {
    let mut text = raw.replace(['\n', '\r'], " ").trim().to_string();

    // Strip one matching pair of wrapping quotes.
    for (open, close) in [('"', '"'), ('\'', '\'')] {
        if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
            text = text[1..text.len() - 1].trim().to_string();
        }
    }

    // Models love to parrot the topic name back.
    if !topic.is_empty() && text.contains(topic) {
        text = text
            .replace(topic, "")
            .trim_matches(|c: char| matches!(c, ' ' | '-' | ':' | '—'))
            .to_string();
    }

    if text.chars().count() > MAX_GENERATED_CHARS {
        let first_sentence = text.split('.').next().unwrap_or("").trim();
        text = format!("{first_sentence}.");
    }

    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_GENERATED_CHARS || trimmed == prev_question {
        return None;
    }
    Some(trimmed.to_string())
}
