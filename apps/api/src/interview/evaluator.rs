//! Evaluator — scores a single answer against six weighted criteria.
//!
//! One model call per answer, prompted for strict JSON. Sub-scores clamp to
//! [0, 10]; the final percentage is the fixed weighted sum. Any model or
//! parse failure substitutes a low-confidence fallback evaluation so the
//! interview always progresses.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::interview::prompts::{EVALUATION_PROMPT_TEMPLATE, EVALUATION_SYSTEM};
use crate::interview::state::{
    AnswerAnalysis, AnswerEvaluation, DetailedScores, InterviewState, StatePatch,
};
use crate::llm_client::prompts::ALIGNMENT_POLICY;
use crate::llm_client::{parse_llm_json, ModelClient};

/// Criterion weights: technical, depth, practical, communication,
/// problem-solving, examples. Sum to 1.0.
const WEIGHTS: [f64; 6] = [0.25, 0.20, 0.20, 0.15, 0.10, 0.10];

/// Sub-scores of the fallback evaluation used on model/parse failure.
const FALLBACK_SCORES: DetailedScores = DetailedScores {
    technical_accuracy: 3,
    depth_of_knowledge: 3,
    practical_experience: 2,
    communication_clarity: 4,
    problem_solving_approach: 3,
    examples_and_use_cases: 2,
};

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(default = "default_mid")]
    technical_accuracy: i64,
    #[serde(default = "default_mid")]
    depth_of_knowledge: i64,
    #[serde(default = "default_mid")]
    practical_experience: i64,
    #[serde(default = "default_mid")]
    communication_clarity: i64,
    #[serde(default = "default_mid")]
    problem_solving_approach: i64,
    #[serde(default = "default_mid")]
    examples_and_use_cases: i64,
    #[serde(default)]
    inconsistencies: Vec<String>,
    #[serde(default)]
    red_flags: Vec<String>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    follow_up_suggestions: Vec<String>,
}

fn default_mid() -> i64 {
    5
}

/// Runs the evaluation stage: always appends exactly one evaluation record.
pub async fn evaluate_answer(state: &InterviewState, model: &dyn ModelClient) -> StatePatch {
    debug!("--- Stage: Evaluator ---");

    let question = state
        .current_question
        .as_ref()
        .map(|q| q.content.clone())
        .unwrap_or_default();
    let answer = state.last_candidate_answer.clone().unwrap_or_default();
    let topic = state
        .current_topic
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());

    let prompt = EVALUATION_PROMPT_TEMPLATE
        .replace("{alignment}", ALIGNMENT_POLICY)
        .replace("{role}", &state.role)
        .replace("{topic}", &topic)
        .replace("{question}", &question)
        .replace("{answer}", &answer);

    let raw = match model.invoke(&prompt, EVALUATION_SYSTEM).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Evaluator model call failed ({e}), using fallback evaluation");
            return push(fallback_evaluation(topic, question, answer));
        }
    };

    let parsed: RawEvaluation = match parse_llm_json(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Evaluator JSON parse failed ({e}), using fallback evaluation");
            return push(fallback_evaluation(topic, question, answer));
        }
    };

    let detailed = DetailedScores {
        technical_accuracy: clamp_score(parsed.technical_accuracy),
        depth_of_knowledge: clamp_score(parsed.depth_of_knowledge),
        practical_experience: clamp_score(parsed.practical_experience),
        communication_clarity: clamp_score(parsed.communication_clarity),
        problem_solving_approach: clamp_score(parsed.problem_solving_approach),
        examples_and_use_cases: clamp_score(parsed.examples_and_use_cases),
    };
    let score_percent = weighted_percent(&detailed);

    info!("Answer on '{}' scored {:.1}%", topic, score_percent);

    push(AnswerEvaluation {
        topic,
        score_percent,
        detailed_scores: detailed,
        analysis: AnswerAnalysis {
            inconsistencies: parsed.inconsistencies,
            red_flags: parsed.red_flags,
            strengths: parsed.strengths,
            weaknesses: parsed.weaknesses,
            follow_up_suggestions: parsed.follow_up_suggestions,
        },
        question,
        answer,
    })
}

fn push(evaluation: AnswerEvaluation) -> StatePatch {
    StatePatch {
        push_evaluation: Some(evaluation),
        ..Default::default()
    }
}

fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 10) as u8
}

/// `Σ(sub_i × 10 × w_i)` over the six criteria, yielding 0–100.
pub fn weighted_percent(scores: &DetailedScores) -> f64 {
    scores
        .as_array()
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(s, w)| f64::from(*s) * 10.0 * w)
        .sum()
}

/// The deterministic low-confidence evaluation used on any failure.
pub fn fallback_evaluation(topic: String, question: String, answer: String) -> AnswerEvaluation {
    let score_percent = weighted_percent(&FALLBACK_SCORES);
    info!("Fallback evaluation for '{}': {:.1}%", topic, score_percent);
    AnswerEvaluation {
        topic,
        score_percent,
        detailed_scores: FALLBACK_SCORES,
        analysis: AnswerAnalysis {
            inconsistencies: vec![],
            red_flags: vec![],
            strengths: vec!["Participated in the interview".to_string()],
            weaknesses: vec!["Needs additional assessment".to_string()],
            follow_up_suggestions: vec![],
        },
        question,
        answer,
    }
}
