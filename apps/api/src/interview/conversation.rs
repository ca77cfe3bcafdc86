//! Conversation Turn Manager — records an asked question and its answer.
//!
//! The Selector and Controller decide WHAT to ask; this stage records THAT it
//! was asked. It is the only place `questions_asked_count` and
//! `questions_in_current_topic` are incremented, always by exactly 1 per turn.

use tracing::debug;

use crate::interview::state::{
    InterviewState, Question, QuestionSource, QuestionType, Speaker, StatePatch,
    TranscriptMessage,
};

/// Records one turn: the active question (a Controller-generated question
/// wins over the Selector's), the candidate's answer, the counter increments
/// keyed by the question type, and the transcript entries. Clears the
/// transient signaling fields and keeps `last_question_type` for audit.
pub fn record_turn(state: &InterviewState, answer: &str) -> StatePatch {
    debug!("--- Stage: Conversation Turn Manager ---");

    let question = active_question(state);
    let question_type = state.question_type;

    let mut deepening = state.deepening_questions_count;
    let mut hints = state.hints_given_count;
    match question_type {
        Some(QuestionType::Deepening) => deepening += 1,
        Some(QuestionType::Hint) => hints += 1,
        _ => {}
    }

    debug!(
        "Recording turn: asked={} topic={} type={:?}",
        state.questions_asked_count + 1,
        state.questions_in_current_topic + 1,
        question_type
    );

    StatePatch {
        mark_asked: vec![question.id.clone()],
        push_messages: vec![
            TranscriptMessage {
                speaker: Speaker::Interviewer,
                content: question.content.clone(),
            },
            TranscriptMessage {
                speaker: Speaker::Candidate,
                content: answer.to_string(),
            },
        ],
        current_question: Some(question),
        last_candidate_answer: Some(answer.to_string()),
        questions_asked_count: Some(state.questions_asked_count + 1),
        questions_in_current_topic: Some(state.questions_in_current_topic + 1),
        deepening_questions_count: Some(deepening),
        hints_given_count: Some(hints),
        generated_question: Some(None),
        controller_decision: Some(None),
        skip_topic: Some(false),
        question_type: Some(None),
        last_question_type: Some(Some(question_type.unwrap_or(QuestionType::Normal))),
        ..Default::default()
    }
}

/// Prefer the Controller-generated question over the Selector's.
fn active_question(state: &InterviewState) -> Question {
    if let Some(generated) = &state.generated_question {
        if !generated.content.trim().is_empty() {
            debug!("Using the controller-generated question");
            return generated.clone();
        }
    }
    match &state.current_question {
        Some(question) => question.clone(),
        // Should not happen in a well-formed session; keep the turn moving.
        None => Question {
            id: "current_question".to_string(),
            content: "Question not found".to_string(),
            source: QuestionSource::Fallback,
        },
    }
}
