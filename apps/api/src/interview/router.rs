//! Router — pure mapping from controller output + global limits to the next
//! stage. No side effects, no model calls; fully table-testable.

use tracing::{debug, info, warn};

use crate::interview::state::{ControllerVerdict, InterviewState};

/// Defensive cap against runaway loops, independent of the plan's own limit.
pub const HARD_QUESTION_CAP: u32 = 25;

/// The next stage the orchestrator should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Selector,
    ConversationTurn,
    Reporter,
}

/// Routing checks, in order: global cap, topic exhaustion, the circuit
/// breaker, then the controller verdict.
pub fn next_stage(state: &InterviewState) -> Stage {
    let max_total = state.max_total_questions();
    let asked = state.questions_asked_count;

    debug!(
        "Router: asked {}/{}, topic {}/{}, verdict {:?}",
        asked,
        max_total,
        state.current_topic_index,
        state.topics().len(),
        state.controller_decision
    );

    if asked >= max_total {
        info!("Global question cap reached");
        return Stage::Reporter;
    }

    if state.current_topic_index >= state.topics().len() {
        info!("All topics finished");
        return Stage::Reporter;
    }

    if asked >= HARD_QUESTION_CAP {
        warn!("Circuit breaker tripped at {asked} questions, forcing the report");
        return Stage::Reporter;
    }

    match state.controller_decision {
        Some(ControllerVerdict::ContinueTopic) if state.generated_question.is_some() => {
            debug!("Using the controller-generated question");
            Stage::ConversationTurn
        }
        // skip_topic (verdict or flag) and continue_standard all re-enter
        // selection; so does a missing verdict.
        _ => Stage::Selector,
    }
}
