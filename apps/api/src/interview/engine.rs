//! Engine — the per-session orchestrator.
//!
//! Drives Planner → Selector → Conversation Turn → Evaluator → Controller →
//! Router through the step-driven session API: `create_session`, `advance`,
//! `submit_answer`. All stage execution for a session runs under the
//! session's own lock; a hard step ceiling guarantees termination even if
//! routing were to cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ControllerPolicy, InterviewLimits};
use crate::errors::AppError;
use crate::interview::router::{next_stage, Stage};
use crate::interview::selector::{select_next_question, Selection};
use crate::interview::state::{
    InterviewState, Question, QuestionSource, Recommendation,
};
use crate::interview::{conversation, controller, evaluator, planner, reporter};
use crate::llm_client::{ModelClient, TimeoutModel};
use crate::retrieval::{InMemoryQuestionIndex, KnowledgeChunk, QuestionRetriever};
use crate::session::{Session, SessionInner, SessionStep, SessionStore};

/// Ceiling on orchestration steps per API call. The Router's own caps fire
/// long before this; it exists so no routing bug can loop forever.
const MAX_ENGINE_STEPS: usize = 50;

// ────────────────────────────────────────────────────────────────────────────
// API-facing output types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    WaitingForAnswer,
    Completed,
}

/// Counter snapshot reported with every turn.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub questions_asked: u32,
    pub questions_in_current_topic: u32,
    pub deepening_questions_count: u32,
    pub hints_given_count: u32,
    pub total_topics: usize,
}

/// Result of `advance` / `submit_answer`.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutput {
    pub interview_id: Uuid,
    pub status: TurnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_source: Option<QuestionSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

/// Result of the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub interview_id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_topic: Option<String>,
    pub questions_asked: u32,
    pub questions_in_current_topic: u32,
    pub deepening_questions_count: u32,
    pub hints_given_count: u32,
    pub total_topics: usize,
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct InterviewEngine {
    model: Arc<dyn ModelClient>,
    retriever: Arc<dyn QuestionRetriever>,
    pub store: SessionStore,
    limits: InterviewLimits,
    policy: ControllerPolicy,
    rng: Mutex<StdRng>,
}

impl InterviewEngine {
    /// `model` is wrapped in a `TimeoutModel` so every stage call is bounded;
    /// a timeout degrades into the stage's documented fallback, never an
    /// interview-ending error. `rng` is injected for deterministic tests.
    pub fn new(
        model: Arc<dyn ModelClient>,
        model_timeout: Duration,
        retriever: Arc<dyn QuestionRetriever>,
        limits: InterviewLimits,
        policy: ControllerPolicy,
        session_ttl_minutes: i64,
        rng: StdRng,
    ) -> Self {
        Self {
            model: Arc::new(TimeoutModel::new(model, model_timeout)),
            retriever,
            store: SessionStore::new(session_ttl_minutes),
            limits,
            policy,
            rng: Mutex::new(rng),
        }
    }

    /// Creates a session. A non-empty `knowledge` override builds a private
    /// question index for this session; otherwise the shared index is used.
    pub async fn create_session(
        &self,
        resume: String,
        job_description: String,
        role: String,
        knowledge: Option<Vec<KnowledgeChunk>>,
    ) -> Result<Uuid, AppError> {
        if resume.trim().is_empty() {
            return Err(AppError::Validation("resume must not be empty".to_string()));
        }
        if job_description.trim().is_empty() {
            return Err(AppError::Validation(
                "job_description must not be empty".to_string(),
            ));
        }

        let retriever: Arc<dyn QuestionRetriever> = match knowledge {
            Some(chunks) if !chunks.is_empty() => {
                let index = InMemoryQuestionIndex::new();
                index.add_documents(chunks).await;
                Arc::new(index)
            }
            _ => self.retriever.clone(),
        };

        let session = Arc::new(Session::new(
            InterviewState::new(resume, job_description, role),
            retriever,
        ));
        let id = session.id;
        self.store.put(session);
        info!("Interview session {id} created");
        Ok(id)
    }

    /// Steps the session forward until it needs an answer or completes.
    /// Idempotent while a question is pending.
    pub async fn advance(&self, id: Uuid) -> Result<TurnOutput, AppError> {
        let session = self.get_session(&id)?;
        session.touch();
        let mut inner = session.inner.lock().await;

        match inner.step {
            SessionStep::Planner => {
                let patch =
                    planner::plan_interview(&inner.state, self.model.as_ref(), &self.limits).await;
                inner.state.apply(patch);
                self.run_selection(&mut inner, session.retriever.as_ref(), id)
                    .await
            }
            SessionStep::WaitingForAnswer => Ok(waiting_output(&inner.state, id)),
            SessionStep::Completed => Ok(completed_output(&inner.state, id)),
        }
    }

    /// Records the candidate's answer and runs evaluation, the controller,
    /// and routing. Returns the next question or the final report.
    pub async fn submit_answer(&self, id: Uuid, answer: &str) -> Result<TurnOutput, AppError> {
        let session = self.get_session(&id)?;
        session.touch();
        let mut inner = session.inner.lock().await;

        if inner.step != SessionStep::WaitingForAnswer {
            return Err(AppError::InvalidState(format!(
                "session {id} is not waiting for an answer"
            )));
        }

        let turn = conversation::record_turn(&inner.state, answer);
        inner.state.apply(turn);

        let evaluation = evaluator::evaluate_answer(&inner.state, self.model.as_ref()).await;
        inner.state.apply(evaluation);

        let verdict =
            controller::run_controller(&inner.state, &self.policy, self.model.as_ref()).await;
        inner.state.apply(verdict);

        match next_stage(&inner.state) {
            Stage::Reporter => Ok(self.finish(&mut inner, id).await),
            // The controller generated a follow-up; present it and wait.
            Stage::ConversationTurn => Ok(waiting_output(&inner.state, id)),
            Stage::Selector => {
                self.run_selection(&mut inner, session.retriever.as_ref(), id)
                    .await
            }
        }
    }

    /// Progress snapshot without touching the interview flow.
    pub async fn status(&self, id: Uuid) -> Result<SessionStatus, AppError> {
        let session = self.get_session(&id)?;
        let inner = session.inner.lock().await;
        let state = &inner.state;

        let max_total = state.max_total_questions();
        let progress_percent = if max_total > 0 {
            f64::from(state.questions_asked_count) / f64::from(max_total) * 100.0
        } else {
            0.0
        };

        Ok(SessionStatus {
            interview_id: id,
            status: inner.step.as_str(),
            current_topic: state.current_topic.clone(),
            questions_asked: state.questions_asked_count,
            questions_in_current_topic: state.questions_in_current_topic,
            deepening_questions_count: state.deepening_questions_count,
            hints_given_count: state.hints_given_count,
            total_topics: state.topics().len(),
            progress_percent,
            created_at: session.created_at,
        })
    }

    /// Explicit teardown of a session.
    pub fn delete_session(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.delete(&id) {
            info!("Interview session {id} deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Interview {id} not found")))
        }
    }

    fn get_session(&self, id: &Uuid) -> Result<Arc<Session>, AppError> {
        self.store
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))
    }

    /// Re-enters the Selector until it yields a question or terminates,
    /// bounded by the step ceiling.
    async fn run_selection(
        &self,
        inner: &mut SessionInner,
        retriever: &dyn QuestionRetriever,
        id: Uuid,
    ) -> Result<TurnOutput, AppError> {
        for _ in 0..MAX_ENGINE_STEPS {
            let selection = {
                let mut rng = self.rng.lock().await;
                select_next_question(&inner.state, retriever, self.model.as_ref(), &mut *rng).await
            };
            match selection {
                Selection::Completed => return Ok(self.finish(inner, id).await),
                Selection::SkipTopic(patch) => inner.state.apply(patch),
                Selection::Question(patch) => {
                    inner.state.apply(patch);
                    inner.step = SessionStep::WaitingForAnswer;
                    return Ok(waiting_output(&inner.state, id));
                }
            }
        }

        warn!("Engine step ceiling reached during selection, forcing the report");
        Ok(self.finish(inner, id).await)
    }

    async fn finish(&self, inner: &mut SessionInner, id: Uuid) -> TurnOutput {
        let patch = reporter::generate_report(&inner.state, self.model.as_ref()).await;
        inner.state.apply(patch);
        inner.step = SessionStep::Completed;
        info!("Interview session {id} completed");
        completed_output(&inner.state, id)
    }
}

/// The question the candidate should see next: a controller-generated
/// follow-up wins over the selector's pick, mirroring the turn manager.
fn pending_question(state: &InterviewState) -> Option<&Question> {
    state
        .generated_question
        .as_ref()
        .or(state.current_question.as_ref())
}

fn progress(state: &InterviewState) -> Progress {
    Progress {
        questions_asked: state.questions_asked_count,
        questions_in_current_topic: state.questions_in_current_topic,
        deepening_questions_count: state.deepening_questions_count,
        hints_given_count: state.hints_given_count,
        total_topics: state.topics().len(),
    }
}

fn waiting_output(state: &InterviewState, id: Uuid) -> TurnOutput {
    let question = pending_question(state);
    TurnOutput {
        interview_id: id,
        status: TurnStatus::WaitingForAnswer,
        question: question.map(|q| q.content.clone()),
        question_source: question.map(|q| q.source),
        topic: state.current_topic.clone(),
        progress: progress(state),
        report: None,
        recommendation: None,
    }
}

fn completed_output(state: &InterviewState, id: Uuid) -> TurnOutput {
    TurnOutput {
        interview_id: id,
        status: TurnStatus::Completed,
        question: None,
        question_source: None,
        topic: state.current_topic.clone(),
        progress: progress(state),
        report: state.report.clone(),
        recommendation: state.final_recommendation,
    }
}
