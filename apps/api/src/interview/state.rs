//! Interview State — the single mutable record threaded through every stage.
//!
//! Stages never mutate `InterviewState` directly. Each stage returns a
//! `StatePatch` and the engine merges it with `InterviewState::apply`,
//! preserving the update-by-merge semantics with named, typed fields.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The distinguished topic handled by the Selector's resume-question path.
pub const RESUME_TOPIC: &str = "Resume Discussion";

// ────────────────────────────────────────────────────────────────────────────
// Plan
// ────────────────────────────────────────────────────────────────────────────

/// A named interview subject with its own question quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub description: String,
    pub max_questions: u32,
}

/// Ordered topic sequence plus the global question cap.
/// Created once by the Planner, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewPlan {
    pub topics: Vec<Topic>,
    pub max_total_questions: u32,
    pub interview_style: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Questions
// ────────────────────────────────────────────────────────────────────────────

/// Provenance of a question, surfaced to the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    Retrieval,
    Resume,
    Generated,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub content: String,
    pub source: QuestionSource,
}

/// Difficulty class of the question that was just asked. Drives which
/// counter the Conversation Turn Manager increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Harder,
    Deepening,
    SameLevel,
    Hint,
    Normal,
}

/// Routing verdict left behind by the Adaptive Controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerVerdict {
    ContinueTopic,
    SkipTopic,
    ContinueStandard,
}

// ────────────────────────────────────────────────────────────────────────────
// Evaluations
// ────────────────────────────────────────────────────────────────────────────

/// The six scored criteria, each 0–10.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetailedScores {
    pub technical_accuracy: u8,
    pub depth_of_knowledge: u8,
    pub practical_experience: u8,
    pub communication_clarity: u8,
    pub problem_solving_approach: u8,
    pub examples_and_use_cases: u8,
}

impl DetailedScores {
    pub fn as_array(&self) -> [u8; 6] {
        [
            self.technical_accuracy,
            self.depth_of_knowledge,
            self.practical_experience,
            self.communication_clarity,
            self.problem_solving_approach,
            self.examples_and_use_cases,
        ]
    }
}

/// Free-text findings attached to an evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerAnalysis {
    #[serde(default)]
    pub inconsistencies: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub follow_up_suggestions: Vec<String>,
}

/// One scored answer. Immutable once appended to `answer_evaluations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub topic: String,
    pub score_percent: f64,
    pub detailed_scores: DetailedScores,
    pub analysis: AnswerAnalysis,
    pub question: String,
    pub answer: String,
}

/// Final hire verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Hire,
    Maybe,
    Reject,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Hire => "HIRE",
            Recommendation::Maybe => "MAYBE",
            Recommendation::Reject => "REJECT",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transcript
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub speaker: Speaker,
    pub content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

/// The full interview state for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewState {
    // Immutable inputs
    pub resume: String,
    pub job_description: String,
    pub role: String,

    pub interview_plan: Option<InterviewPlan>,

    /// Cursor into the plan's topic sequence. Monotonically non-decreasing;
    /// advances by exactly 1 on topic skip.
    pub current_topic_index: usize,
    pub current_topic: Option<String>,
    pub current_question: Option<Question>,
    pub last_candidate_answer: Option<String>,

    pub messages: Vec<TranscriptMessage>,

    /// Append-only; never truncated. The Controller reads only the suffix
    /// belonging to the current topic.
    pub answer_evaluations: Vec<AnswerEvaluation>,

    pub questions_asked_count: u32,
    /// Resets to 0 exactly when `current_topic_index` advances.
    pub questions_in_current_topic: u32,
    pub deepening_questions_count: u32,
    pub hints_given_count: u32,

    pub asked_question_ids: HashSet<String>,

    // Transient signaling, cleared after each conversation turn
    pub generated_question: Option<Question>,
    pub controller_decision: Option<ControllerVerdict>,
    pub skip_topic: bool,
    pub question_type: Option<QuestionType>,
    pub last_question_type: Option<QuestionType>,

    // Populated once, at termination
    pub final_recommendation: Option<Recommendation>,
    pub report: Option<String>,
}

impl InterviewState {
    pub fn new(resume: String, job_description: String, role: String) -> Self {
        Self {
            resume,
            job_description,
            role,
            interview_plan: None,
            current_topic_index: 0,
            current_topic: None,
            current_question: None,
            last_candidate_answer: None,
            messages: Vec::new(),
            answer_evaluations: Vec::new(),
            questions_asked_count: 0,
            questions_in_current_topic: 0,
            deepening_questions_count: 0,
            hints_given_count: 0,
            asked_question_ids: HashSet::new(),
            generated_question: None,
            controller_decision: None,
            skip_topic: false,
            question_type: None,
            last_question_type: None,
            final_recommendation: None,
            report: None,
        }
    }

    pub fn topics(&self) -> &[Topic] {
        self.interview_plan
            .as_ref()
            .map(|p| p.topics.as_slice())
            .unwrap_or(&[])
    }

    /// Global question cap from the plan; a defensive default before planning.
    pub fn max_total_questions(&self) -> u32 {
        self.interview_plan
            .as_ref()
            .map(|p| p.max_total_questions)
            .unwrap_or(20)
    }

    /// Quota of the topic under the cursor, if any.
    pub fn current_topic_quota(&self) -> Option<u32> {
        self.topics()
            .get(self.current_topic_index)
            .map(|t| t.max_questions)
    }

    /// Scores of all evaluations recorded for the current topic, oldest first.
    pub fn current_topic_scores(&self) -> Vec<f64> {
        let Some(topic) = self.current_topic.as_deref() else {
            return Vec::new();
        };
        self.answer_evaluations
            .iter()
            .filter(|e| e.topic == topic)
            .map(|e| e.score_percent)
            .collect()
    }

    pub fn last_evaluation(&self) -> Option<&AnswerEvaluation> {
        self.answer_evaluations.last()
    }

    /// Merges a stage's partial update into the state.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(plan) = patch.interview_plan {
            self.interview_plan = Some(plan);
        }
        if let Some(index) = patch.current_topic_index {
            self.current_topic_index = index;
        }
        if let Some(topic) = patch.current_topic {
            self.current_topic = Some(topic);
        }
        if let Some(question) = patch.current_question {
            self.current_question = Some(question);
        }
        if let Some(answer) = patch.last_candidate_answer {
            self.last_candidate_answer = Some(answer);
        }
        if let Some(evaluation) = patch.push_evaluation {
            self.answer_evaluations.push(evaluation);
        }
        if let Some(count) = patch.questions_asked_count {
            self.questions_asked_count = count;
        }
        if let Some(count) = patch.questions_in_current_topic {
            self.questions_in_current_topic = count;
        }
        if let Some(count) = patch.deepening_questions_count {
            self.deepening_questions_count = count;
        }
        if let Some(count) = patch.hints_given_count {
            self.hints_given_count = count;
        }
        for id in patch.mark_asked {
            self.asked_question_ids.insert(id);
        }
        if let Some(generated) = patch.generated_question {
            self.generated_question = generated;
        }
        if let Some(verdict) = patch.controller_decision {
            self.controller_decision = verdict;
        }
        if let Some(skip) = patch.skip_topic {
            self.skip_topic = skip;
        }
        if let Some(qt) = patch.question_type {
            self.question_type = qt;
        }
        if let Some(qt) = patch.last_question_type {
            self.last_question_type = qt;
        }
        self.messages.extend(patch.push_messages);
        if let Some(recommendation) = patch.final_recommendation {
            self.final_recommendation = Some(recommendation);
        }
        if let Some(report) = patch.report {
            self.report = Some(report);
        }
    }
}

/// A stage's partial update.
///
/// `None` means "leave untouched". Transient fields that stages must be able
/// to clear are double-wrapped: the outer `Option` is "touch or not", the
/// inner value is the new content (`None` clears). Append-only collections
/// use dedicated push fields so nothing can truncate them.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub interview_plan: Option<InterviewPlan>,
    pub current_topic_index: Option<usize>,
    pub current_topic: Option<String>,
    pub current_question: Option<Question>,
    pub last_candidate_answer: Option<String>,
    pub push_evaluation: Option<AnswerEvaluation>,
    pub questions_asked_count: Option<u32>,
    pub questions_in_current_topic: Option<u32>,
    pub deepening_questions_count: Option<u32>,
    pub hints_given_count: Option<u32>,
    pub mark_asked: Vec<String>,
    pub generated_question: Option<Option<Question>>,
    pub controller_decision: Option<Option<ControllerVerdict>>,
    pub skip_topic: Option<bool>,
    pub question_type: Option<Option<QuestionType>>,
    pub last_question_type: Option<Option<QuestionType>>,
    pub push_messages: Vec<TranscriptMessage>,
    pub final_recommendation: Option<Recommendation>,
    pub report: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with(topics: &[(&str, u32)]) -> InterviewPlan {
        InterviewPlan {
            topics: topics
                .iter()
                .map(|(name, max)| Topic {
                    name: name.to_string(),
                    description: String::new(),
                    max_questions: *max,
                })
                .collect(),
            max_total_questions: 10,
            interview_style: "conversational".to_string(),
        }
    }

    fn eval_for(topic: &str, score: f64) -> AnswerEvaluation {
        AnswerEvaluation {
            topic: topic.to_string(),
            score_percent: score,
            detailed_scores: DetailedScores {
                technical_accuracy: 5,
                depth_of_knowledge: 5,
                practical_experience: 5,
                communication_clarity: 5,
                problem_solving_approach: 5,
                examples_and_use_cases: 5,
            },
            analysis: AnswerAnalysis::default(),
            question: "Q".to_string(),
            answer: "A".to_string(),
        }
    }

    #[test]
    fn test_apply_untouched_fields_stay() {
        let mut state = InterviewState::new("r".into(), "jd".into(), "role".into());
        state.questions_asked_count = 3;
        state.apply(StatePatch::default());
        assert_eq!(state.questions_asked_count, 3);
        assert!(state.interview_plan.is_none());
    }

    #[test]
    fn test_apply_clears_transients_via_inner_none() {
        let mut state = InterviewState::new("r".into(), "jd".into(), "role".into());
        state.generated_question = Some(Question {
            id: "g1".to_string(),
            content: "generated".to_string(),
            source: QuestionSource::Generated,
        });
        state.question_type = Some(QuestionType::Deepening);

        state.apply(StatePatch {
            generated_question: Some(None),
            question_type: Some(None),
            ..Default::default()
        });

        assert!(state.generated_question.is_none());
        assert!(state.question_type.is_none());
    }

    #[test]
    fn test_apply_push_evaluation_is_append_only() {
        let mut state = InterviewState::new("r".into(), "jd".into(), "role".into());
        state.apply(StatePatch {
            push_evaluation: Some(eval_for("Rust", 50.0)),
            ..Default::default()
        });
        state.apply(StatePatch {
            push_evaluation: Some(eval_for("Rust", 70.0)),
            ..Default::default()
        });
        assert_eq!(state.answer_evaluations.len(), 2);
        assert_eq!(state.answer_evaluations[0].score_percent, 50.0);
    }

    #[test]
    fn test_current_topic_scores_filters_by_topic() {
        let mut state = InterviewState::new("r".into(), "jd".into(), "role".into());
        state.current_topic = Some("Rust".to_string());
        state.answer_evaluations.push(eval_for("Python", 90.0));
        state.answer_evaluations.push(eval_for("Rust", 30.0));
        state.answer_evaluations.push(eval_for("Rust", 40.0));
        assert_eq!(state.current_topic_scores(), vec![30.0, 40.0]);
    }

    #[test]
    fn test_mark_asked_accumulates() {
        let mut state = InterviewState::new("r".into(), "jd".into(), "role".into());
        state.apply(StatePatch {
            mark_asked: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        });
        state.apply(StatePatch {
            mark_asked: vec!["a".to_string()],
            ..Default::default()
        });
        assert_eq!(state.asked_question_ids.len(), 2);
    }

    #[test]
    fn test_max_total_questions_defaults_without_plan() {
        let state = InterviewState::new("r".into(), "jd".into(), "role".into());
        assert_eq!(state.max_total_questions(), 20);
    }

    #[test]
    fn test_current_topic_quota_tracks_cursor() {
        let mut state = InterviewState::new("r".into(), "jd".into(), "role".into());
        state.interview_plan = Some(plan_with(&[("A", 2), ("B", 3)]));
        assert_eq!(state.current_topic_quota(), Some(2));
        state.current_topic_index = 1;
        assert_eq!(state.current_topic_quota(), Some(3));
        state.current_topic_index = 2;
        assert_eq!(state.current_topic_quota(), None);
    }

    #[test]
    fn test_recommendation_labels() {
        assert_eq!(Recommendation::Hire.as_str(), "HIRE");
        assert_eq!(Recommendation::Maybe.as_str(), "MAYBE");
        assert_eq!(Recommendation::Reject.as_str(), "REJECT");
    }
}
