//! Selector — picks the next question for the current topic.
//!
//! Decides WHAT to ask; recording that it was asked (and every counter
//! increment) belongs to the Conversation Turn Manager. The selection ladder:
//! terminal checks, topic-quota skip, the resume-question path, the retrieval
//! path, and finally the neutral fallback pool. The pool guarantees the
//! interview never stalls for lack of a question.

use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::interview::prompts::{truncate_chars, RESUME_QUESTION_PROMPT_TEMPLATE};
use crate::interview::state::{
    InterviewState, Question, QuestionSource, StatePatch, RESUME_TOPIC,
};
use crate::llm_client::prompts::ALIGNMENT_POLICY;
use crate::llm_client::ModelClient;
use crate::retrieval::{QuestionRetriever, RetrievedQuestion};

/// How many candidate documents the retrieval path asks for.
const RETRIEVAL_CANDIDATES: usize = 5;
/// Retrieved question texts at or under this length are rejected as junk.
const MIN_QUESTION_CHARS: usize = 15;

/// Role markers that get the portfolio-flavored canned resume question.
const DESIGN_ROLE_MARKERS: &[&str] = &[
    "ux/ui designer",
    "ux designer",
    "ui/ux designer",
    "designer",
    "ux",
    "ui",
];

/// Neutral questions used when retrieval yields nothing usable.
const NEUTRAL_POOL: &[&str] = &[
    "Tell me about your most recent task: the context, the goal, what you did, and the outcome.",
    "How do you verify the correctness and quality of your work?",
    "Describe your typical approach to breaking down requirements before starting a task.",
    "Give an example of a time you improved a process or reduced the time a piece of work took.",
    "How do you choose tools and approaches for a task, and how do you judge their effectiveness?",
];

/// Outcome of the selection stage.
#[derive(Debug)]
pub enum Selection {
    /// Global cap reached or all topics exhausted: the interview is over.
    Completed,
    /// Topic quota reached: advance the cursor and reset topic counters.
    SkipTopic(StatePatch),
    /// A question was chosen.
    Question(StatePatch),
}

pub async fn select_next_question(
    state: &InterviewState,
    retriever: &dyn QuestionRetriever,
    model: &dyn ModelClient,
    rng: &mut (dyn RngCore + Send),
) -> Selection {
    debug!("--- Stage: Selector ---");

    let max_total = state.max_total_questions();
    if state.questions_asked_count >= max_total {
        info!("Global question cap reached: {max_total}");
        return Selection::Completed;
    }

    let topics = state.topics();
    if state.current_topic_index >= topics.len() {
        info!(
            "All topics finished: {}/{}",
            state.current_topic_index,
            topics.len()
        );
        return Selection::Completed;
    }

    let topic = &topics[state.current_topic_index];
    debug!(
        "Topic '{}': {}/{} questions asked",
        topic.name, state.questions_in_current_topic, topic.max_questions
    );

    if state.questions_in_current_topic >= topic.max_questions {
        info!("Topic question quota reached for '{}'", topic.name);
        return Selection::SkipTopic(skip_topic_patch(state.current_topic_index));
    }

    if topic.name == RESUME_TOPIC {
        return Selection::Question(resume_question(state, model, &topic.name).await);
    }

    let candidates = retriever
        .search(&topic.name, RETRIEVAL_CANDIDATES)
        .await;
    debug!("Found {} candidate questions", candidates.len());

    match pick_retrieved(state, &candidates, rng) {
        Some(question) => {
            info!("Selected question: '{}'", preview(&question.content));
            Selection::Question(question_patch(&topic.name, question))
        }
        None => {
            warn!("Retrieval produced nothing usable, falling back to the neutral pool");
            Selection::Question(neutral_fallback(state, &topic.name))
        }
    }
}

fn skip_topic_patch(current_index: usize) -> StatePatch {
    StatePatch {
        skip_topic: Some(true),
        current_topic_index: Some(current_index + 1),
        questions_in_current_topic: Some(0),
        deepening_questions_count: Some(0),
        hints_given_count: Some(0),
        ..Default::default()
    }
}

fn question_patch(topic: &str, question: Question) -> StatePatch {
    StatePatch {
        current_topic: Some(topic.to_string()),
        mark_asked: vec![question.id.clone()],
        current_question: Some(question),
        ..Default::default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resume-question path
// ────────────────────────────────────────────────────────────────────────────

/// One model call tailored to resume + JD + role. Always returns exactly one
/// question; the canned substitute keeps the opening moving on model failure.
async fn resume_question(
    state: &InterviewState,
    model: &dyn ModelClient,
    topic: &str,
) -> StatePatch {
    let prompt = RESUME_QUESTION_PROMPT_TEMPLATE
        .replace("{alignment}", ALIGNMENT_POLICY)
        .replace("{role}", &state.role)
        .replace("{resume}", truncate_chars(&state.resume, 600))
        .replace(
            "{job_description}",
            truncate_chars(&state.job_description, 600),
        )
        .replace(
            "{q_index}",
            &(state.questions_in_current_topic + 1).to_string(),
        );

    match model.invoke(&prompt, ALIGNMENT_POLICY).await {
        Ok(raw) if !raw.trim().is_empty() => {
            let content = raw.trim().to_string();
            let id = unique_resume_id(state);
            info!("Resume question (LLM): '{}'", preview(&content));
            question_patch(
                topic,
                Question {
                    id,
                    content,
                    source: QuestionSource::Resume,
                },
            )
        }
        other => {
            if let Err(e) = other {
                warn!("Resume question generation failed: {e}");
            } else {
                warn!("Resume question generation returned empty text");
            }
            let content = if is_design_role(&state.role) {
                "Briefly describe one project from your portfolio: the goal, the process, \
                 your role, and the result."
            } else {
                "Tell me about the most significant project on your resume and your role in it."
            };
            question_patch(
                topic,
                Question {
                    id: format!("resume_q_{}", state.questions_in_current_topic),
                    content: content.to_string(),
                    source: QuestionSource::Fallback,
                },
            )
        }
    }
}

/// `resume_q_{n}`, suffixed until it does not collide with an asked id.
fn unique_resume_id(state: &InterviewState) -> String {
    let base = format!("resume_q_{}", state.questions_in_current_topic);
    if !state.asked_question_ids.contains(&base) {
        return base;
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !state.asked_question_ids.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn is_design_role(role: &str) -> bool {
    let role = role.trim().to_lowercase();
    DESIGN_ROLE_MARKERS.iter().any(|m| *m == role)
}

// ────────────────────────────────────────────────────────────────────────────
// Retrieval path
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Candidate {
    id: String,
    content: String,
}

/// Normalizes raw hits, filters already-asked ids (unless that would starve
/// the selection), and picks uniformly at random. Returns `None` when nothing
/// usable survives, which sends the caller to the neutral pool.
fn pick_retrieved(
    state: &InterviewState,
    raw: &[RetrievedQuestion],
    rng: &mut (dyn RngCore + Send),
) -> Option<Question> {
    let normalized: Vec<Candidate> = raw.iter().filter_map(normalize_candidate).collect();
    if normalized.is_empty() {
        return None;
    }

    let filtered: Vec<&Candidate> = normalized
        .iter()
        .filter(|c| !state.asked_question_ids.contains(&c.id))
        .collect();

    let pool: Vec<&Candidate> = if filtered.is_empty() {
        warn!("Every candidate was already asked, allowing repeats");
        normalized.iter().collect()
    } else {
        filtered
    };

    let chosen = pool.choose(rng)?;
    if chosen.content.trim().chars().count() <= MIN_QUESTION_CHARS {
        return None;
    }

    Some(Question {
        id: chosen.id.clone(),
        content: chosen.content.clone(),
        source: QuestionSource::Retrieval,
    })
}

/// Reads a `{id, content}` pair out of a retrieval hit: the metadata
/// `question` field when present, else the raw content with a leading
/// `Question:` label stripped.
fn normalize_candidate(hit: &RetrievedQuestion) -> Option<Candidate> {
    if let Some(question) = hit.metadata.question.as_deref() {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        return Some(Candidate {
            id: question.to_string(),
            content: question.to_string(),
        });
    }

    let content = hit.content.trim();
    if content.is_empty() {
        return None;
    }
    let content = match content.split_once("Question:") {
        Some((_, rest)) => rest.lines().next().unwrap_or("").trim().to_string(),
        None => content.to_string(),
    };
    if content.is_empty() {
        return None;
    }
    let id = truncate_chars(&content, 50).to_string();
    Some(Candidate { id, content })
}

// ────────────────────────────────────────────────────────────────────────────
// Neutral fallback pool
// ────────────────────────────────────────────────────────────────────────────

/// First pool entry whose text has not been asked yet; the last entry when
/// the whole pool is exhausted. The asked-set records the text itself so the
/// pool rotates across calls.
fn neutral_fallback(state: &InterviewState, topic: &str) -> StatePatch {
    let content = NEUTRAL_POOL
        .iter()
        .find(|q| !state.asked_question_ids.contains(**q))
        .copied()
        .unwrap_or_else(|| NEUTRAL_POOL[NEUTRAL_POOL.len() - 1]);

    StatePatch {
        current_topic: Some(topic.to_string()),
        mark_asked: vec![content.to_string()],
        current_question: Some(Question {
            id: format!("fallback_{}", state.current_topic_index),
            content: content.to_string(),
            source: QuestionSource::Fallback,
        }),
        ..Default::default()
    }
}

fn preview(text: &str) -> &str {
    truncate_chars(text, 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::state::{InterviewPlan, Topic};
    use crate::llm_client::testing::{FailingModel, ScriptedModel};
    use crate::retrieval::RetrievedMetadata;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct StaticRetriever(Vec<RetrievedQuestion>);

    #[async_trait]
    impl QuestionRetriever for StaticRetriever {
        async fn search(&self, _topic: &str, count: usize) -> Vec<RetrievedQuestion> {
            self.0.iter().take(count).cloned().collect()
        }

        async fn add_documents(&self, _chunks: Vec<crate::retrieval::KnowledgeChunk>) {}
    }

    fn hit(question: &str) -> RetrievedQuestion {
        RetrievedQuestion {
            content: format!("Section: X\nQuestion: {question}"),
            metadata: RetrievedMetadata {
                question: Some(question.to_string()),
                section: Some("X".to_string()),
            },
            distance: Some(0.1),
        }
    }

    fn state_with_topics(topics: &[(&str, u32)]) -> InterviewState {
        let mut state = InterviewState::new(
            "Python developer, 3 years".to_string(),
            "Backend Python role".to_string(),
            "Backend Developer".to_string(),
        );
        state.interview_plan = Some(InterviewPlan {
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
        });
        state
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[tokio::test]
    async fn test_global_cap_completes() {
        let mut state = state_with_topics(&[("Rust", 2)]);
        state.questions_asked_count = 10;
        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &FailingModel,
            &mut rng(),
        )
        .await;
        assert!(matches!(selection, Selection::Completed));
    }

    #[tokio::test]
    async fn test_exhausted_topics_completes() {
        let mut state = state_with_topics(&[("Rust", 2)]);
        state.current_topic_index = 1;
        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &FailingModel,
            &mut rng(),
        )
        .await;
        assert!(matches!(selection, Selection::Completed));
    }

    #[tokio::test]
    async fn test_topic_quota_skips_and_resets() {
        let mut state = state_with_topics(&[("Rust", 2), ("Tokio", 2)]);
        state.current_topic = Some("Rust".to_string());
        state.questions_in_current_topic = 2;
        state.deepening_questions_count = 1;
        state.hints_given_count = 1;

        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &FailingModel,
            &mut rng(),
        )
        .await;

        let Selection::SkipTopic(patch) = selection else {
            panic!("expected SkipTopic");
        };
        assert_eq!(patch.current_topic_index, Some(1));
        assert_eq!(patch.questions_in_current_topic, Some(0));
        assert_eq!(patch.deepening_questions_count, Some(0));
        assert_eq!(patch.hints_given_count, Some(0));
        assert_eq!(patch.skip_topic, Some(true));
    }

    #[tokio::test]
    async fn test_resume_topic_uses_model() {
        let state = state_with_topics(&[(RESUME_TOPIC, 2)]);
        let model = ScriptedModel::new(["What drew you to backend work on your last project?"]);
        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &model,
            &mut rng(),
        )
        .await;

        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        let q = patch.current_question.unwrap();
        assert_eq!(q.source, QuestionSource::Resume);
        assert_eq!(q.id, "resume_q_0");
        assert!(patch.mark_asked.contains(&"resume_q_0".to_string()));
    }

    #[tokio::test]
    async fn test_resume_fallback_generic_role() {
        let state = state_with_topics(&[(RESUME_TOPIC, 2)]);
        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &FailingModel,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        let q = patch.current_question.unwrap();
        assert!(q.content.contains("most significant project"));
        assert_eq!(q.source, QuestionSource::Fallback);
    }

    #[tokio::test]
    async fn test_resume_fallback_design_role() {
        let mut state = state_with_topics(&[(RESUME_TOPIC, 2)]);
        state.role = "UX Designer".to_string();
        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &FailingModel,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        assert!(patch
            .current_question
            .unwrap()
            .content
            .contains("portfolio"));
    }

    #[tokio::test]
    async fn test_resume_id_disambiguates_on_collision() {
        let mut state = state_with_topics(&[(RESUME_TOPIC, 3)]);
        state.asked_question_ids.insert("resume_q_0".to_string());
        let model = ScriptedModel::new(["Another opening question about your experience?"]);
        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &model,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        assert_eq!(patch.current_question.unwrap().id, "resume_q_0_1");
    }

    #[tokio::test]
    async fn test_retrieval_question_selected_and_marked() {
        let state = state_with_topics(&[("Rust", 2)]);
        let retriever = StaticRetriever(vec![
            hit("How does ownership interact with borrowing in Rust?"),
            hit("Explain the difference between Box and Rc."),
        ]);
        let selection = select_next_question(
            &state,
            &retriever,
            &FailingModel,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        let q = patch.current_question.unwrap();
        assert_eq!(q.source, QuestionSource::Retrieval);
        assert!(patch.mark_asked.contains(&q.id));
    }

    #[tokio::test]
    async fn test_asked_candidates_are_filtered() {
        let mut state = state_with_topics(&[("Rust", 2)]);
        let asked = "How does ownership interact with borrowing in Rust?";
        state.asked_question_ids.insert(asked.to_string());
        let retriever = StaticRetriever(vec![
            hit(asked),
            hit("Explain the difference between Box and Rc in practice."),
        ]);

        // With the asked question filtered, only one candidate remains.
        let selection = select_next_question(
            &state,
            &retriever,
            &FailingModel,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        assert!(patch
            .current_question
            .unwrap()
            .content
            .contains("Box and Rc"));
    }

    #[tokio::test]
    async fn test_starvation_fallback_allows_repeats() {
        let mut state = state_with_topics(&[("Rust", 2)]);
        let only = "How does ownership interact with borrowing in Rust?";
        state.asked_question_ids.insert(only.to_string());
        let retriever = StaticRetriever(vec![hit(only)]);

        let selection = select_next_question(
            &state,
            &retriever,
            &FailingModel,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        // Still a non-empty question even though everything was asked before.
        assert_eq!(patch.current_question.unwrap().content, only);
    }

    #[tokio::test]
    async fn test_short_candidate_falls_back_to_neutral_pool() {
        let state = state_with_topics(&[("Rust", 2)]);
        let retriever = StaticRetriever(vec![hit("Why Rust?")]);
        let selection = select_next_question(
            &state,
            &retriever,
            &FailingModel,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        let q = patch.current_question.unwrap();
        assert_eq!(q.source, QuestionSource::Fallback);
        assert_eq!(q.content, NEUTRAL_POOL[0]);
    }

    #[tokio::test]
    async fn test_neutral_pool_rotates_then_repeats_last() {
        let mut state = state_with_topics(&[("Rust", 10)]);
        for q in NEUTRAL_POOL {
            state.asked_question_ids.insert(q.to_string());
        }
        let selection = select_next_question(
            &state,
            &StaticRetriever(vec![]),
            &FailingModel,
            &mut rng(),
        )
        .await;
        let Selection::Question(patch) = selection else {
            panic!("expected Question");
        };
        assert_eq!(
            patch.current_question.unwrap().content,
            NEUTRAL_POOL[NEUTRAL_POOL.len() - 1]
        );
    }

    #[test]
    fn test_normalize_candidate_strips_question_label() {
        let hit = RetrievedQuestion {
            content: "Section: Rust\nQuestion: What is a lifetime?\nextra".to_string(),
            metadata: RetrievedMetadata::default(),
            distance: None,
        };
        let c = normalize_candidate(&hit).unwrap();
        assert_eq!(c.content, "What is a lifetime?");
        assert_eq!(c.id, "What is a lifetime?");
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let state = state_with_topics(&[("Rust", 2)]);
        let hits = vec![
            hit("How does ownership interact with borrowing in Rust?"),
            hit("Explain the difference between Box and Rc in practice."),
            hit("When would you reach for unsafe code and why?"),
        ];
        let first = pick_retrieved(&state, &hits, &mut rng()).unwrap();
        let second = pick_retrieved(&state, &hits, &mut rng()).unwrap();
        assert_eq!(first.id, second.id);
    }
}
