//! Planner — produces the topic plan from resume + job description.
//!
//! One model call, defensively parsed. Any failure (transport, timeout,
//! malformed JSON, missing topics) degrades to a fixed neutral 8-topic plan;
//! the interview never starts without a plan.

use tracing::{debug, info, warn};

use crate::config::InterviewLimits;
use crate::interview::prompts::{truncate_chars, PLANNING_PROMPT_TEMPLATE, PLANNING_SYSTEM};
use crate::interview::state::{InterviewPlan, InterviewState, StatePatch, Topic};
use crate::llm_client::prompts::ALIGNMENT_POLICY;
use crate::llm_client::{parse_llm_json, ModelClient};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawPlan {
    topics: Vec<RawTopic>,
    #[serde(default)]
    interview_style: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    name: String,
    #[serde(default)]
    description: String,
}

/// Runs the planning stage. Always returns a patch carrying a plan with at
/// least one topic; every topic is stamped with the per-topic quota and the
/// plan with the global cap, regardless of which path produced it.
pub async fn plan_interview(
    state: &InterviewState,
    model: &dyn ModelClient,
    limits: &InterviewLimits,
) -> StatePatch {
    debug!("--- Stage: Planner ---");

    let prompt = PLANNING_PROMPT_TEMPLATE
        .replace("{alignment}", ALIGNMENT_POLICY)
        .replace("{role}", truncate_chars(&state.role, 100))
        .replace("{resume}", truncate_chars(&state.resume, 400))
        .replace(
            "{job_description}",
            truncate_chars(&state.job_description, 400),
        );

    let plan = match model.invoke(&prompt, PLANNING_SYSTEM).await {
        Ok(raw) => match parse_plan(&raw, limits) {
            Ok(plan) => {
                info!("Plan created: {} topics", plan.topics.len());
                plan
            }
            Err(reason) => {
                warn!("Planner output unusable ({reason}), using the neutral fallback plan");
                fallback_plan(limits)
            }
        },
        Err(e) => {
            warn!("Planner model call failed ({e}), using the neutral fallback plan");
            fallback_plan(limits)
        }
    };

    StatePatch {
        interview_plan: Some(plan),
        ..Default::default()
    }
}

fn parse_plan(raw: &str, limits: &InterviewLimits) -> Result<InterviewPlan, String> {
    let parsed: RawPlan = parse_llm_json(raw).map_err(|e| e.to_string())?;
    if parsed.topics.is_empty() {
        return Err("plan has no topics".to_string());
    }

    Ok(InterviewPlan {
        topics: parsed
            .topics
            .into_iter()
            .map(|t| Topic {
                name: t.name,
                description: t.description,
                max_questions: limits.max_questions_per_topic,
            })
            .collect(),
        max_total_questions: limits.max_total_questions,
        interview_style: parsed
            .interview_style
            .unwrap_or_else(|| "conversational".to_string()),
    })
}

/// The fixed neutral plan used whenever the model path fails.
pub fn fallback_plan(limits: &InterviewLimits) -> InterviewPlan {
    let topics = [
        (
            "Resume Discussion",
            "Discussion of experience and projects from the resume",
        ),
        (
            "Problem Solving",
            "Approaches to solving problems and analyzing requirements",
        ),
        (
            "Tools & Practices",
            "Tools, processes, and quality practices",
        ),
        ("Data Handling", "Working with data, formats, and validation"),
        ("Collaboration", "Teamwork, communication, and agreements"),
        (
            "Reliability & Testing",
            "Reliability, testing, and change control",
        ),
        ("Delivery", "Planning, deadlines, iterations, and releases"),
        ("Learning & Growth", "Self-learning, feedback, and growth"),
    ];

    InterviewPlan {
        topics: topics
            .into_iter()
            .map(|(name, description)| Topic {
                name: name.to_string(),
                description: description.to_string(),
                max_questions: limits.max_questions_per_topic,
            })
            .collect(),
        max_total_questions: limits.max_total_questions,
        interview_style: "conversational".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::state::RESUME_TOPIC;
    use crate::llm_client::testing::{FailingModel, ScriptedModel};

    fn state() -> InterviewState {
        InterviewState::new(
            "Python developer, 3 years".to_string(),
            "Backend Python role".to_string(),
            "Backend Developer".to_string(),
        )
    }

    #[tokio::test]
    async fn test_model_failure_yields_eight_topic_fallback() {
        let patch = plan_interview(&state(), &FailingModel, &InterviewLimits::default()).await;
        let plan = patch.interview_plan.unwrap();
        assert_eq!(plan.topics.len(), 8);
        assert_eq!(plan.topics[0].name, RESUME_TOPIC);
        assert!(plan.max_total_questions > 0);
    }

    #[tokio::test]
    async fn test_malformed_json_yields_fallback() {
        let model = ScriptedModel::new(["here is your plan, enjoy"]);
        let patch = plan_interview(&state(), &model, &InterviewLimits::default()).await;
        let plan = patch.interview_plan.unwrap();
        assert_eq!(plan.topics.len(), 8);
    }

    #[tokio::test]
    async fn test_missing_topics_key_yields_fallback() {
        let model = ScriptedModel::new([r#"{"interview_style": "conversational"}"#]);
        let patch = plan_interview(&state(), &model, &InterviewLimits::default()).await;
        assert_eq!(patch.interview_plan.unwrap().topics.len(), 8);
    }

    #[tokio::test]
    async fn test_empty_topics_yields_fallback() {
        let model = ScriptedModel::new([r#"{"topics": []}"#]);
        let patch = plan_interview(&state(), &model, &InterviewLimits::default()).await;
        assert_eq!(patch.interview_plan.unwrap().topics.len(), 8);
    }

    #[tokio::test]
    async fn test_valid_plan_is_stamped_with_limits() {
        let limits = InterviewLimits {
            max_total_questions: 12,
            max_questions_per_topic: 3,
        };
        let model = ScriptedModel::new([
            r#"```json
{"topics": [{"name": "Resume Discussion", "description": "Past work"},
            {"name": "Python", "description": "Language depth"}],
 "interview_style": "conversational"}
```"#,
        ]);
        let patch = plan_interview(&state(), &model, &limits).await;
        let plan = patch.interview_plan.unwrap();
        assert_eq!(plan.topics.len(), 2);
        assert!(plan.topics.iter().all(|t| t.max_questions == 3));
        assert_eq!(plan.max_total_questions, 12);
    }

    #[tokio::test]
    async fn test_plan_parsed_from_prose_wrapped_json() {
        let model = ScriptedModel::new([
            r#"Sure thing! {"topics": [{"name": "Rust", "description": "d"}]} Done."#,
        ]);
        let patch = plan_interview(&state(), &model, &InterviewLimits::default()).await;
        let plan = patch.interview_plan.unwrap();
        assert_eq!(plan.topics.len(), 1);
        assert_eq!(plan.topics[0].name, "Rust");
    }
}
