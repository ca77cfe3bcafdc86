//! Reporter — aggregates every evaluation into the final narrative report
//! and a hire/no-hire recommendation.

use tracing::{debug, warn};

use crate::interview::prompts::{truncate_chars, REPORT_PROMPT_TEMPLATE, REPORT_SYSTEM};
use crate::interview::state::{
    AnswerEvaluation, InterviewState, Recommendation, StatePatch,
};
use crate::llm_client::ModelClient;

/// At most this many entries per finding list go into the report prompt.
const TOP_FINDINGS: usize = 10;

/// Runs the reporting stage. On model failure, synthesizes a deterministic
/// report with a threshold-based recommendation instead of failing.
pub async fn generate_report(state: &InterviewState, model: &dyn ModelClient) -> StatePatch {
    debug!("--- Stage: Reporter ---");

    let evaluations = &state.answer_evaluations;
    if evaluations.is_empty() {
        return StatePatch {
            report: Some("The report cannot be created: no evaluations were recorded.".to_string()),
            ..Default::default()
        };
    }

    let topics_summary = build_topics_summary(evaluations);
    let avg_score =
        evaluations.iter().map(|e| e.score_percent).sum::<f64>() / evaluations.len() as f64;

    let inconsistencies = dedup_top(evaluations.iter().flat_map(|e| &e.analysis.inconsistencies));
    let red_flags = dedup_top(evaluations.iter().flat_map(|e| &e.analysis.red_flags));
    let strengths = dedup_top(evaluations.iter().flat_map(|e| &e.analysis.strengths));
    let weaknesses = dedup_top(evaluations.iter().flat_map(|e| &e.analysis.weaknesses));

    let prompt = REPORT_PROMPT_TEMPLATE
        .replace("{resume}", truncate_chars(&state.resume, 500))
        .replace(
            "{job_description}",
            truncate_chars(&state.job_description, 300),
        )
        .replace("{topics_summary}", &topics_summary)
        .replace("{avg_score}", &format!("{avg_score:.1}%"))
        .replace("{inconsistencies}", &inconsistencies.join("; "))
        .replace("{red_flags}", &red_flags.join("; "))
        .replace("{strengths}", &strengths.join("; "))
        .replace("{weaknesses}", &weaknesses.join("; "));

    match model.invoke(&prompt, REPORT_SYSTEM).await {
        Ok(report_text) if !report_text.trim().is_empty() => {
            let recommendation = extract_recommendation(&report_text);
            StatePatch {
                report: Some(report_text.trim().to_string()),
                final_recommendation: Some(recommendation),
                ..Default::default()
            }
        }
        other => {
            if let Err(e) = other {
                warn!("Reporter model call failed ({e}), using the deterministic template");
            } else {
                warn!("Reporter returned empty text, using the deterministic template");
            }
            let recommendation = threshold_recommendation(avg_score);
            let report = [
                "INTERVIEW REPORT".to_string(),
                format!("OVERALL SCORE: {avg_score:.1}%"),
                format!("DECISION: {}", recommendation.as_str()),
                String::new(),
                topics_summary,
            ]
            .join("\n");
            StatePatch {
                report: Some(report),
                final_recommendation: Some(recommendation),
                ..Default::default()
            }
        }
    }
}

/// One block per evaluation: final score plus four detailed sub-scores.
fn build_topics_summary(evaluations: &[AnswerEvaluation]) -> String {
    evaluations
        .iter()
        .map(|e| {
            let d = &e.detailed_scores;
            format!(
                "• Topic: {}\n  - Final score: {:.1}%\n  - Technical accuracy: {}/10\n  \
                 - Depth of knowledge: {}/10\n  - Practical experience: {}/10\n  \
                 - Communication: {}/10",
                e.topic,
                e.score_percent,
                d.technical_accuracy,
                d.depth_of_knowledge,
                d.practical_experience,
                d.communication_clarity
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Order-preserving dedup, capped at `TOP_FINDINGS`.
fn dedup_top<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.as_str()) {
            out.push(item.clone());
            if out.len() == TOP_FINDINGS {
                break;
            }
        }
    }
    out
}

/// Substring extraction from the narrative; REJECT wins when both keywords
/// appear, and the absence of both defaults to MAYBE.
fn extract_recommendation(report: &str) -> Recommendation {
    let mut recommendation = Recommendation::Maybe;
    if report.contains("HIRE") {
        recommendation = Recommendation::Hire;
    }
    if report.contains("REJECT") {
        recommendation = Recommendation::Reject;
    }
    recommendation
}

/// Deterministic thresholds used when the model path fails.
fn threshold_recommendation(avg_score: f64) -> Recommendation {
    if avg_score >= 80.0 {
        Recommendation::Hire
    } else if avg_score >= 65.0 {
        Recommendation::Maybe
    } else {
        Recommendation::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::state::{AnswerAnalysis, DetailedScores};
    use crate::llm_client::testing::{FailingModel, ScriptedModel};

    fn eval(topic: &str, score: f64) -> AnswerEvaluation {
        AnswerEvaluation {
            topic: topic.to_string(),
            score_percent: score,
            detailed_scores: DetailedScores {
                technical_accuracy: 7,
                depth_of_knowledge: 6,
                practical_experience: 5,
                communication_clarity: 8,
                problem_solving_approach: 6,
                examples_and_use_cases: 4,
            },
            analysis: AnswerAnalysis::default(),
            question: "Q".to_string(),
            answer: "A".to_string(),
        }
    }

    fn state_with_scores(scores: &[f64]) -> InterviewState {
        let mut state = InterviewState::new("resume".into(), "jd".into(), "role".into());
        for (i, s) in scores.iter().enumerate() {
            state.answer_evaluations.push(eval(&format!("T{i}"), *s));
        }
        state
    }

    #[tokio::test]
    async fn test_no_evaluations_yields_stub_report() {
        let state = state_with_scores(&[]);
        let patch = generate_report(&state, &FailingModel).await;
        assert!(patch.report.unwrap().contains("no evaluations"));
        assert!(patch.final_recommendation.is_none());
    }

    #[tokio::test]
    async fn test_model_failure_high_average_hires() {
        let state = state_with_scores(&[85.0, 90.0]);
        let patch = generate_report(&state, &FailingModel).await;
        assert_eq!(patch.final_recommendation, Some(Recommendation::Hire));
        let report = patch.report.unwrap();
        assert!(report.contains("INTERVIEW REPORT"));
        assert!(report.contains("HIRE"));
    }

    #[tokio::test]
    async fn test_model_failure_middling_average_maybes() {
        let state = state_with_scores(&[65.0, 70.0]);
        let patch = generate_report(&state, &FailingModel).await;
        assert_eq!(patch.final_recommendation, Some(Recommendation::Maybe));
    }

    #[tokio::test]
    async fn test_model_failure_low_average_rejects() {
        let state = state_with_scores(&[30.0, 40.0]);
        let patch = generate_report(&state, &FailingModel).await;
        assert_eq!(patch.final_recommendation, Some(Recommendation::Reject));
    }

    #[tokio::test]
    async fn test_narrative_extraction_hire() {
        let state = state_with_scores(&[75.0]);
        let model = ScriptedModel::new(["Solid throughout. Verdict: HIRE"]);
        let patch = generate_report(&state, &model).await;
        assert_eq!(patch.final_recommendation, Some(Recommendation::Hire));
    }

    #[tokio::test]
    async fn test_narrative_extraction_reject_wins_over_hire() {
        let state = state_with_scores(&[75.0]);
        let model = ScriptedModel::new(["Tempting to HIRE, but the flags force a REJECT."]);
        let patch = generate_report(&state, &model).await;
        assert_eq!(patch.final_recommendation, Some(Recommendation::Reject));
    }

    #[tokio::test]
    async fn test_narrative_without_keywords_defaults_maybe() {
        let state = state_with_scores(&[75.0]);
        let model = ScriptedModel::new(["A thoroughly ambiguous performance."]);
        let patch = generate_report(&state, &model).await;
        assert_eq!(patch.final_recommendation, Some(Recommendation::Maybe));
    }

    #[test]
    fn test_summary_carries_four_subscores() {
        let summary = build_topics_summary(&[eval("Rust", 66.5)]);
        assert!(summary.contains("Topic: Rust"));
        assert!(summary.contains("66.5%"));
        assert!(summary.contains("Technical accuracy: 7/10"));
        assert!(summary.contains("Depth of knowledge: 6/10"));
        assert!(summary.contains("Practical experience: 5/10"));
        assert!(summary.contains("Communication: 8/10"));
    }

    #[test]
    fn test_dedup_top_preserves_order_and_caps() {
        let items: Vec<String> = ["b", "a", "b", "c", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let out = dedup_top(items.iter());
        assert_eq!(out, vec!["b", "a", "c"]);

        let many: Vec<String> = (0..30).map(|i| format!("item{i}")).collect();
        assert_eq!(dedup_top(many.iter()).len(), 10);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(threshold_recommendation(80.0), Recommendation::Hire);
        assert_eq!(threshold_recommendation(79.9), Recommendation::Maybe);
        assert_eq!(threshold_recommendation(65.0), Recommendation::Maybe);
        assert_eq!(threshold_recommendation(64.9), Recommendation::Reject);
    }
}
