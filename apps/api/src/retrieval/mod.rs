//! Retrieval — the question-bank seam behind the Selector's RAG path.
//!
//! The real vector/embedding backend is an external collaborator; the engine
//! only depends on the `QuestionRetriever` trait. The default backend is
//! `InMemoryQuestionIndex`, a token-overlap ranker over ingested question
//! documents. It is deliberately boring: deterministic, lock-light, and safe
//! for concurrent reads across sessions.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One unit of ingestable knowledge: a topic section plus a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub section: String,
    pub question: String,
}

/// Metadata carried with every retrieval hit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedMetadata {
    pub question: Option<String>,
    pub section: Option<String>,
}

/// A normalized retrieval result: raw document text, structured metadata,
/// and a distance in [0, 1] (lower is closer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedQuestion {
    pub content: String,
    pub metadata: RetrievedMetadata,
    pub distance: Option<f32>,
}

/// The retrieval seam. `search` never fails for "no results" — an empty
/// vector is the only way to signal that nothing matched.
#[async_trait]
pub trait QuestionRetriever: Send + Sync {
    async fn search(&self, topic: &str, count: usize) -> Vec<RetrievedQuestion>;

    /// Ingests question documents. Idempotent: duplicate ids overwrite.
    async fn add_documents(&self, chunks: Vec<KnowledgeChunk>);
}

#[derive(Debug, Clone)]
struct StoredDoc {
    text: String,
    section: String,
    question: String,
}

/// In-memory question index keyed by document id.
///
/// Ids follow the `question_{i}_{section}` scheme, so re-ingesting the same
/// chunk list lands on the same ids and overwrites in place.
#[derive(Default)]
pub struct InMemoryQuestionIndex {
    docs: DashMap<String, StoredDoc>,
}

impl InMemoryQuestionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl QuestionRetriever for InMemoryQuestionIndex {
    async fn search(&self, topic: &str, count: usize) -> Vec<RetrievedQuestion> {
        let query_tokens = tokenize(topic);
        if query_tokens.is_empty() || count == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, RetrievedQuestion)> = Vec::new();
        for entry in self.docs.iter() {
            let doc = entry.value();
            let similarity = score_doc(&query_tokens, topic, doc);
            if similarity <= 0.0 {
                continue;
            }
            scored.push((
                similarity,
                RetrievedQuestion {
                    content: doc.text.clone(),
                    metadata: RetrievedMetadata {
                        question: Some(doc.question.clone()),
                        section: Some(doc.section.clone()),
                    },
                    distance: Some(1.0 - similarity.min(1.0)),
                },
            ));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(count);
        scored.into_iter().map(|(_, q)| q).collect()
    }

    async fn add_documents(&self, chunks: Vec<KnowledgeChunk>) {
        let mut added = 0usize;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let section = chunk.section.trim().to_string();
            let question = chunk.question.trim().to_string();
            if section.is_empty() || question.is_empty() {
                continue;
            }
            let id = format!("question_{i}_{section}");
            let text = format!("Section: {section}\nQuestion: {question}");
            self.docs.insert(
                id,
                StoredDoc {
                    text,
                    section,
                    question,
                },
            );
            added += 1;
        }
        info!("Ingested {added} question documents into the in-memory index");
    }
}

/// Similarity between a query and a document: fraction of query tokens found
/// in the document text, with a bonus when the section matches the topic.
fn score_doc(query_tokens: &[String], raw_query: &str, doc: &StoredDoc) -> f32 {
    let doc_tokens = tokenize(&doc.text);
    let hits = query_tokens
        .iter()
        .filter(|t| doc_tokens.contains(t))
        .count();
    let mut score = hits as f32 / query_tokens.len() as f32;

    let section_lower = doc.section.to_lowercase();
    let query_lower = raw_query.to_lowercase();
    if section_lower == query_lower
        || section_lower.contains(&query_lower)
        || query_lower.contains(&section_lower)
    {
        score += 0.5;
    }
    score
}

/// Built-in starter bank seeded into the shared index at startup, so the
/// retrieval path works out of the box. Sessions created with a knowledge
/// override get their own index instead.
pub fn default_question_bank() -> Vec<KnowledgeChunk> {
    let entries: &[(&str, &str)] = &[
        (
            "Problem Solving",
            "Walk me through a recent problem where the first approach failed. What did you try next?",
        ),
        (
            "Problem Solving",
            "How do you break down a vague requirement into something you can start building?",
        ),
        (
            "Tools & Practices",
            "Which development tools do you consider essential to your workflow, and why those?",
        ),
        (
            "Tools & Practices",
            "Describe how code review works on your team and what you look for when reviewing.",
        ),
        (
            "Data Handling",
            "How do you validate and sanitize data arriving from an external system?",
        ),
        (
            "Data Handling",
            "Tell me about a time a data format or schema change caused a production issue.",
        ),
        (
            "Collaboration",
            "Describe a disagreement with a colleague about a technical decision and how it was resolved.",
        ),
        (
            "Collaboration",
            "How do you hand over in-progress work so someone else can pick it up smoothly?",
        ),
        (
            "Reliability & Testing",
            "What is your strategy for testing a change that touches critical behavior?",
        ),
        (
            "Reliability & Testing",
            "Tell me about an incident you helped debug in production. What was the root cause?",
        ),
        (
            "Delivery",
            "How do you decide what to cut when a deadline is at risk?",
        ),
        (
            "Delivery",
            "Describe how you plan and sequence a multi-week piece of work.",
        ),
        (
            "Learning & Growth",
            "What was the last technology you learned on your own, and how did you approach it?",
        ),
        (
            "Learning & Growth",
            "Tell me about a piece of critical feedback you received and what you changed because of it.",
        ),
    ];

    entries
        .iter()
        .map(|(section, question)| KnowledgeChunk {
            section: section.to_string(),
            question: question.to_string(),
        })
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_string)
        .collect()
}
