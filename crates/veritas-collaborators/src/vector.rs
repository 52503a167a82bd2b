//! Approximate nearest-neighbor document search (§6).

use serde::{Deserialize, Serialize};
use veritas_contracts::error::VeritasResult;

/// One candidate passage returned by `VectorIndex::search` or
/// `Reranker::rerank`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: String,
    pub source_id: String,
    pub score: f64,
}

/// The vector-search collaborator. Real implementations embed `query` and
/// search an ANN index; the embedder is either folded in here or supplied
/// separately by the core (§6 leaves this implementation-defined).
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> VeritasResult<Vec<ScoredPassage>>;
}

/// A small, fixed, seeded in-memory index. Scores a fixed corpus of
/// fictional medical passages by naive term overlap with the query —
/// deterministic and dependency-free, standing in for a real embedding
/// model in tests.
pub struct MockVectorIndex {
    corpus: Vec<(&'static str, &'static str)>,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self {
            corpus: vec![
                ("doc-derm-01", "Contact dermatitis presents as a red, itchy patch at the site of allergen exposure, often resolving within days of removing the irritant."),
                ("doc-derm-02", "Tinea corporis (ringworm) causes an annular red, scaly, itchy patch with central clearing."),
                ("doc-resp-01", "Influenza commonly presents with fever, headache, myalgia, and body aches lasting three to seven days."),
                ("doc-resp-02", "Viral pharyngitis causes sore throat, mild fever, and malaise, usually self-limited."),
                ("doc-cardio-01", "Acute coronary syndrome may present with chest pain radiating to the left arm, dyspnea, and diaphoresis — a medical emergency."),
            ],
        }
    }

    fn term_overlap(query: &str, passage: &str) -> f64 {
        let q: std::collections::HashSet<String> =
            query.to_lowercase().split_whitespace().map(|s| s.to_string()).collect();
        let p: std::collections::HashSet<String> =
            passage.to_lowercase().split_whitespace().map(|s| s.to_string()).collect();
        if q.is_empty() {
            return 0.0;
        }
        let overlap = q.intersection(&p).count() as f64;
        (overlap / q.len() as f64).min(1.0)
    }
}

impl Default for MockVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VectorIndex for MockVectorIndex {
    async fn search(&self, query: &str, k: usize) -> VeritasResult<Vec<ScoredPassage>> {
        let mut scored: Vec<ScoredPassage> = self
            .corpus
            .iter()
            .map(|(id, text)| ScoredPassage {
                passage: text.to_string(),
                source_id: id.to_string(),
                score: Self::term_overlap(query, text),
            })
            .filter(|p| p.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_ranks_dermatology_passage_above_unrelated() {
        let index = MockVectorIndex::new();
        let results = index.search("itchy red patch skin", 5).await.unwrap();
        assert!(!results.is_empty());
        assert!(results[0].source_id.starts_with("doc-derm"));
    }

    #[tokio::test]
    async fn search_respects_k() {
        let index = MockVectorIndex::new();
        let results = index.search("fever headache body aches", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn search_with_no_overlap_is_empty() {
        let index = MockVectorIndex::new();
        let results = index.search("xyzxyzxyz", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
