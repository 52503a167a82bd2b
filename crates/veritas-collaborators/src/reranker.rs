//! Passage reranking collaborator (§6).

use veritas_contracts::error::VeritasResult;

use crate::vector::ScoredPassage;

/// Reorders a candidate passage list against a query, returning the top-k.
#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, passages: Vec<ScoredPassage>, k: usize) -> VeritasResult<Vec<ScoredPassage>>;
}

/// Reorders by a fixed cosine-similarity-like proxy against the query term
/// set — deterministic, no model call, standing in for a real cross-encoder
/// reranker in tests.
pub struct MockReranker;

impl MockReranker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Reranker for MockReranker {
    async fn rerank(&self, query: &str, mut passages: Vec<ScoredPassage>, k: usize) -> VeritasResult<Vec<ScoredPassage>> {
        let query_len = query.split_whitespace().count().max(1) as f64;
        for p in &mut passages {
            // Nudge the candidate score toward passages whose length is
            // closer to the query's — a deterministic, content-free proxy
            // for "more focused passages rerank higher".
            let len_ratio = (p.passage.split_whitespace().count() as f64 / query_len).min(query_len);
            p.score = (p.score + 1.0 / (1.0 + (len_ratio - 1.0).abs())) / 2.0;
        }
        passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        passages.truncate(k);
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rerank_truncates_to_k() {
        let reranker = MockReranker::new();
        let passages = vec![
            ScoredPassage { passage: "a b c".to_string(), source_id: "1".to_string(), score: 0.2 },
            ScoredPassage { passage: "d e f".to_string(), source_id: "2".to_string(), score: 0.5 },
            ScoredPassage { passage: "g h i".to_string(), source_id: "3".to_string(), score: 0.9 },
        ];
        let result = reranker.rerank("query text", passages, 2).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn rerank_is_deterministic_for_same_input() {
        let reranker = MockReranker::new();
        let passages = vec![
            ScoredPassage { passage: "a".to_string(), source_id: "1".to_string(), score: 0.1 },
            ScoredPassage { passage: "b".to_string(), source_id: "2".to_string(), score: 0.2 },
        ];
        let r1 = reranker.rerank("q", passages.clone(), 2).await.unwrap();
        let r2 = reranker.rerank("q", passages, 2).await.unwrap();
        assert_eq!(r1, r2);
    }
}
