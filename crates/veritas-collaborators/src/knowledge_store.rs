//! FAQ / clinic-knowledge lookup collaborator (§6).
//!
//! Distinct from `VectorIndex`: this is a small, cacheable key lookup for
//! operational facts (hours, insurance accepted, location) rather than
//! semantic document search (§5's caching note).

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use veritas_contracts::error::VeritasResult;

/// One FAQ lookup hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqResult {
    pub question: String,
    pub answer: String,
}

/// The clinic-knowledge collaborator.
#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Look up a FAQ entry by topic key (e.g. `"hours"`, `"insurance"`,
    /// `"location"`). Returns `None` when the topic is unrecognized.
    async fn lookup(&self, topic: &str) -> VeritasResult<Option<FaqResult>>;
}

/// A fixed in-memory FAQ table, backed by an internal cache of recent
/// lookups (§5: "small FAQ lookups may be cached"). The cache here just
/// records hit/miss counts behind a mutex; the table itself is already O(1).
pub struct MockKnowledgeStore {
    table: HashMap<&'static str, (&'static str, &'static str)>,
    hits: Mutex<u64>,
}

impl MockKnowledgeStore {
    pub fn new() -> Self {
        Self {
            table: HashMap::from([
                ("hours", ("What are your hours?", "We're open Monday-Friday, 8am-6pm, and Saturday 9am-1pm.")),
                ("insurance", ("What insurance do you accept?", "We accept most major insurance plans; call ahead to confirm your specific plan.")),
                ("location", ("Where are you located?", "123 Maple Street, Suite 200.")),
                ("parking", ("Is parking available?", "Free parking is available in the lot behind the building.")),
            ]),
            hits: Mutex::new(0),
        }
    }

    /// Number of successful lookups served so far.
    pub fn hit_count(&self) -> u64 {
        *self.hits.lock().expect("knowledge store mutex poisoned")
    }
}

impl Default for MockKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for MockKnowledgeStore {
    async fn lookup(&self, topic: &str) -> VeritasResult<Option<FaqResult>> {
        match self.table.get(topic) {
            Some((question, answer)) => {
                *self.hits.lock().expect("knowledge store mutex poisoned") += 1;
                Ok(Some(FaqResult { question: question.to_string(), answer: answer.to_string() }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_known_topic_returns_answer() {
        let store = MockKnowledgeStore::new();
        let result = store.lookup("hours").await.unwrap();
        assert!(result.is_some());
        assert_eq!(store.hit_count(), 1);
    }

    #[tokio::test]
    async fn lookup_unknown_topic_returns_none() {
        let store = MockKnowledgeStore::new();
        let result = store.lookup("parking garage height limit").await.unwrap();
        assert!(result.is_none());
        assert_eq!(store.hit_count(), 0);
    }
}
