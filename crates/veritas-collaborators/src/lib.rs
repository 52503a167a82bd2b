//! # veritas-collaborators
//!
//! The external capability traits the triage core requires from its
//! environment (§6): `LLMProvider`, `VectorIndex`, `Reranker`,
//! `AppointmentStore`, `KnowledgeStore`. Each is an `async_trait` because
//! every one of them is a suspension point from the turn loop's perspective
//! (§5).
//!
//! Deterministic, in-memory mock implementations are provided for local
//! development and tests — fixed, fictional, deterministic-by-convention
//! data, no external calls.

pub mod appointment_store;
pub mod knowledge_store;
pub mod llm;
pub mod reranker;
pub mod structured;
pub mod vector;

pub use appointment_store::{AppointmentStore, MockAppointmentStore};
pub use knowledge_store::{FaqResult, KnowledgeStore, MockKnowledgeStore};
pub use llm::{LLMProvider, MockLLMProvider};
pub use reranker::{MockReranker, Reranker};
pub use structured::structured_call;
pub use vector::{MockVectorIndex, ScoredPassage, VectorIndex};
