//! The eight agent nodes the Supervisor dispatches to (§4.3-§4.10). Each
//! implements both `Agent` (the one-shot executor trust boundary) and
//! `TurnNode` (the Supervisor-facing `run(state) -> state` contract).

pub mod appointment_agent;
pub mod conversation_agent;
pub mod diagnosis_engine;
pub mod document_retriever;
pub mod image_analyzer;
pub mod investigation_generator;
pub mod recommender;
pub mod symptom_extractor;

pub use appointment_agent::AppointmentAgent;
pub use conversation_agent::ConversationAgent;
pub use diagnosis_engine::DiagnosisEngine;
pub use document_retriever::DocumentRetriever;
pub use image_analyzer::ImageAnalyzer;
pub use investigation_generator::InvestigationGenerator;
pub use recommender::Recommender;
pub use symptom_extractor::SymptomExtractor;
