//! VERITAS Triage Runtime — Demo CLI
//!
//! Wires the full Supervisor/turn-loop graph once and exposes it through
//! three subcommands:
//!
//!   cargo run -p demo -- serve
//!   cargo run -p demo -- evaluate --dataset scenarios.json --output results.json
//!   cargo run -p demo -- ingest --source ./docs
//!
//! `serve` stands in for the out-of-scope HTTP transport with an interactive
//! REPL over the same `chat()` surface a real transport would call.

use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use veritas_collaborators::{
    MockAppointmentStore, MockKnowledgeStore, MockLLMProvider, MockReranker, MockVectorIndex,
};
use veritas_contracts::error::VeritasResult;
use veritas_guardrail::{GuardrailConfig, GuardrailManager, GuardrailTier};
use veritas_orchestrator::{
    nodes::{
        AppointmentAgent, ConversationAgent, DiagnosisEngine, DocumentRetriever, ImageAnalyzer,
        InvestigationGenerator, Recommender, SymptomExtractor,
    },
    turn_node::TurnNode,
    TurnLoop, VeritasCore,
};

#[derive(Parser)]
#[command(
    name = "demo",
    about = "VERITAS triage runtime demo",
    long_about = "Drives the VERITAS Supervisor/turn-loop graph through an\n\
                  interactive REPL (serve), a batch scenario replay\n\
                  (evaluate), or an offline-tooling stub (ingest)."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wire the graph once and drive an interactive REPL over `chat()`.
    Serve,
    /// Replay a dataset of turns through `chat()` and report outcomes.
    Evaluate {
        #[arg(long)]
        dataset: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Offline tooling stub for building the document index (out of scope
    /// beyond acknowledging the source directory).
    Ingest {
        #[arg(long)]
        source: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct DatasetTurn {
    session_id: String,
    input: String,
}

#[derive(Debug, Serialize)]
struct EvaluationResult {
    session_id: String,
    input: String,
    response: String,
    trace_id: String,
}

fn build_core() -> VeritasCore {
    let provider = Arc::new(MockLLMProvider::new());
    let index = Arc::new(MockVectorIndex::new());
    let reranker = Arc::new(MockReranker::new());
    let knowledge = Arc::new(MockKnowledgeStore::new());
    let appointments = Arc::new(MockAppointmentStore::new());

    let nodes: Vec<Arc<dyn TurnNode>> = vec![
        Arc::new(ImageAnalyzer::new(provider.clone())),
        Arc::new(SymptomExtractor::new(provider.clone())),
        Arc::new(DiagnosisEngine::new(provider.clone())),
        Arc::new(InvestigationGenerator::new(provider.clone())),
        Arc::new(DocumentRetriever::new(index, reranker)),
        Arc::new(Recommender::new(provider)),
        Arc::new(ConversationAgent::new(knowledge.clone())),
        Arc::new(AppointmentAgent::new(appointments.clone())),
    ];
    let guardrail = Arc::new(GuardrailManager::new(GuardrailTier::Intermediate, GuardrailConfig::baseline()));
    let turn_loop = TurnLoop::new(nodes, guardrail);

    VeritasCore::new(turn_loop, appointments, knowledge)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve => serve().await,
        Command::Evaluate { dataset, output } => evaluate(dataset, output).await,
        Command::Ingest { source } => ingest(source),
    };

    if let Err(e) = result {
        eprintln!("demo error: {e}");
        std::process::exit(1);
    }
}

async fn serve() -> VeritasResult<()> {
    println!("VERITAS triage — interactive session. Type 'quit' to exit.\n");

    let core = build_core();
    let session_id = "repl-session";
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("you> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        match core.chat(session_id, line, None).await {
            Ok(resp) => println!("veritas> {}\n", resp.response),
            Err(e) => println!("veritas> [error: {e}]\n"),
        }
    }

    Ok(())
}

async fn evaluate(dataset: PathBuf, output: PathBuf) -> VeritasResult<()> {
    let raw = std::fs::read_to_string(&dataset)
        .map_err(|e| veritas_contracts::error::VeritasError::ConfigError { reason: format!("reading {}: {e}", dataset.display()) })?;
    let turns: Vec<DatasetTurn> = serde_json::from_str(&raw)
        .map_err(|e| veritas_contracts::error::VeritasError::SchemaValidation { reason: format!("dataset parse: {e}") })?;

    let core = build_core();
    let mut results = Vec::with_capacity(turns.len());
    for turn in turns {
        let resp = core.chat(&turn.session_id, &turn.input, None).await?;
        tracing::info!(session_id = %turn.session_id, "evaluated turn");
        results.push(EvaluationResult {
            session_id: turn.session_id,
            input: turn.input,
            response: resp.response,
            trace_id: resp.trace_id,
        });
    }

    let serialized = serde_json::to_string_pretty(&results)
        .map_err(|e| veritas_contracts::error::VeritasError::SchemaValidation { reason: e.to_string() })?;
    std::fs::write(&output, serialized)
        .map_err(|e| veritas_contracts::error::VeritasError::ConfigError { reason: format!("writing {}: {e}", output.display()) })?;

    println!("Evaluated {} turn(s); results written to {}", results.len(), output.display());
    Ok(())
}

fn ingest(source: PathBuf) -> VeritasResult<()> {
    println!("ingest is a stub: offline document indexing is out of scope for this runtime.");
    println!("Source directory acknowledged: {}", source.display());
    Ok(())
}
