//! VERITAS Triage — interactive Ratatui chat client.
//!
//! Layout:
//!   ┌─── header ──────────────────────────────────────────────────────────┐
//!   │  VERITAS Triage — session <id>                                      │
//!   ├─── conversation ────────────────┬─── turn trace ────────────────────┤
//!   │  user / assistant turns          │  Supervisor plan + agent messages │
//!   ├─────────────────────────────────┴───────────────────────────────────┤
//!   │  input line                                                          │
//!   ├─────────────────────────────────────────────────────────────────────┤
//!   │  footer (key bindings)                                               │
//!   └─────────────────────────────────────────────────────────────────────┘

use std::io;
use std::sync::Arc;

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};

use veritas_collaborators::{
    MockAppointmentStore, MockKnowledgeStore, MockLLMProvider, MockReranker, MockVectorIndex,
};
use veritas_contracts::{
    risk::UserRiskProfile,
    turn::{HistoryEntry, PlanStatus, Role, TurnMessage},
};
use veritas_guardrail::{GuardrailConfig, GuardrailManager, GuardrailTier};
use veritas_orchestrator::{
    nodes::{
        AppointmentAgent, ConversationAgent, DiagnosisEngine, DocumentRetriever, ImageAnalyzer,
        InvestigationGenerator, Recommender, SymptomExtractor,
    },
    turn_node::TurnNode,
    TurnLoop,
};

// ── App state ─────────────────────────────────────────────────────────────────

struct App {
    session_id: String,
    input: String,
    history: Vec<HistoryEntry>,
    risk: UserRiskProfile,
    last_plan: Vec<(String, PlanStatus)>,
    last_messages: Vec<TurnMessage>,
    status: String,
}

impl App {
    fn new() -> Self {
        Self {
            session_id: "tui-session".to_string(),
            input: String::new(),
            history: Vec::new(),
            risk: UserRiskProfile::new(),
            last_plan: Vec::new(),
            last_messages: Vec::new(),
            status: "idle".to_string(),
        }
    }
}

fn build_turn_loop() -> TurnLoop {
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
        Arc::new(ConversationAgent::new(knowledge)),
        Arc::new(AppointmentAgent::new(appointments)),
    ];
    let guardrail = Arc::new(GuardrailManager::new(GuardrailTier::Intermediate, GuardrailConfig::baseline()));
    TurnLoop::new(nodes, guardrail)
}

/// Submit the current input line as one turn, blocking on the async turn
/// loop from this synchronous event loop (the terminal UI has nothing else
/// to do meanwhile, so a dedicated runtime per submission is simplest).
fn submit_turn(rt: &tokio::runtime::Runtime, turn_loop: &TurnLoop, app: &mut App) {
    let input = std::mem::take(&mut app.input);
    if input.trim().is_empty() {
        return;
    }

    app.status = "running...".to_string();
    let risk = std::mem::replace(&mut app.risk, UserRiskProfile::new());
    let history = app.history.clone();

    let outcome = rt.block_on(turn_loop.run_turn(&app.session_id, &input, None, history, None, risk));

    match outcome {
        Ok(outcome) => {
            app.history = outcome.history;
            app.risk = outcome.risk;
            app.last_plan = outcome.state.plan.iter().map(|p| (p.agent.clone(), p.status)).collect();
            app.last_messages = outcome.state.messages;
            app.status = "idle".to_string();
        }
        Err(e) => {
            app.history.push(HistoryEntry { role: Role::User, text: input });
            app.history.push(HistoryEntry { role: Role::Assistant, text: format!("[error: {e}]") });
            app.status = format!("error: {e}");
        }
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn ui(f: &mut Frame, app: &App) {
    let full = f.area();

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(full);

    render_header(f, outer[0], app);

    let mid = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(outer[1]);

    render_conversation(f, mid[0], app);
    render_trace(f, mid[1], app);
    render_input(f, outer[2], app);
    render_footer(f, outer[3], app);
}

fn render_header(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let title = Line::from(vec![
        Span::styled("VERITAS Triage", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  session: {}  [{}]", app.session_id, app.status)),
    ]);
    let header = Paragraph::new(title).block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(header, area);
}

fn render_conversation(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let items: Vec<ListItem> = app
        .history
        .iter()
        .map(|entry| {
            let (label, color) = match entry.role {
                Role::User => ("you", Color::White),
                Role::Assistant => ("veritas", Color::Green),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{label}: "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(entry.text.clone()),
            ]))
        })
        .collect();

    let block = Block::default().title(" Conversation ").borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(List::new(items).block(block), area);
}

fn render_trace(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let mut lines: Vec<Line> = vec![Line::from(Span::styled("Supervisor plan", Style::default().fg(Color::Cyan)))];

    for (agent, status) in &app.last_plan {
        let (label, color) = match status {
            PlanStatus::Pending => ("pending", Color::DarkGray),
            PlanStatus::Current => ("current", Color::Yellow),
            PlanStatus::Done => ("done", Color::Green),
            PlanStatus::Skipped => ("skipped", Color::Gray),
        };
        lines.push(Line::from(vec![
            Span::raw(format!("  {agent}: ")),
            Span::styled(label, Style::default().fg(color)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Agent messages", Style::default().fg(Color::Cyan))));
    for msg in &app.last_messages {
        let warn = msg.warning.as_deref().unwrap_or("");
        lines.push(Line::from(format!("  {} -> {} {}", msg.agent, &msg.output_digest[..msg.output_digest.len().min(8)], warn)));
    }

    let block = Block::default().title(" Turn Trace ").borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn render_input(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let block = Block::default().title(" Message (Enter to send) ").borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(app.input.as_str()).block(block), area);
}

fn render_footer(f: &mut Frame, area: ratatui::layout::Rect, _app: &App) {
    let footer = Paragraph::new(Line::from(vec![
        Span::styled("[Enter] ", Style::default().fg(Color::Cyan)),
        Span::raw("Send  "),
        Span::styled("[Esc] ", Style::default().fg(Color::Cyan)),
        Span::raw("Quit"),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(footer, area);
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

fn main() -> io::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        default_hook(info);
    }));

    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let turn_loop = build_turn_loop();

    let mut terminal = setup_terminal()?;
    let mut app = App::new();

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if event::poll(std::time::Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Esc => break,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Enter => submit_turn(&rt, &turn_loop, &mut app),
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Char(c) => app.input.push(c),
                    _ => {}
                }
            }
        }
    }

    restore_terminal(&mut terminal)?;
    Ok(())
}
