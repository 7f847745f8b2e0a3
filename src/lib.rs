pub mod cli;
pub mod config;
pub mod history;
pub mod logging;
pub mod model;
pub mod model_gateway;
pub mod probe;
pub mod progress;
pub mod prompt;
pub mod providers;
pub mod render;
pub mod script_debug;
pub mod session;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, Utc};
use clap::Parser;
use reqwest::Client;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use cli::{Action, Cli};
use config::Config;
use history::{EscalationOutcome, HistoryStore};
use model_gateway::HostModelGateway;
use progress::Progress;
use session::{Session, resolve_model};

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let result = dispatch().await;
    if let Err(err) = &result {
        info!(error = %format!("{err:#}"), "command failed");
    }
    result
}

async fn dispatch() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::from_env();
    info!(
        provider = %cfg.model_provider,
        model = %cfg.model,
        history_file = %cfg.history_file.display(),
        retention_secs = cfg.retention().map(|window| window.as_secs()),
        "loaded runtime configuration"
    );

    let mut history = HistoryStore::load(&cfg.history_file, Utc::now(), cfg.retention());

    match cli.action() {
        Action::Clear => {
            history.clear();
            history.persist().context("Failed to save chat history")?;
            println!("History cleared.");
            Ok(())
        }
        Action::ShowSystem => {
            println!("{}", probe::probe());
            Ok(())
        }
        Action::ShowLast => {
            let last = history.last()?;
            render::print_response(&last.content, cli.raw);
            Ok(())
        }
        Action::ShowHistory => {
            print_history(&history, &cfg);
            Ok(())
        }
        Action::Get(ordinal) => {
            let msg = history.get(ordinal)?;
            render::print_response(&msg.content, cli.raw);
            Ok(())
        }
        Action::Debug { files, note } => {
            run_debug(&cli, &cfg, &mut history, &files, note.as_deref()).await
        }
        Action::Ask { words, escalate } => {
            run_ask(&cli, &cfg, &mut history, &words, escalate).await
        }
    }
}

async fn run_ask(
    cli: &Cli,
    cfg: &Config,
    history: &mut HistoryStore,
    words: &str,
    escalate: bool,
) -> Result<()> {
    let context = read_piped_stdin()?;
    let query = match prompt::assemble(words, &context, &cfg.query_append) {
        Ok(query) => Some(query),
        Err(_) if escalate => None,
        Err(err) => return Err(err.into()),
    };

    if query.is_some() {
        providers::preflight(cfg)?;
    }

    let client = build_client(cfg)?;
    let gateway = HostModelGateway::new(&client, cfg);
    let mut session = Session::new(&gateway, history);

    if escalate {
        match session.escalate(system_prompt)? {
            EscalationOutcome::Escalated => {
                eprintln!("Escalated to {}.", cfg.escalation_model)
            }
            EscalationOutcome::AlreadyEscalated => {
                eprintln!("Already escalated to {}.", cfg.escalation_model)
            }
        }
    }

    let Some(query) = query else {
        return Ok(());
    };

    let model = resolve_model(cli.model.as_deref(), cfg, session.is_escalated());
    let progress = Progress::start("Thinking...");
    let answer = session.ask(&model, query, system_prompt).await;
    progress.finish();

    render::print_response(&answer?, cli.raw);
    Ok(())
}

async fn run_debug(
    cli: &Cli,
    cfg: &Config,
    history: &mut HistoryStore,
    files: &[PathBuf],
    note: Option<&str>,
) -> Result<()> {
    let sources = script_debug::collect_sources(files)?;
    let first = files
        .first()
        .ok_or_else(|| anyhow!("debug mode needs at least one file"))?;
    providers::preflight(cfg)?;

    // A debug session is a new conversation.
    history.clear();

    let progress = Progress::start("Analyzing code...");
    let script_output = script_debug::run_script(&cfg.debug_interpreter, first);
    let query = prompt::render_debug_prompt(&sources, &script_output, note);

    let client = build_client(cfg)?;
    let gateway = HostModelGateway::new(&client, cfg);
    let model = resolve_model(cli.model.as_deref(), cfg, false);
    let answer = Session::new(&gateway, history)
        .ask(&model, query, || prompt::DEBUG_SYSTEM_PROMPT.to_string())
        .await;
    progress.finish();

    render::print_response(&answer?, cli.raw);
    Ok(())
}

fn system_prompt() -> String {
    prompt::render_system_prompt(&probe::probe().to_string())
}

fn build_client(cfg: &Config) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.model_timeout_secs))
        .build()
        .context("Failed to initialize HTTP client")
}

fn read_piped_stdin() -> Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }
    let mut buf = String::new();
    if let Err(err) = stdin.read_to_string(&mut buf) {
        if err.kind() == io::ErrorKind::InvalidData {
            warn!(error = %err, "ignoring non UTF-8 stdin");
            return Ok(String::new());
        }
        bail!("Failed to read stdin: {err}");
    }
    Ok(buf)
}

fn print_history(history: &HistoryStore, cfg: &Config) {
    let turns = history.recent_assistant_turns(cfg.history_view_count, cfg.history_preview_chars);
    if turns.is_empty() {
        println!("(no answers in history)");
        return;
    }

    for turn in turns {
        println!(
            "{:>2}. [{}] {}",
            turn.ordinal,
            turn.timestamp.with_timezone(&Local).format("%H:%M"),
            turn.preview
        );
    }
}
