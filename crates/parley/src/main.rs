//! Chat with a persona-driven agent from the terminal.
//!
//! Reads the API key from the `PARLEY_API_KEY` (or `OPENAI_API_KEY`)
//! environment variable. Without a key the agent runs on the deterministic
//! offline backend, so the CLI works everywhere.
//!
//! # Examples
//!
//! ```sh
//! # One-shot turn
//! parley --message "Where is my order?" --session s1 --user-type customer
//!
//! # Pipe content from stdin
//! cat question.txt | parley --stdin --user-type support_agent
//!
//! # Interactive REPL with a custom persona catalog
//! parley --personas personas.yaml --user-type researcher
//! ```

use clap::Parser;
use parley::prelude::*;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Chat with a persona-driven agent from the terminal.
///
/// Without --message or --stdin, starts an interactive REPL.
#[derive(Parser)]
#[command(name = "parley")]
struct Cli {
    // ── Message content ────────────────────────────────────────
    /// User message (one-shot mode)
    #[arg(long)]
    message: Option<String>,

    /// Read the user message from stdin
    #[arg(long)]
    stdin: bool,

    // ── Session ────────────────────────────────────────────────
    /// Session identifier; turns with the same id share history
    #[arg(long, default_value = "default")]
    session: String,

    /// Persona label (e.g. customer, support_agent, manager)
    #[arg(long, default_value = "customer")]
    user_type: String,

    /// Persona catalog YAML file
    #[arg(long)]
    personas: Option<PathBuf>,

    // ── Provider overrides ─────────────────────────────────────
    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Chat-completions endpoint URL (OpenAI-compatible)
    #[arg(long)]
    base_url: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens per reply
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Retries for transient provider failures
    #[arg(long)]
    retries: Option<u32>,

    // ── Output ─────────────────────────────────────────────────
    /// Print the session's full history after the reply
    #[arg(long)]
    show_history: bool,
}

fn build_config(cli: &Cli) -> AgentConfig {
    let mut config = AgentConfig::from_env();
    if let Some(ref model) = cli.model {
        config = config.with_model(model.as_str());
    }
    if let Some(ref url) = cli.base_url {
        config = config.with_base_url(url.as_str());
    }
    if let Some(t) = cli.temperature {
        config = config.with_temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        config = config.with_max_tokens(n);
    }
    if let Some(n) = cli.retries {
        config = config.with_retries(n);
    }
    if let Some(ref path) = cli.personas {
        config = config.with_persona_file(path);
    }
    config
}

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn print_history(agent: &ChatAgent, session: &str) {
    for message in agent.get_conversation_history(session) {
        println!("[{}] {}", message.role, message.content);
    }
}

async fn run_one_shot(agent: &ChatAgent, cli: &Cli) -> Result<(), String> {
    let message = match (&cli.message, cli.stdin) {
        (Some(msg), true) => format!("{msg}\n\n{}", read_stdin_content()?),
        (Some(msg), false) => msg.clone(),
        (None, true) => read_stdin_content()?,
        (None, false) => unreachable!("one-shot mode requires --message or --stdin"),
    };

    let outcome = agent
        .chat_turn(&message, &cli.session, &cli.user_type)
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", outcome.reply);
    if let ReplySource::Fallback(reason) = outcome.source {
        eprintln!("  (fallback reply: {reason:?})");
    }
    if cli.show_history {
        println!();
        print_history(agent, &cli.session);
    }
    Ok(())
}

async fn run_repl(agent: &ChatAgent, cli: &Cli) -> Result<(), String> {
    eprintln!(
        "parley REPL — session `{}`, persona `{}`. Commands: /history /info /clear /quit",
        cli.session, cli.user_type
    );

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => return Err(format!("failed to read input: {e}")),
        }
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                print_history(agent, &cli.session);
                continue;
            }
            "/info" => {
                match agent.get_session_info(&cli.session) {
                    Some(info) => println!(
                        "session {} — turns: {}, persona: {}, updated: {}",
                        info.session_id, info.message_count, info.user_type, info.updated_at
                    ),
                    None => println!("session `{}` has no completed turns yet", cli.session),
                }
                continue;
            }
            "/clear" => {
                agent.clear_session(&cli.session);
                println!("session `{}` cleared", cli.session);
                continue;
            }
            _ => {}
        }

        match agent.chat_turn(line, &cli.session, &cli.user_type).await {
            Ok(outcome) => {
                println!("{}", outcome.reply);
                if let ReplySource::Fallback(reason) = outcome.source {
                    eprintln!("  (fallback reply: {reason:?})");
                }
            }
            // Validation errors reject the turn but not the REPL.
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli);

    let mut agent = ChatAgent::new(config);
    if let Err(e) = agent.initialize() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let result = if cli.message.is_some() || cli.stdin {
        run_one_shot(&agent, &cli).await
    } else {
        run_repl(&agent, &cli).await
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
