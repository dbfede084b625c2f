//! rill - streaming chat client CLI

mod config;

use clap::Parser;
use std::sync::Arc;

use rill_chat::{ChatClient, ChatConfig, ChatEvent, FailureKind, HttpTransport, SessionOutcome};
use rill_wire::{ClientConfig, StreamMode};

/// rill - streaming chat client
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One-shot query; omit to start an interactive session
    query: Option<String>,

    /// Streaming endpoint URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Response framing (ndjson, text)
    #[arg(short, long)]
    mode: Option<String>,

    /// Conversation id sent with ndjson requests
    #[arg(short, long)]
    session_id: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn parse_mode(s: &str) -> StreamMode {
    match s.to_lowercase().as_str() {
        "text" => StreamMode::Text,
        _ => StreamMode::Ndjson,
    }
}

fn mode_name(mode: StreamMode) -> &'static str {
    match mode {
        StreamMode::Ndjson => "ndjson",
        StreamMode::Text => "text",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("rill=debug")
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file
    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let endpoint = match args.endpoint.or(cfg.endpoint.clone()) {
        Some(endpoint) => endpoint,
        None => {
            eprintln!("Error: No endpoint configured");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  1. Pass one: rill --endpoint http://localhost:8000/api/chat/stream");
            eprintln!("  2. Create a config file: rill --init-config");
            std::process::exit(1);
        }
    };

    let mode = args
        .mode
        .or(cfg.mode.clone())
        .map(|s| parse_mode(&s))
        .unwrap_or(StreamMode::Ndjson);

    let mut chat_config = ChatConfig::new(mode);
    if let Some(session_id) = args.session_id.or(cfg.session_id.clone()) {
        chat_config = chat_config.with_session_id(session_id);
    }

    let mut client_config = ClientConfig::new(endpoint);
    client_config.headers = cfg.headers.clone();

    let transport = Arc::new(HttpTransport::new(client_config));
    let mut client = ChatClient::new(chat_config, transport);

    // One-shot mode
    if let Some(query) = args.query {
        return run_query(&mut client, &query).await;
    }

    // Interactive mode
    run_interactive(&mut client, mode).await
}

async fn run_query(client: &mut ChatClient, query: &str) -> anyhow::Result<()> {
    let receiver = client.subscribe();
    let printer = tokio::spawn(print_events(receiver));

    // Ctrl-C stops the in-flight session; the outcome reports Cancelled
    let handle = client.handle();
    let ctrl_c = tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.stop();
            }
        }
    });

    let outcome = client.send(query).await?;

    // Wait a bit for final events
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    printer.abort();
    ctrl_c.abort();

    if matches!(outcome, SessionOutcome::Failed { .. }) {
        std::process::exit(1);
    }

    Ok(())
}

async fn run_interactive(client: &mut ChatClient, mode: StreamMode) -> anyhow::Result<()> {
    use std::io::{self, Write};

    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!(
            "rill ({}) session: {}",
            mode_name(mode),
            client.config().session_id
        );
        eprintln!("Type 'exit' to leave, 'clear' to reset the conversation.");
        eprintln!();
    }

    let receiver = client.subscribe();
    let printer = tokio::spawn(print_events(receiver));

    let handle = client.handle();
    let ctrl_c = tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.stop();
            }
        }
    });

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == "exit" || input == "quit" {
            break;
        }

        if input == "clear" {
            client.clear();
            println!("Cleared conversation.");
            continue;
        }

        if let Err(e) = client.send(input).await {
            eprintln!("Error: {}", e);
        }

        // Wait for events to finish
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        println!();
    }

    printer.abort();
    ctrl_c.abort();

    Ok(())
}

async fn print_events(mut receiver: tokio::sync::broadcast::Receiver<ChatEvent>) {
    use std::io::Write;

    while let Ok(event) = receiver.recv().await {
        match event {
            ChatEvent::MessageStart { message, .. } => {
                let text = message.text();
                if !text.is_empty() {
                    print!("{}", text);
                    std::io::stdout().flush().ok();
                }
            }
            ChatEvent::MessageDelta { delta, .. } => {
                print!("{}", delta);
                std::io::stdout().flush().ok();
            }
            ChatEvent::MessageEnd { message, .. } => {
                if !message.text().is_empty() {
                    println!();
                }
            }
            ChatEvent::MalformedRecord { raw, .. } => {
                eprintln!("[skipped malformed record: {}]", raw);
            }
            ChatEvent::SessionEnd { outcome, .. } => {
                print_outcome(&outcome);
            }
            _ => {}
        }
    }
}

fn print_outcome(outcome: &SessionOutcome) {
    match outcome {
        SessionOutcome::Completed { finish_reason } => {
            if let Some(reason) = finish_reason {
                tracing::debug!(%reason, "session completed");
            }
        }
        SessionOutcome::Cancelled => {
            println!("[stopped]");
        }
        SessionOutcome::Failed {
            kind: FailureKind::EmptyStream,
            ..
        } => {
            eprintln!("[no response from server]");
        }
        SessionOutcome::Failed { reason, .. } => {
            eprintln!("[request failed: {}]", reason);
        }
    }
}
