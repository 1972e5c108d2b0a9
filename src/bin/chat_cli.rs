//! chat-cli: 命令行聊天客户端
//!
//! Usage:
//!   chat-cli send <text...>      Send a message and print the reply as it streams in
//!   chat-cli history             Show the stored transcript
//!   chat-cli clear               Clear the stored transcript
//!   chat-cli help                Show usage

use ai_chat_client::types::format_message_time;
use ai_chat_client::{ChatClient, ChatSession, ClientConfig, Sender};
use anyhow::Context;
use chrono::Utc;
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "send" => cmd_send(&args[2..]).await,
        "history" => cmd_history().await,
        "clear" => cmd_clear().await,
        "version" | "--version" | "-V" => {
            println!("chat-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"chat-cli: single-conversation AI chat

USAGE:
    chat-cli <COMMAND> [ARGS]

COMMANDS:
    send <text...>      Send a message; the reply is printed as it streams in
    history             Show the stored transcript
    clear               Clear the stored transcript
    version             Show version information
    help                Show this help message

ENVIRONMENT:
    CHAT_CONFIG                 YAML config file
    CHAT_ENDPOINT_URL           Completion endpoint (required for send)
    CHAT_API_KEY                Bearer credential (falls back to the OS keyring)
    CHAT_PROBE_URL              Reachability probe URL, or "none"
    CHAT_STORAGE_DIR            Directory for the persisted transcript
    CHAT_MAX_RETRIES            Retries after the first attempt (default 3)
    RUST_LOG                    Log filter (default info)"#
    );
}

async fn client() -> anyhow::Result<ChatClient> {
    let mut config = ClientConfig::from_env().context("loading configuration")?;
    if config.storage.dir.is_none() {
        config.storage.dir = Some(std::env::temp_dir().join("ai-chat-client"));
    }
    let client = ChatClient::builder()
        .config(config)
        .build()
        .await
        .context("building chat client")?;
    Ok(client)
}

/// Prints only what was not printed yet; a retry starts over on a fresh line.
struct Printer {
    printed: usize,
}

impl ai_chat_client::TextObserver for Printer {
    fn on_text(&mut self, accumulated: &str) -> anyhow::Result<()> {
        if let Some(delta) = accumulated.get(self.printed..) {
            print!("{}", delta);
            std::io::stdout().flush()?;
        }
        self.printed = accumulated.len();
        Ok(())
    }

    fn on_retry(&mut self, attempt: u32, delay: Duration) -> anyhow::Result<()> {
        if self.printed > 0 {
            println!();
        }
        eprintln!("retrying (attempt {}) in {}ms...", attempt + 1, delay.as_millis());
        self.printed = 0;
        Ok(())
    }
}

async fn cmd_send(args: &[String]) -> anyhow::Result<()> {
    let text = args.join(" ");
    if text.trim().is_empty() {
        anyhow::bail!("nothing to send: usage is `chat-cli send <text...>`");
    }

    let mut session = ChatSession::load(client().await?).await;
    let mut printer = Printer { printed: 0 };
    match session.submit(&text, Some(&mut printer)).await {
        Ok(Some(reply)) => {
            if let Some(rest) = reply.content.get(printer.printed..) {
                print!("{}", rest);
            }
            println!();
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(failure) => {
            if printer.printed > 0 {
                println!();
            }
            eprintln!("{}", failure.notice.text);
            if failure.notice.can_retry() {
                eprintln!("(run the same command again to retry)");
            }
            Err(anyhow::Error::new(failure.error).context("send failed"))
        }
    }
}

async fn cmd_history() -> anyhow::Result<()> {
    let client = client().await?;
    let now = Utc::now();
    let history = client.history().await;
    if history.is_empty() {
        println!("(no messages)");
    }
    for message in history {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Ai => "ai",
        };
        println!(
            "[{}] {}: {}",
            format_message_time(message.timestamp, now),
            who,
            message.content
        );
    }
    Ok(())
}

async fn cmd_clear() -> anyhow::Result<()> {
    client().await?.clear_history().await?;
    println!("Chat cleared");
    Ok(())
}
