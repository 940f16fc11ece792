use std::path::Path;

use chatlink::client::ChatClient;
use chatlink::config::{ClientConfig, ConfigError};
use chatlink::controller::ChatUpdate;
use chatlink::error::ChatError;
use chatlink::message_log::{MessageEntry, STATUS_SENDER, Severity, USER_SENDER};
use chatlink::upload::UploadClient;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Chat(#[from] ChatError),
}

#[derive(Parser, Debug)]
#[command(name = "chatlink", about = "Terminal chat client for a WebSocket agent backend")]
struct Cli {
    /// Backend WebSocket URL.
    #[arg(long, env = "CHATLINK_WS_URL")]
    url: Option<String>,

    /// Media upload endpoint.
    #[arg(long, env = "CHATLINK_UPLOAD_URL")]
    upload_url: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Upload(&'a str),
    Text(&'a str),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.url {
        config.ws_url = url;
    }
    if let Some(upload_url) = cli.upload_url {
        config.upload_url = upload_url;
    }
    config.validate()?;

    let uploader = UploadClient::new(config.upload_url.clone(), config.upload_timeout)?;
    let ChatClient { handle, updates, task } = ChatClient::spawn(&config);
    tracing::info!(url = %config.ws_url, "chatlink started");

    let printer = tokio::spawn(print_updates(updates));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Upload(path) => {
                let result = uploader.upload_file(Path::new(path)).await;
                if let Err(e) = handle.report_upload_result(result).await {
                    eprintln!("{e}");
                }
            }
            Input::Text(text) => {
                handle.send_user_text(text).await?;
            }
        }
    }

    handle.stop().await?;
    let _ = task.await;
    let _ = printer.await;
    Ok(())
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed == "/quit" {
        return Input::Quit;
    }
    if let Some(path) = trimmed.strip_prefix("/upload ") {
        let path = path.trim();
        if !path.is_empty() {
            return Input::Upload(path);
        }
    }
    Input::Text(line)
}

async fn print_updates(mut updates: broadcast::Receiver<ChatUpdate>) {
    loop {
        match updates.recv().await {
            Ok(ChatUpdate::Appended(entry)) => println!("{}", render_entry(&entry)),
            Ok(ChatUpdate::ConnectionChanged(state)) => tracing::debug!(?state, "connection state changed"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "transcript output fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn render_entry(entry: &MessageEntry) -> String {
    if entry.sender == USER_SENDER {
        return format!("> {}", entry.text);
    }
    let marker = match entry.severity {
        Severity::Normal => "",
        Severity::Success => " [ok]",
        Severity::Error => " [error]",
        Severity::Warning => " [input requested]",
    };
    if entry.sender == STATUS_SENDER {
        return format!("-- {}{marker}", entry.text);
    }
    format!("[{}]{marker} {}", entry.sender, entry.text)
}
