//! Terminal front ends for streamed chat and summary answers.

mod chat;
mod summary;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use delta_stream::init_observability;
use delta_stream::prelude::*;
use tracing::{info, warn};

use crate::chat::ChatView;
use crate::summary::SummaryView;

#[derive(Debug, Parser)]
#[command(name = "delta-stream", version, about = "Stream model answers into the terminal")]
struct Cli {
    /// Streaming endpoint (overrides DELTA_STREAM_ENDPOINT).
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Extra request header, repeatable.
    #[arg(long = "header", value_name = "NAME:VALUE", global = true, value_parser = parse_header)]
    headers: Vec<(String, String)>,
    /// Cancel the stream after this many seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask a question and stream the answer.
    Chat {
        /// The user message.
        message: String,
        /// Optional system prompt sent before the message.
        #[arg(long)]
        system: Option<String>,
        /// Model name forwarded in the payload.
        #[arg(long)]
        model: Option<String>,
    },
    /// Stream a summary, showing the model's reasoning while it works.
    Summary {
        /// Prompt to summarise; without it the endpoint picks its own.
        #[arg(long)]
        prompt: Option<String>,
        /// Model name forwarded in the payload.
        #[arg(long)]
        model: Option<String>,
        /// Issue a GET instead of a POST (no body is sent).
        #[arg(long)]
        get: bool,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name must not be empty".into());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn chat_payload(
    message: &str,
    system: Option<&str>,
    model: Option<&str>,
) -> Result<ChatPayload, ClientError> {
    if message.trim().is_empty() {
        return Err(ClientError::Validation("message must not be empty".into()));
    }
    let mut payload = ChatPayload::default();
    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        payload = payload.message(ChatMessage::system(system));
    }
    payload = payload.message(ChatMessage::user(message));
    if let Some(model) = model {
        payload = payload.field("model", serde_json::Value::String(model.to_string()));
    }
    payload.validate_for_chat()?;
    Ok(payload)
}

fn summary_payload(prompt: Option<&str>, model: Option<&str>) -> Option<ChatPayload> {
    let prompt = prompt.filter(|p| !p.trim().is_empty())?;
    let mut payload = ChatPayload::new(vec![ChatMessage::user(prompt)]);
    if let Some(model) = model {
        payload = payload.field("model", serde_json::Value::String(model.to_string()));
    }
    Some(payload)
}

async fn run(cli: Cli) -> anyhow::Result<StreamOutcome> {
    let mut config = ClientConfig::from_env()?;
    if let Some(endpoint) = cli.endpoint {
        config = config.endpoint(endpoint);
        config.validate()?;
    }
    let manager = StreamManager::new(Arc::new(ReqwestTransport::new(&config)?));
    let builder = config.request().headers(cli.headers);

    let handle = match cli.command {
        Command::Chat {
            message,
            system,
            model,
        } => {
            let payload = chat_payload(&message, system.as_deref(), model.as_deref())?;
            let mut view = ChatView::new(std::io::stdout());
            view.echo_user(payload.last_user_message().unwrap_or(&message));
            manager.start(builder.body(payload).build()?, view)?
        }
        Command::Summary { prompt, model, get } => {
            let mut builder = builder;
            if get {
                builder = builder.method(Method::GET);
            }
            if let Some(payload) = summary_payload(prompt.as_deref(), model.as_deref()) {
                builder = builder.body(payload);
            }
            manager.start(builder.build()?, SummaryView::new(std::io::stdout()))?
        }
    };

    let timeout = cli.timeout_secs.map(Duration::from_secs);
    Ok(supervise(&manager, handle, timeout).await?)
}

/// Waits for the stream, cancelling it on Ctrl-C or when `timeout` elapses.
async fn supervise(
    manager: &StreamManager,
    handle: StreamHandle,
    timeout: Option<Duration>,
) -> Result<StreamOutcome, ClientError> {
    supervise_until(manager, handle, timeout, tokio::signal::ctrl_c()).await
}

/// Like `supervise`, with the interrupt source supplied by the caller.
///
/// An interrupt that resolves to `Err` (no signal handler) is logged and
/// ignored; only `Ok(())` cancels the stream.
async fn supervise_until(
    manager: &StreamManager,
    handle: StreamHandle,
    timeout: Option<Duration>,
    interrupt: impl Future<Output = io::Result<()>>,
) -> Result<StreamOutcome, ClientError> {
    let finish = handle.finish();
    tokio::pin!(finish);
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };
    let interrupted = async {
        if let Err(err) = interrupt.await {
            warn!(error = %err, "cannot listen for Ctrl-C; only the timeout can cancel");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        outcome = &mut finish => return outcome,
        () = interrupted => {
            info!("interrupted; cancelling stream");
            manager.cancel();
        }
        () = deadline => {
            warn!(?timeout, "stream timed out; cancelling");
            manager.cancel();
        }
    }
    finish.await
}

fn exit_status(outcome: &StreamOutcome) -> u8 {
    match outcome {
        StreamOutcome::Completed { .. } => 0,
        StreamOutcome::Failed(_) => 1,
        StreamOutcome::Aborted => 130,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_observability();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(outcome) => ExitCode::from(exit_status(&outcome)),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
