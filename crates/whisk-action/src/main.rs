use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt};
use whisk_client::CallbackClient;
use whisk_core::{BoxError, RuntimeConfig, SharedConfig, WhiskConfig};
use whisk_runtime::{ActionRuntime, ChannelMode, HandlerShape, InvocationChannel};

#[derive(Parser)]
#[command(
    name = "whisk-action",
    about = "whisk action launcher: serves invocations from stdin to the result channel"
)]
struct Cli {
    /// Path to a whisk.toml configuration file
    #[arg(long, env = "WHISK_CONFIG")]
    config: Option<PathBuf>,

    /// Descriptor results are written to (defaults to [channel] result_fd, 3)
    #[arg(long)]
    result_fd: Option<i32>,

    /// Append results to this file instead of a descriptor
    #[arg(long, conflicts_with = "result_fd")]
    result_file: Option<PathBuf>,

    /// Serve exactly one invocation, then exit
    #[arg(long)]
    single_shot: bool,

    /// Which bundled handler to serve
    #[arg(long, value_enum, default_value_t = Action::Greet)]
    action: Action,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    /// {"name": ..} -> {"greeting": ..}
    Greet,
    /// Returns the invocation value unchanged
    Echo,
    /// Invokes another action through the control plane
    Invoke,
}

#[derive(Deserialize)]
struct GreetInput {
    name: Option<String>,
}

#[derive(Serialize)]
struct GreetOutput {
    greeting: String,
}

#[derive(Deserialize)]
struct InvokeInput {
    action: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default = "default_blocking")]
    blocking: bool,
}

fn default_blocking() -> bool {
    true
}

fn greet(input: GreetInput) -> Result<GreetOutput, BoxError> {
    let greeting = match input.name {
        Some(name) => format!("Hello, {name}!"),
        None => "Hello stranger!".to_string(),
    };
    Ok(GreetOutput { greeting })
}

fn handler_for(action: Action, config: &SharedConfig) -> Result<HandlerShape> {
    Ok(match action {
        Action::Greet => HandlerShape::typed(greet),
        Action::Echo => HandlerShape::untyped(|value| Ok(value)),
        Action::Invoke => {
            let client = CallbackClient::new(config.clone())?;
            HandlerShape::typed(move |input: InvokeInput| -> Result<Value, BoxError> {
                let params = input.params.unwrap_or_else(|| json!({}));
                let response = client.invoke_action(&input.action, &params, input.blocking);
                Ok(json!({ "response": response }))
            })
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the action's own prints; results use a separate channel
    fmt()
        .with_env_filter(EnvFilter::from_env("WHISK_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => WhiskConfig::from_file(path)?,
        None => WhiskConfig::default(),
    };
    let file = file.with_overrides(|name| std::env::var(name).ok())?;

    let config = SharedConfig::new(RuntimeConfig::from_env(&file));
    let handler = handler_for(cli.action, &config)?;

    let mode = if cli.single_shot || file.channel.single_shot {
        ChannelMode::SingleShot
    } else {
        ChannelMode::Loop
    };

    let sink = match &cli.result_file {
        Some(path) => tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open result file {}", path.display()))?,
        None => {
            let fd = cli.result_fd.unwrap_or(file.channel.result_fd);
            whisk_runtime::channel::open_result_fd(fd)
                .with_context(|| format!("result descriptor {fd} is not open"))?
        }
    };

    tracing::info!(
        shape = handler.kind(),
        single_shot = mode == ChannelMode::SingleShot,
        "Starting whisk action runtime"
    );

    let runtime = ActionRuntime::new(config, handler);
    let mut channel = InvocationChannel::new(BufReader::new(tokio::io::stdin()), sink, mode);
    runtime.serve(&mut channel).await?;

    Ok(())
}
