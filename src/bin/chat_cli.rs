//! chat-cli — 向 OpenAI 兼容端点发送单轮对话的命令行工具
//!
//! Usage:
//!   chat-cli [--config <path>] [--model <id>] [--system <prompt>] [--no-stream] <message...>
//!
//! Ctrl-C cancels the running request and keeps whatever text already arrived.

use std::io::Write;
use std::path::PathBuf;

use ai_chat_core::{ChatClient, ChatConfig, Orchestrator};
use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    model: Option<String>,
    system: Option<String>,
    no_stream: bool,
    message: String,
}

fn print_usage() {
    println!(
        r#"chat-cli — 单轮对话命令行工具

USAGE:
    chat-cli [OPTIONS] <message...>

OPTIONS:
    --config <path>     YAML configuration file
    --model <id>        Model id (overrides configuration)
    --system <prompt>   System prompt sent before the conversation
    --no-stream         Wait for the full response instead of streaming
    -h, --help          Show this help message

ENVIRONMENT:
    AI_CHAT_BASE_URL, AI_CHAT_MODEL, AI_HTTP_TIMEOUT_SECS, AI_HTTP_READ_TIMEOUT_SECS,
    AI_HTTP_CONNECT_TIMEOUT_SECS, AI_PROXY_URL, <PROVIDER>_API_KEY, RUST_LOG"#
    );
}

/// `Ok(None)` means help was requested.
fn parse_args(argv: &[String]) -> anyhow::Result<Option<Args>> {
    let mut args = Args::default();
    let mut words = Vec::new();
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--model" => args.model = Some(iter.next().context("--model needs a value")?.clone()),
            "--system" => {
                args.system = Some(iter.next().context("--system needs a value")?.clone())
            }
            "--no-stream" => args.no_stream = true,
            "--" => words.extend(iter.by_ref().cloned()),
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            word => words.push(word.to_string()),
        }
    }

    if words.is_empty() {
        bail!("missing message");
    }
    args.message = words.join(" ");
    Ok(Some(args))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    let config = ChatConfig::load(args.config.as_deref()).context("loading configuration")?;
    let client = ChatClient::new(config).context("building client")?;

    let mut options = client.default_options();
    if let Some(model) = args.model {
        options.model = model;
    }
    if args.no_stream {
        options.streaming = false;
    }

    let mut chat = Orchestrator::new(&client).with_options(options);
    chat.submit_user_turn(args.message, args.system.as_deref())?;

    if let Some(cancel) = chat.cancel_handle() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let mut stdout = std::io::stdout();
    let mut printed = String::new();
    while chat.process_next_update().await {
        let Some(text) = chat.messages().last().map(|m| m.text()) else {
            continue;
        };
        // Print only what was added since the last update; the final turn may
        // rewrite the text (error or cancel marker), which is printed as-is.
        match text.strip_prefix(printed.as_str()) {
            Some(rest) => write!(stdout, "{rest}")?,
            None => write!(stdout, "\n{text}")?,
        }
        stdout.flush()?;
        printed = text;
    }
    writeln!(stdout)?;
    Ok(())
}
