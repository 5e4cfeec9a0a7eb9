mod commands;
mod config;
mod error;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mcp::{Session, SessionConfig};
use runtime::{OpenAiBackend, Orchestrator, SessionConnector};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::DirectCommand;
use config::Config;
use error::Result;

const DEFAULT_LOG_FILTER: &str = "skiff=info,runtime=info,mcp=info";

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Ask an LLM questions it can answer with MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./skiff.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive query session
    Chat {
        /// SSE endpoint of the tool server
        url: Option<String>,
    },
    /// Answer a single query and exit
    Ask {
        query: String,
        /// SSE endpoint of the tool server
        #[arg(long)]
        url: Option<String>,
    },
    /// Call the greet and calculate tools directly
    Call {
        /// SSE endpoint of the tool server
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok());

    match cli.command {
        None => cmd_chat(&config, None).await,
        Some(Commands::Chat { url }) => cmd_chat(&config, url).await,
        Some(Commands::Ask { query, url }) => cmd_ask(&config, url, &query).await,
        Some(Commands::Call { url }) => cmd_call(&config, url).await,
    }
}

async fn connect(config: &Config, url: Option<String>) -> Result<SessionConnector<Session>> {
    let (url, defaulted) = config.server_url(url);
    if defaulted {
        println!("No server URL provided, using default: {url}");
    }

    let session_config = SessionConfig::new(url).with_timeout(config.timeout());
    Ok(SessionConnector::connect(session_config).await?)
}

fn orchestrator(config: &Config) -> Orchestrator<OpenAiBackend> {
    let backend = OpenAiBackend::builder(config.backend.api_key.clone(), &config.backend.model)
        .base_url(&config.backend.base_url)
        .build();
    info!(backend = %backend, "completion backend configured");

    Orchestrator::new(backend)
        .with_system_prompt(&config.agent.system_prompt)
        .with_tool_error_policy(config.agent.on_tool_error)
}

async fn cmd_chat(config: &Config, url: Option<String>) -> Result<()> {
    let mut connector = connect(config, url).await?;
    let orchestrator = orchestrator(config);

    println!("skiff v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(session) = connector.handle()
        && let Some(init) = session.server_info()
    {
        let server = &init.server_info;
        println!(
            "Server: {} {}",
            server.name,
            server.version.as_deref().unwrap_or("")
        );
    }
    println!(
        "Tools: {}",
        connector
            .tools()
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Type your queries or 'exit' to quit.");

    let mut input = Prompt::new();
    let outcome = loop {
        let line = match input.read("\nQuery: ").await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break Ok(());
        }

        let response = orchestrator.respond(&connector, query).await;
        println!("\n{response}");
    };

    connector.close().await;
    outcome
}

async fn cmd_ask(config: &Config, url: Option<String>, query: &str) -> Result<()> {
    let mut connector = connect(config, url).await?;
    let orchestrator = orchestrator(config);

    let outcome = orchestrator.process(&connector, query).await;
    connector.close().await;

    println!("{}", outcome?);
    Ok(())
}

async fn cmd_call(config: &Config, url: Option<String>) -> Result<()> {
    let mut connector = connect(config, url).await?;

    println!("Available commands:");
    println!("  {}", commands::GREET_USAGE);
    println!("  {}", commands::CALC_USAGE);
    println!("  exit");

    let mut input = Prompt::new();
    let outcome = loop {
        let line = match input.read("\n> ").await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        let (tool, arguments) = match DirectCommand::parse(&line) {
            Ok(DirectCommand::Empty) => continue,
            Ok(DirectCommand::Exit) => break Ok(()),
            Ok(DirectCommand::Call { tool, arguments }) => (tool, arguments),
            Err(e) => {
                println!("Error: {e}");
                continue;
            }
        };

        match connector.call_tool(tool, &arguments).await {
            Ok(result) => println!("Result: {result}"),
            Err(e) => println!("Error: {e}"),
        }
    };

    connector.close().await;
    outcome
}

/// Line reader over stdin that treats Ctrl-C like end of input.
struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `prompt` and wait for a line. `None` on EOF or Ctrl-C.
    async fn read(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        std::io::stdout().flush()?;

        tokio::select! {
            line = self.lines.next_line() => Ok(line?),
            _ = tokio::signal::ctrl_c() => {
                println!();
                Ok(None)
            }
        }
    }
}
