//! bucketsum MCP server: entry point.

use std::path::Path;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use bucketsum::{GroupType, MemoryStore, TimeWindow};

use bucketsum_mcp::config::{resolve_config_path, ServerConfig};
use bucketsum_mcp::protocol::ProtocolHandler;
use bucketsum_mcp::session::AggregationSession;
use bucketsum_mcp::tools::ToolRegistry;
use bucketsum_mcp::transport::StdioTransport;
use bucketsum_mcp::types::McpError;

#[derive(Parser)]
#[command(
    name = "bucketsum-mcp",
    about = "MCP server for bucketsum: gap-free, time-bucketed sums over MongoDB",
    version
)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Serve from an in-process store instead of MongoDB.
    #[arg(long, global = true)]
    memory: bool,

    /// JSON array of {dt, value} points to load into the in-process store.
    #[arg(long, global = true, requires = "memory")]
    seed: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Run one aggregation and print {dataset, labels}.
    Query {
        /// Inclusive start, YYYY-MM-DDTHH:MM:SS.
        dt_from: String,

        /// Inclusive end, YYYY-MM-DDTHH:MM:SS.
        dt_upto: String,

        /// hour, day or month; anything else groups by month.
        #[arg(default_value = "month")]
        group_type: String,

        /// Skip gap-fill and leave the store untouched.
        #[arg(long)]
        no_fill: bool,
    },

    /// Answer one chat message carrying a JSON request.
    Ask {
        /// e.g. '{"dt_from": "2022-09-01T00:00:00", "dt_upto": "2022-12-31T23:59:00", "group_type": "month"}'
        message: String,
    },

    /// Verify the store is reachable and the collection exists.
    Check,

    /// Print server capabilities as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   bucketsum-mcp completions bash > ~/.local/share/bash-completion/completions/bucketsum-mcp
    ///   bucketsum-mcp completions zsh > ~/.zfunc/_bucketsum-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive chat REPL.
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = ServerConfig::load(config_path.as_deref());

    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            let session = open_session(&cli, config).await?;
            let handler = ProtocolHandler::new(Arc::new(session));
            let transport = StdioTransport::new(handler);
            transport.run().await?;
        }

        Commands::Query {
            dt_from,
            dt_upto,
            group_type,
            no_fill,
        } => {
            let session = open_session(&cli, config).await?;
            let group_type = GroupType::parse(group_type);
            let engine = session.engine();

            let outcome = if *no_fill {
                match TimeWindow::parse(dt_from, dt_upto) {
                    Ok(window) => engine.aggregate(&window, group_type.resolve()).await,
                    Err(e) => Err(e),
                }
            } else {
                engine.get_aggregated_data(dt_from, dt_upto, &group_type).await
            };
            session.close().await?;

            match outcome {
                Ok(result) => {
                    if let Some(warning) = group_type.warning() {
                        eprintln!("Warning: {warning}");
                    }
                    println!("{}", serde_json::to_string(&result)?);
                }
                Err(e) => {
                    eprintln!("{}", McpError::from(e));
                    std::process::exit(1);
                }
            }
        }

        Commands::Ask { message } => {
            let session = open_session(&cli, config).await?;
            let outcome = bucketsum_mcp::repl::reply(&session, message).await;
            session.close().await?;

            match outcome {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Check => {
            let namespace = config.namespace();
            let opened = if cli.memory {
                memory_session(cli.seed.as_deref(), config).await
            } else {
                AggregationSession::try_connect(config).await
            };
            match opened {
                Ok(session) => {
                    let status = session.status();
                    println!("Store reachable: {}", status.endpoint.unwrap_or_default());
                    println!("  Collection: {}", status.namespace);
                    session.close().await?;
                }
                Err(e) => {
                    eprintln!("Store check failed for {namespace}: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Info => {
            let capabilities = bucketsum_mcp::types::InitializeResult::default_result();
            let tools = ToolRegistry::list_tools();
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
                "config": config,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "bucketsum-mcp", &mut std::io::stdout());
        }

        Commands::Repl => {
            let session = open_session(&cli, config).await?;
            bucketsum_mcp::repl::run(Arc::new(session)).await?;
        }
    }

    Ok(())
}

/// MongoDB sessions come up detached on failure; in-memory ones fail loudly
/// since their only input is local.
async fn open_session(cli: &Cli, config: ServerConfig) -> anyhow::Result<AggregationSession> {
    if cli.memory {
        Ok(memory_session(cli.seed.as_deref(), config).await?)
    } else {
        Ok(AggregationSession::connect(config).await)
    }
}

async fn memory_session(
    seed: Option<&str>,
    config: ServerConfig,
) -> Result<AggregationSession, McpError> {
    let store = MemoryStore::new();
    store.create_collection(&config.database_name, &config.collection_name)?;
    if let Some(seed) = seed {
        store.seed_from_file(&config.database_name, &config.collection_name, Path::new(seed))?;
    }
    AggregationSession::open_memory(store, config).await
}
