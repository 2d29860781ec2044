//! Chat-style REPL over the aggregation engine.
//!
//! Launch with `bucketsum-mcp repl`. Each line holding a JSON request such as
//! `{"dt_from": "2022-09-01T00:00:00", "dt_upto": "2022-12-31T23:59:00", "group_type": "month"}`
//! is answered with `{"dataset": [...], "labels": [...]}`. Type `/help` for
//! commands.

use std::sync::Arc;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use bucketsum::AggregationRequest;

use crate::session::AggregationSession;
use crate::tools::ToolRegistry;
use crate::types::McpError;

const COMMANDS: &[(&str, &str)] = &[
    ("/info", "Show server capabilities and tools"),
    ("/tools", "List available MCP tools"),
    ("/check", "Show the store connection"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// Completion of the request body after an opening brace.
const REQUEST_TEMPLATE: &str =
    r#""dt_from": "2022-09-01T00:00:00", "dt_upto": "2022-12-31T23:59:00", "group_type": "month"}"#;

struct ChatHelper;

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];
        if !input.starts_with('/') || input.contains(' ') {
            return Ok((pos, Vec::new()));
        }

        let matches: Vec<Pair> = COMMANDS
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(input))
            .map(|(cmd, desc)| Pair {
                display: format!("{cmd:<16} {desc}"),
                replacement: format!("{cmd} "),
            })
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line == "{" {
            return Some(REQUEST_TEMPLATE.to_string());
        }
        if line.starts_with('/') && !line.contains(' ') {
            return COMMANDS
                .iter()
                .find(|(cmd, _)| cmd.starts_with(line) && *cmd != line)
                .map(|(cmd, _)| cmd[line.len()..].to_string());
        }
        None
    }
}

impl Highlighter for ChatHelper {}
impl Validator for ChatHelper {}
impl Helper for ChatHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Run the REPL until `/exit` or EOF.
pub async fn run(session: Arc<AggregationSession>) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mbucketsum v{}\x1b[0m \x1b[90m\u{2014} time-bucketed sums\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Send a JSON request, or press \x1b[36m/\x1b[0m to browse commands, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<ChatHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(ChatHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".bucketsum_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mbucketsum>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let Some(input) = line.strip_prefix('/') else {
                    answer(&session, line).await;
                    continue;
                };

                match input.split_whitespace().next().unwrap_or("") {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "" | "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "info" => cmd_info(),
                    "tools" => cmd_tools(),
                    "check" => cmd_check(&session),
                    cmd => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);
    session.close().await?;

    Ok(())
}

/// Reply to one chat message the way a bot would: the dataset, or a
/// message the user can act on.
async fn answer(session: &AggregationSession, message: &str) {
    match reply(session, message).await {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("  {e}"),
    }
}

/// The text sent back for one chat message.
pub async fn reply(session: &AggregationSession, message: &str) -> Result<String, McpError> {
    let request = AggregationRequest::parse_message(message)?;
    if let Some(warning) = request.group_type.warning() {
        eprintln!("  \x1b[33m!\x1b[0m {warning}");
    }
    let result = session.engine().run(&request).await?;
    Ok(serde_json::to_string(&result)?)
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Anything else is read as a request:");
    eprintln!("    {{{REQUEST_TEMPLATE}");
    eprintln!();
}

fn cmd_info() {
    let capabilities = crate::types::InitializeResult::default_result();
    let tools = ToolRegistry::list_tools();
    eprintln!();
    eprintln!(
        "  Server:   {} v{}",
        capabilities.server_info.name, capabilities.server_info.version
    );
    eprintln!("  Protocol: {}", capabilities.protocol_version);
    eprintln!("  Tools:    {}", tools.len());
    eprintln!();
}

fn cmd_tools() {
    let tools = ToolRegistry::list_tools();
    eprintln!();
    eprintln!("  {} MCP tools available:", tools.len());
    eprintln!();
    for tool in &tools {
        eprintln!(
            "    {:<22} {}",
            tool.name,
            tool.description.as_deref().unwrap_or("")
        );
    }
    eprintln!();
}

fn cmd_check(session: &AggregationSession) {
    let status = session.status();
    eprintln!();
    match (&status.endpoint, &status.error) {
        (Some(endpoint), _) => {
            eprintln!("  Connected: {endpoint}");
            eprintln!("  Collection: {}", status.namespace);
        }
        (None, Some(error)) => {
            eprintln!("  Not connected ({})", status.namespace);
            eprintln!("    {error}");
        }
        (None, None) => eprintln!("  Not connected ({})", status.namespace),
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use bucketsum::{parse_timestamp, MemoryStore, TimeSeriesPoint};

    async fn seeded_session() -> AggregationSession {
        let config = ServerConfig::default();
        let store = MemoryStore::new();
        store
            .insert_many(
                &config.database_name,
                &config.collection_name,
                vec![TimeSeriesPoint::new(
                    parse_timestamp("2022-09-15T05:00:00").unwrap(),
                    3,
                )],
            )
            .unwrap();
        AggregationSession::open_memory(store, config).await.unwrap()
    }

    #[tokio::test]
    async fn test_reply_with_dataset() {
        let session = seeded_session().await;
        let text = reply(
            &session,
            r#"{"dt_from": "2022-09-15T00:00:00", "dt_upto": "2022-09-15T23:59:59", "group_type": "day"}"#,
        )
        .await
        .unwrap();
        assert_eq!(text, r#"{"dataset":[3],"labels":["2022-09-15T00:00:00"]}"#);
    }

    #[tokio::test]
    async fn test_reply_to_chatter_is_usage_error() {
        let session = seeded_session().await;
        let err = reply(&session, "how much did we sell?").await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
        assert!(err.to_string().contains("dt_from"));
    }
}
