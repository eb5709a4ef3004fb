mod logging;
mod view;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use courier_core::config::HISTORY_PATH_ENV;
use courier_core::{
    AuthKind, Config, FileStorage, HeaderField, HistoryStore, HttpMethod, RequestSession,
    SessionState, Transport, UreqTransport,
};
use tracing::warn;

use crate::view::TerminalView;

#[derive(Parser)]
#[command(name = "courier", version, about = "Compose, send and inspect HTTP requests")]
struct Cli {
    /// History file. Defaults to `<data dir>/courier/requestHistory.json`.
    #[arg(long, global = true, env = HISTORY_PATH_ENV)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one request and print the response.
    Send(SendArgs),
    /// Show or clear recorded requests.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Clear,
}

#[derive(Args)]
struct SendArgs {
    /// Target URL; `https://` is assumed when no scheme is given.
    url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: HttpMethod,

    /// Header as `Name: value`; repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body, sent verbatim. Ignored for GET.
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Basic auth as `user:password`.
    #[arg(long, conflicts_with_all = ["bearer", "oauth2_token_url"])]
    basic: Option<String>,

    #[arg(long, conflicts_with = "oauth2_token_url")]
    bearer: Option<String>,

    /// Fetch a client-credentials token from this URL before sending.
    #[arg(long, requires_all = ["client_id", "client_secret"])]
    oauth2_token_url: Option<String>,

    #[arg(long)]
    client_id: Option<String>,

    #[arg(long)]
    client_secret: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to read configuration")?;
    logging::init(&config.log_filter, config.json_logs)?;

    let history_path = cli.history.unwrap_or(config.history_path);
    let history = Arc::new(HistoryStore::open(FileStorage::new(history_path)));

    match cli.command {
        Command::Send(args) => send(args, history).await,
        Command::History {
            action: HistoryAction::List,
        } => {
            list_history(&history);
            Ok(ExitCode::SUCCESS)
        }
        Command::History {
            action: HistoryAction::Clear,
        } => {
            history.clear().context("failed to clear history")?;
            eprintln!("History cleared");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn send(args: SendArgs, history: Arc<HistoryStore>) -> Result<ExitCode> {
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::new());
    let view = TerminalView {
        verbose: args.verbose,
    };
    let session = RequestSession::new(transport, history, view);

    session.set_url(args.url);
    session.set_method(args.method);
    for (index, raw) in args.headers.iter().enumerate() {
        let (key, value) = parse_header(raw)?;
        if index > 0 {
            session.add_header();
        }
        session.set_header(index, HeaderField::Key, key);
        session.set_header(index, HeaderField::Value, value);
    }
    if let Some(data) = args.data {
        if args.method == HttpMethod::Get {
            warn!("ignoring request body for GET");
        }
        session.set_body(data);
    }

    let auth = session.auth();
    if let Some(basic) = args.basic {
        let (user, password) = basic.split_once(':').unwrap_or((basic.as_str(), ""));
        auth.set_strategy(AuthKind::Basic);
        auth.set_basic_username(user);
        auth.set_basic_password(password);
    } else if let Some(token) = args.bearer {
        auth.set_strategy(AuthKind::Bearer);
        auth.set_bearer_token(token);
    } else if let Some(token_url) = args.oauth2_token_url {
        auth.set_strategy(AuthKind::OAuth2);
        auth.set_oauth2_token_url(token_url);
        auth.set_oauth2_client_id(args.client_id.unwrap_or_default());
        auth.set_oauth2_client_secret(args.client_secret.unwrap_or_default());
        if session.acquire_oauth2_token().await.is_err() {
            eprintln!("Warning: could not obtain an OAuth2 token; sending without it");
        }
    }

    session.submit().await;

    Ok(match session.state() {
        SessionState::Success => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn list_history(history: &HistoryStore) {
    let entries = history.all();
    if entries.is_empty() {
        println!("No requests made yet.");
        return;
    }
    let now = Utc::now();
    for (index, entry) in entries.iter().enumerate() {
        println!(
            "{index:>2}  {:<6} {}  ({})",
            entry.method,
            entry.url,
            entry.time_ago(now)
        );
    }
}

/// `Name: value` → (`Name`, `value`). A line without a colon is a name with
/// an empty value.
fn parse_header(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw.split_once(':').unwrap_or((raw, ""));
    if key.trim().is_empty() {
        bail!("invalid header {raw:?}: missing name");
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn header_lines_are_split_on_first_colon() {
        assert_eq!(
            parse_header("Accept: application/json").unwrap(),
            ("Accept".to_string(), "application/json".to_string())
        );
        assert_eq!(
            parse_header("X-Url: http://a:b").unwrap(),
            ("X-Url".to_string(), "http://a:b".to_string())
        );
        assert_eq!(
            parse_header("X-Empty").unwrap(),
            ("X-Empty".to_string(), String::new())
        );
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn send_arguments_parse() {
        let cli = Cli::try_parse_from([
            "courier", "send", "example.com/api", "-X", "post", "-H", "A: 1", "-H", "B: 2",
            "-d", "{}", "--bearer", "tok",
        ])
        .unwrap();
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.method, HttpMethod::Post);
        assert_eq!(args.headers, vec!["A: 1", "B: 2"]);
        assert_eq!(args.bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn conflicting_auth_flags_are_rejected() {
        let parsed = Cli::try_parse_from([
            "courier", "send", "x", "--basic", "u:p", "--bearer", "t",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn oauth2_requires_client_credentials() {
        let parsed = Cli::try_parse_from([
            "courier",
            "send",
            "x",
            "--oauth2-token-url",
            "https://auth/token",
        ]);
        assert!(parsed.is_err());
    }
}
