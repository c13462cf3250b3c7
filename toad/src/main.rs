//! `toad`: command-line client for on-chain kanban boards.
//!
//! Reads boards through a JSON-RPC node, asks the assistant about a board,
//! and prints contract calls as JSON for an external wallet to sign.
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/toad/config.toml`).
//!
//! ```bash
//! # List the boards an address can see
//! toad --package-id 0x.. --registry-id 0x.. --address 0x.. boards
//!
//! # Show one board
//! toad board 0xb0a4d..
//!
//! # Build a call for the wallet
//! toad tx move-task --board 0xb0a4d.. --task 0x7a5c.. --column "In Progress"
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use toad::assistant::{AssistantBridge, GeminiBackend};
use toad::chain::ChainError;
use toad::chain::rpc::RpcClient;
use toad::config::{CliArgs, ClientConfig, ConfigError};
use toad::crypto::{CryptoError, PayloadKey};
use toad::identity::{self, Identity, IdentityError, LoginSession, SessionStore};
use toad::mapper;
use toad::store::{BoardStore, Snapshot, StoreError};
use toad::views;
use toad_proto::call::MoveCall;
use toad_proto::contract::CreateTaskParams;
use toad_proto::model::{Board, Priority, Role};
use toad_proto::object::{Address, ObjectId, TransactionDigest};

#[derive(Parser, Debug)]
#[command(version, about = "Kanban boards stored on chain")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the boards the identity can see.
    Boards,
    /// Print one board with its columns and tasks.
    Board {
        /// Board object id.
        id: String,
        /// Print the assistant snapshot as JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// Status counts and completion rate of a board.
    Analytics {
        /// Board object id.
        id: String,
    },
    /// Tasks due in one month, by day.
    Calendar {
        /// Board object id.
        id: String,
        /// Month as `YYYY-MM` (default: current month).
        #[arg(long)]
        month: Option<String>,
    },
    /// Tasks with due dates, earliest first.
    Timeline {
        /// Board object id.
        id: String,
    },
    /// Ask the assistant a question about a board.
    Ask {
        /// The question.
        text: String,
        /// Board to use as context.
        #[arg(long)]
        board: Option<String>,
    },
    /// Print a contract call as JSON for an external signer.
    #[command(subcommand)]
    Tx(TxCommand),
    /// Wait for a transaction to become final and print its receipt.
    Wait {
        /// Transaction digest.
        digest: String,
    },
    /// Generate a key for encrypted task bodies.
    Keygen,
    /// Print the token-login authorization URL and its nonce.
    LoginUrl {
        /// OAuth client id.
        #[arg(long, env = "TOAD_OAUTH_CLIENT_ID")]
        client_id: String,
        /// Redirect URI registered for the client.
        #[arg(long, default_value = "http://localhost:5173/auth/callback")]
        redirect_uri: String,
    },
    /// Complete a token login with the returned id token.
    Login {
        /// The id token (JWT).
        #[arg(long)]
        jwt: String,
        /// The nonce printed by `login-url`.
        #[arg(long)]
        nonce: String,
    },
    /// Forget the saved token login.
    Logout,
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    /// `create_board`
    CreateBoard {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Column names (default columns when omitted).
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// `create_task`
    CreateTask {
        #[arg(long)]
        board: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Column title.
        #[arg(long, default_value = "Backlog")]
        column: String,
        #[arg(long)]
        priority: Option<Priority>,
        /// Due date, RFC 3339.
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        assignee: Vec<String>,
        #[arg(long)]
        milestone: Option<String>,
        #[arg(long)]
        tag: Vec<String>,
        /// Encrypt the description with this key (from `keygen`).
        #[arg(long, env = "TOAD_TASK_KEY")]
        key: Option<String>,
    },
    /// `update_task_position`
    MoveTask {
        #[arg(long)]
        board: String,
        #[arg(long)]
        task: String,
        /// Column title.
        #[arg(long)]
        column: String,
    },
    /// `set_task_priority`
    SetPriority {
        #[arg(long)]
        board: String,
        #[arg(long)]
        task: String,
        #[arg(long)]
        priority: Priority,
    },
    /// `delete_task`
    DeleteTask {
        #[arg(long)]
        board: String,
        #[arg(long)]
        task: String,
    },
    /// `add_member`
    AddMember {
        #[arg(long)]
        board: String,
        /// Owner capability object id.
        #[arg(long)]
        cap: String,
        #[arg(long)]
        member: String,
        #[arg(long, default_value = "contributor")]
        role: Role,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no identity: pass --address or run `toad login`")]
    NoIdentity,
    #[error("invalid {0}")]
    InvalidArgument(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.args.log_level, cli.args.log_file.as_deref());

    let config = match ClientConfig::load(&cli.args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(err = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging to stderr, or to `file_path` when given.
///
/// Returns a [`WorkerGuard`] for file output that must be held until
/// shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(command: Command, config: &ClientConfig) -> Result<(), CliError> {
    match command {
        Command::Boards => {
            let store = connected_store(config).await?;
            store.read(|snap| {
                for board in snap.boards() {
                    println!("{}  {}  ({} tasks)", board.id, board.name, snap.tasks(&board.id).len());
                }
            });
        }
        Command::Board { id, json } => {
            let (store, id) = board_store(config, &id).await?;
            if json {
                let snapshot = store.read(|snap| snap.board_snapshot(&id));
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                store.read(|snap| print_board(snap, &id));
            }
        }
        Command::Analytics { id } => {
            let (store, id) = board_store(config, &id).await?;
            let stats = store.read(|snap| views::analytics(snap.tasks(&id)));
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Calendar { id, month } => {
            let (year, month) = parse_month(month.as_deref())?;
            let (store, id) = board_store(config, &id).await?;
            store.read(|snap| print_calendar(snap, &id, year, month));
        }
        Command::Timeline { id } => {
            let (store, id) = board_store(config, &id).await?;
            store.read(|snap| {
                for row in views::timeline(snap.tasks(&id), Utc::now()) {
                    let marker = if row.is_overdue { "overdue" } else { "due" };
                    println!(
                        "{}  {:>4}d {marker:<7} [{}] {}",
                        row.due.format("%b %d"),
                        row.days_until_due,
                        row.task.priority,
                        row.task.title
                    );
                }
            });
        }
        Command::Ask { text, board } => {
            let snapshot = match board {
                Some(id) => {
                    let (store, id) = board_store(config, &id).await?;
                    store.read(|snap| snap.board_snapshot(&id))
                }
                None => None,
            };
            let backend = GeminiBackend::from_env(config.assistant_base()?, config.assistant_timeout)
                .unwrap_or_else(|e| {
                    tracing::warn!(err = %e, "assistant backend unavailable");
                    None
                });
            let bridge = AssistantBridge::new(backend, config.assistant_model.clone());
            println!("{}", bridge.ask(&text, snapshot.as_ref()).await);
        }
        Command::Tx(tx) => {
            let call = build_call(config, tx)?;
            println!("{}", serde_json::to_string_pretty(&call)?);
        }
        Command::Wait { digest } => {
            let rpc = rpc_client(config)?;
            let receipt = rpc.wait_for_transaction(&TransactionDigest::new(digest)).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Command::Keygen => println!("{}", PayloadKey::generate().export()),
        Command::LoginUrl {
            client_id,
            redirect_uri,
        } => {
            let nonce = identity::generate_nonce();
            let url = identity::authorization_url(&client_id, &redirect_uri, &nonce)?;
            println!("nonce: {nonce}");
            println!("{url}");
        }
        Command::Login { jwt, nonce } => {
            let session = LoginSession::complete(&jwt, &nonce)?;
            let sessions = SessionStore::default_location()?;
            sessions.save(&session)?;
            println!("{}", session.address);
        }
        Command::Logout => {
            SessionStore::default_location()?.clear()?;
            println!("logged out");
        }
    }
    Ok(())
}

fn rpc_client(config: &ClientConfig) -> Result<RpcClient, CliError> {
    Ok(RpcClient::new(
        config.rpc_endpoint()?,
        config.sync.rpc_timeout,
        config.finality_timeout,
    )?)
}

fn resolve_identity(config: &ClientConfig) -> Result<Identity, CliError> {
    if let Some(address) = &config.address {
        return Ok(Identity::wallet(address.clone()));
    }
    SessionStore::default_location()?
        .load()
        .map(|session| session.identity())
        .ok_or(CliError::NoIdentity)
}

async fn connected_store(config: &ClientConfig) -> Result<BoardStore<RpcClient>, CliError> {
    let identity = resolve_identity(config)?;
    let store = BoardStore::new(Arc::new(rpc_client(config)?), config.contract.clone(), config.sync);
    store.connect(identity).await?;
    Ok(store)
}

/// A store with `id` loaded. No identity is needed to read a single board.
async fn board_store(config: &ClientConfig, id: &str) -> Result<(BoardStore<RpcClient>, ObjectId), CliError> {
    let store = BoardStore::new(Arc::new(rpc_client(config)?), config.contract.clone(), config.sync);
    let id = ObjectId::new(id);
    store.load_board_by_id(&id).await?;
    Ok((store, id))
}

fn print_board(snap: &Snapshot, id: &ObjectId) {
    let Some(board) = snap.board(id) else { return };
    print_board_header(board);
    for column in snap.columns(id) {
        println!("\n== {} ({}) ==", column.title, column.task_count());
        for task in &column.tasks {
            let lock = if task.is_encrypted { " [encrypted]" } else { "" };
            println!("  - {} [{}]{lock}  {}", task.title, task.priority, task.id);
        }
    }
    let members = snap.members(id);
    if !members.is_empty() {
        println!("\nMembers:");
        for member in members {
            println!("  {} ({})", member.address, member.role);
        }
    }
}

fn print_board_header(board: &Board) {
    println!("{}  {}", board.name, board.id);
    if !board.description.is_empty() {
        println!("{}", board.description);
    }
}

fn print_calendar(snap: &Snapshot, id: &ObjectId, year: i32, month: u32) {
    let Some(grid) = views::calendar_month(snap.tasks(id), year, month) else {
        return;
    };
    println!("{}", grid.first.format("%B %Y"));
    for day in grid.days.iter().filter(|d| !d.tasks.is_empty()) {
        let titles: Vec<&str> = day.tasks.iter().map(|t| t.title.as_str()).collect();
        println!("  {:>2}: {}", day.day, titles.join(", "));
    }
}

fn parse_month(raw: Option<&str>) -> Result<(i32, u32), CliError> {
    let Some(raw) = raw else {
        let now = Utc::now();
        return Ok((now.year(), now.month()));
    };
    let invalid = || CliError::InvalidArgument(format!("month `{raw}`, expected YYYY-MM"));
    let (year, month) = raw.split_once('-').ok_or_else(invalid)?;
    let year = year.parse().map_err(|_| invalid())?;
    let month = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

fn build_call(config: &ClientConfig, tx: TxCommand) -> Result<MoveCall, CliError> {
    let contract = &config.contract;
    let call = match tx {
        TxCommand::CreateBoard {
            name,
            description,
            columns,
        } => contract.create_board(&name, &description, &mapper::board_column_names(columns)),
        TxCommand::CreateTask {
            board,
            title,
            description,
            column,
            priority,
            due,
            assignee,
            milestone,
            tag,
            key,
        } => {
            let due_at_ms = due
                .map(|d| {
                    chrono::DateTime::parse_from_rfc3339(&d)
                        .ok()
                        .and_then(|t| u64::try_from(t.timestamp_millis()).ok())
                        .ok_or_else(|| CliError::InvalidArgument(format!("due date `{d}`")))
                })
                .transpose()?;
            let mut params = CreateTaskParams {
                board_id: ObjectId::new(board),
                title,
                description,
                column,
                priority,
                due_at_ms,
                assignees: assignee.into_iter().map(Address::new).collect(),
                milestone,
                tags: tag,
                ..CreateTaskParams::default()
            };
            if let Some(key) = key {
                let key = PayloadKey::import(&key)?;
                params.ciphertext = Some(key.encrypt_text(&params.description)?);
                params.description = String::new();
                params.is_encrypted = true;
            }
            contract.create_task(&params)
        }
        TxCommand::MoveTask { board, task, column } => {
            contract.update_task_position(&ObjectId::new(board), &ObjectId::new(task), &column)
        }
        TxCommand::SetPriority { board, task, priority } => {
            contract.set_task_priority(&ObjectId::new(board), &ObjectId::new(task), priority)
        }
        TxCommand::DeleteTask { board, task } => contract.delete_task(&ObjectId::new(board), &ObjectId::new(task)),
        TxCommand::AddMember {
            board,
            cap,
            member,
            role,
        } => contract.add_member(&ObjectId::new(board), &ObjectId::new(cap), &Address::new(member), role),
    };
    tracing::debug!(call = %call.target(), "built call");
    Ok(call)
}
