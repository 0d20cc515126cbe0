//! Command-line front end for the node store.
//!
//! Each subcommand maps onto one node endpoint and prints its JSON response
//! body; the process exit code reflects the response status.

use chrono::TimeZone;
use clap::{Parser, Subcommand};
use log::info;
use nodestore_core::api::{
    self, ApiResponse, IdBody, ListParams, NodeBody, PageParams, TimeRangeBody,
    TimestampFilterBody,
};
use nodestore_core::db::open_db;
use nodestore_core::{
    init_logging, AppConfig, NodeService, SqliteNodeRepository, TimeWindowResolver, TimezoneMode,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "nodestore", version, about = "Node store command-line client")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "NODESTORE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Interpret wall-clock dates in UTC instead of the local zone
    #[arg(long)]
    utc: bool,

    /// Mirror warnings and errors to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the database and report the core version
    Ping,

    /// List live nodes, newest first
    List {
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        node_value: Option<String>,
    },

    /// Show one live node
    Show {
        #[arg(long)]
        id: String,
    },

    /// Create a node
    Create {
        #[arg(long)]
        node_value: String,
        /// JSON payload stored as activityData
        #[arg(long, default_value = "null")]
        activity_data: String,
    },

    /// Replace nodeValue and activityData of a node
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        node_value: String,
        #[arg(long, default_value = "null")]
        activity_data: String,
    },

    /// Soft-delete a node
    Delete {
        #[arg(long)]
        id: String,
    },

    /// Filter by nodeValue inside an explicit window (dd/mm/yyyy hh:mm:ss)
    FilterWindow {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        node_value: String,
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        limit: Option<String>,
    },

    /// Filter by nodeValue inside a relative window (1h, 5h or 1d)
    FilterRange {
        #[arg(long)]
        time_range: String,
        #[arg(long)]
        node_value: String,
        /// Window end; defaults to now
        #[arg(long)]
        end: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if matches!(cli.command, Commands::Ping) {
        return print_response(&ping_response());
    }

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = cli.db_path.clone() {
        config.db_path = path;
    }
    if cli.utc {
        config.timezone = TimezoneMode::Utc;
    }
    config.logging.stderr = cli.verbose;

    if let Err(err) = init_logging(&config.logging) {
        eprintln!("logging disabled: {err}");
    }

    let conn = match open_db(&config.db_path) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("failed to open `{}`: {err}", config.db_path.display());
            return ExitCode::FAILURE;
        }
    };
    let repo = match SqliteNodeRepository::try_new(&conn) {
        Ok(repo) => repo,
        Err(err) => {
            eprintln!("repository init failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "event=cli_command module=cli status=start db_path={}",
        config.db_path.display()
    );
    let response = match config.timezone {
        TimezoneMode::Local => dispatch(
            &NodeService::with_resolver(repo, TimeWindowResolver::local()),
            cli.command,
        ),
        TimezoneMode::Utc => dispatch(
            &NodeService::with_resolver(repo, TimeWindowResolver::utc()),
            cli.command,
        ),
    };

    print_response(&response)
}

fn ping_response() -> ApiResponse {
    ApiResponse {
        status: api::STATUS_OK,
        body: json!({
            "ping": nodestore_core::ping(),
            "version": nodestore_core::core_version(),
        }),
    }
}

fn dispatch<Tz: TimeZone>(
    service: &NodeService<SqliteNodeRepository<'_>, Tz>,
    command: Commands,
) -> ApiResponse {
    match command {
        Commands::Ping => ping_response(),
        Commands::List {
            page,
            limit,
            node_value,
        } => api::index(
            service,
            &ListParams {
                page: PageParams { page, limit },
                node_value,
            },
        ),
        Commands::Show { id } => api::show(service, &IdBody { id: Some(id) }),
        Commands::Create {
            node_value,
            activity_data,
        } => match api::parse_body::<Value>(&activity_data) {
            Ok(activity_data) => api::store(
                service,
                &NodeBody {
                    id: None,
                    node_value: Some(node_value),
                    activity_data: Some(activity_data),
                },
            ),
            Err(response) => response,
        },
        Commands::Update {
            id,
            node_value,
            activity_data,
        } => match api::parse_body::<Value>(&activity_data) {
            Ok(activity_data) => api::update(
                service,
                &NodeBody {
                    id: Some(id),
                    node_value: Some(node_value),
                    activity_data: Some(activity_data),
                },
            ),
            Err(response) => response,
        },
        Commands::Delete { id } => api::destroy(service, &IdBody { id: Some(id) }),
        Commands::FilterWindow {
            start,
            end,
            node_value,
            page,
            limit,
        } => api::filter_by_timestamp(
            service,
            &TimestampFilterBody {
                start_date: Some(start),
                end_date: Some(end),
                node_value: Some(node_value),
            },
            &PageParams { page, limit },
        ),
        Commands::FilterRange {
            time_range,
            node_value,
            end,
        } => api::filter_by_time_range(
            service,
            &TimeRangeBody {
                time_range: Some(time_range),
                node_value: Some(node_value),
                start_date: None,
                end_date: end,
            },
        ),
    }
}

fn print_response(response: &ApiResponse) -> ExitCode {
    match serde_json::to_string_pretty(&response.body) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to render response: {err}"),
    }
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        eprintln!("status={}", response.status);
        ExitCode::FAILURE
    }
}
