use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use taskflow::api;
use taskflow::client::{self, TrackerResponse};
use taskflow::settings::ServerSettings;
use taskflow::tracker::{elapsed_seconds, format_duration, progress_percent};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve(ServerSettings),
    /// Client commands
    Client {
        /// The base URL of the API
        #[arg(long, env = "TASKFLOW_URL", default_value = taskflow::BASE_URL)]
        url: String,
        /// Session token from `auth login`
        #[arg(long, env = "TASKFLOW_TOKEN", hide_env_values = true)]
        token: Option<String>,
        #[command(subcommand)]
        command: ClientCommands,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Account commands
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Task commands
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Note commands
    Notes {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Time tracker commands
    Tracker {
        #[command(subcommand)]
        command: TrackerCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Create an account and print its token
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "TASKFLOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and print a token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TASKFLOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the account the token belongs to
    Me,
    Logout,
}

#[derive(Subcommand)]
enum TaskCommands {
    List,
    Get { id: i32 },
    Create { title: String },
    Update {
        id: i32,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Mark a task completed
    Done { id: i32 },
    Delete { id: i32 },
}

#[derive(Subcommand)]
enum NoteCommands {
    List {
        /// Only notes of this type (regular or sticky)
        #[arg(long = "type")]
        note_type: Option<String>,
    },
    Get { id: i32 },
    /// Case-insensitive search over title and content
    Search { query: String },
    Create {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "type")]
        note_type: Option<String>,
    },
    Update {
        id: i32,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "type")]
        note_type: Option<String>,
    },
    Delete { id: i32 },
}

#[derive(Subcommand)]
enum TrackerCommands {
    List,
    /// Table of trackers with live elapsed time
    Status,
    Get { id: i32 },
    Create {
        title: String,
        /// Target in seconds
        #[arg(long)]
        target: Option<i64>,
        /// Weekly goal in seconds
        #[arg(long)]
        weekly: Option<i64>,
    },
    Update {
        id: i32,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        target: Option<i64>,
        #[arg(long)]
        weekly: Option<i64>,
        /// Remove the target duration
        #[arg(long, conflicts_with = "target")]
        clear_target: bool,
        /// Remove the weekly goal
        #[arg(long, conflicts_with = "weekly")]
        clear_weekly: bool,
    },
    Delete { id: i32 },
    Start { id: i32 },
    Stop { id: i32 },
    Sync { id: i32 },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_table(trackers: &[TrackerResponse]) -> String {
    let now = Utc::now().naive_utc();
    let mut out = format!(
        "{:>4}  {:<24} {:<8} {:>9} {:>7} {:>7}\n",
        "ID", "TITLE", "STATE", "ELAPSED", "TARGET", "WEEKLY"
    );
    for tracker in trackers {
        let seconds = elapsed_seconds(tracker.total_time, tracker.is_running, tracker.start_time, now);
        let percent = |goal| {
            progress_percent(seconds, goal)
                .map(|p| format!("{p}%"))
                .unwrap_or_else(|| "-".to_string())
        };
        out.push_str(&format!(
            "{:>4}  {:<24} {:<8} {:>9} {:>7} {:>7}\n",
            tracker.id,
            tracker.title,
            if tracker.is_running { "running" } else { "stopped" },
            format_duration(seconds),
            percent(tracker.target_duration),
            percent(tracker.weekly_goal),
        ));
    }
    out
}

async fn run_client(url: &str, token: Option<String>, command: ClientCommands) -> anyhow::Result<()> {
    let require_token = move || {
        token
            .clone()
            .ok_or_else(|| anyhow!("No token given; pass --token or set TASKFLOW_TOKEN"))
    };

    match command {
        ClientCommands::Auth { command } => match command {
            AuthCommands::Signup {
                email,
                username,
                password,
            } => {
                let request = client::SignupRequest {
                    email,
                    username,
                    password,
                };
                print_json(&client::auth::signup(url, &request).await?)?;
            }
            AuthCommands::Login { username, password } => {
                let request = client::LoginRequest { username, password };
                print_json(&client::auth::login(url, &request).await?)?;
            }
            AuthCommands::Me => print_json(&client::auth::me(url, &require_token()?).await?)?,
            AuthCommands::Logout => print_json(&client::auth::logout(url).await?)?,
        },
        ClientCommands::Tasks { command } => {
            let token = require_token()?;
            match command {
                TaskCommands::List => print_json(&client::tasks::fetch_tasks(url, &token).await?)?,
                TaskCommands::Get { id } => {
                    print_json(&client::tasks::fetch_task(url, &token, id).await?)?
                }
                TaskCommands::Create { title } => {
                    let request = client::CreateTaskRequest { title };
                    print_json(&client::tasks::create_task(url, &token, &request).await?)?
                }
                TaskCommands::Update {
                    id,
                    title,
                    completed,
                } => {
                    let request = client::UpdateTaskRequest { title, completed };
                    print_json(&client::tasks::update_task(url, &token, id, &request).await?)?
                }
                TaskCommands::Done { id } => {
                    let request = client::UpdateTaskRequest {
                        title: None,
                        completed: Some(true),
                    };
                    print_json(&client::tasks::update_task(url, &token, id, &request).await?)?
                }
                TaskCommands::Delete { id } => {
                    let deleted = client::tasks::delete_task(url, &token, id).await?;
                    println!("{}", deleted.message);
                }
            }
        }
        ClientCommands::Notes { command } => {
            let token = require_token()?;
            match command {
                NoteCommands::List { note_type } => print_json(
                    &client::notes::fetch_notes(url, &token, note_type.as_deref()).await?,
                )?,
                NoteCommands::Get { id } => {
                    print_json(&client::notes::fetch_note(url, &token, id).await?)?
                }
                NoteCommands::Search { query } => {
                    print_json(&client::notes::search_notes(url, &token, &query).await?)?
                }
                NoteCommands::Create {
                    title,
                    content,
                    category,
                    note_type,
                } => {
                    let request = client::CreateNoteRequest {
                        title,
                        content,
                        category,
                        note_type,
                    };
                    print_json(&client::notes::create_note(url, &token, &request).await?)?
                }
                NoteCommands::Update {
                    id,
                    title,
                    content,
                    category,
                    note_type,
                } => {
                    let request = client::UpdateNoteRequest {
                        title,
                        content,
                        category,
                        note_type,
                    };
                    print_json(&client::notes::update_note(url, &token, id, &request).await?)?
                }
                NoteCommands::Delete { id } => {
                    let deleted = client::notes::delete_note(url, &token, id).await?;
                    println!("{}", deleted.message);
                }
            }
        }
        ClientCommands::Tracker { command } => {
            let token = require_token()?;
            match command {
                TrackerCommands::List => {
                    print_json(&client::tracker::fetch_trackers(url, &token).await?)?
                }
                TrackerCommands::Status => {
                    let trackers = client::tracker::fetch_trackers(url, &token).await?;
                    print!("{}", status_table(&trackers));
                }
                TrackerCommands::Get { id } => {
                    print_json(&client::tracker::fetch_tracker(url, &token, id).await?)?
                }
                TrackerCommands::Create {
                    title,
                    target,
                    weekly,
                } => {
                    let request = client::CreateTrackerRequest {
                        title,
                        target_duration: target,
                        weekly_goal: weekly,
                    };
                    print_json(&client::tracker::create_tracker(url, &token, &request).await?)?
                }
                TrackerCommands::Update {
                    id,
                    title,
                    target,
                    weekly,
                    clear_target,
                    clear_weekly,
                } => {
                    let request = client::UpdateTrackerRequest {
                        title,
                        target_duration: if clear_target { Some(None) } else { target.map(Some) },
                        weekly_goal: if clear_weekly { Some(None) } else { weekly.map(Some) },
                    };
                    print_json(&client::tracker::update_tracker(url, &token, id, &request).await?)?
                }
                TrackerCommands::Delete { id } => {
                    let deleted = client::tracker::delete_tracker(url, &token, id).await?;
                    println!("{}", deleted.message);
                }
                TrackerCommands::Start { id } => {
                    print_json(&client::tracker::start_tracker(url, &token, id).await?)?
                }
                TrackerCommands::Stop { id } => {
                    print_json(&client::tracker::stop_tracker(url, &token, id).await?)?
                }
                TrackerCommands::Sync { id } => {
                    print_json(&client::tracker::sync_tracker(url, &token, id).await?)?
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taskflow=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(settings) => {
            tracing::info!("Starting server on {}", settings.addr);
            api::serve(settings).await.context("Server failed")?;
        }
        Commands::Client {
            url,
            token,
            command,
        } => run_client(url.trim_end_matches('/'), token, command).await?,
    }

    Ok(())
}
