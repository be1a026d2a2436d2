use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Instrument};

use theusers::app_system::{setup_tracing, AppConfig, UsersSystem};
use theusers::clients::{CreateOutcome, UpdateOutcome};
use theusers::domain::{EntryStatus, NewUser, User, UserId};

/// Manage your users.
#[derive(Debug, Parser)]
#[command(name = "theusers", version)]
struct Cli {
    /// YAML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the user service, overrides the config file.
    #[arg(long, env = "THEUSERS_BASE_URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show every user.
    List,
    /// Register a user.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        blocked: bool,
        /// Submit once more if the first attempt fails.
        #[arg(long)]
        retry: bool,
    },
    /// Block a user.
    Block { id: String },
    /// Unblock a user.
    Unblock { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    setup_tracing(&config.log_level);

    info!(base_url = %config.base_url, "Starting theusers");
    let system = UsersSystem::from_config(&config);
    let users = system.users_client.clone();
    let mut toasts = users.notifier().subscribe();

    let state = users.use_users().await?;
    if state.is_loading() {
        bail!(
            "could not load users: {}",
            state.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    match cli.command {
        Command::List => {}
        Command::Create {
            name,
            username,
            blocked,
            retry,
        } => {
            let span = tracing::info_span!("user_creation");
            async {
                let outcome = users
                    .create_user(NewUser::new(name, username, blocked))
                    .await?;
                match outcome {
                    CreateOutcome::Failed(failed) if retry => {
                        info!("Trying again");
                        users.retry_create(&failed).await?;
                    }
                    CreateOutcome::Failed(_) => {
                        eprintln!("Creation failed; pass --retry to submit it once more on failure.");
                    }
                    CreateOutcome::Created(user) => {
                        users.notifier().success(format!("Registered {}", user.name));
                    }
                }
                anyhow::Ok(())
            }
            .instrument(span)
            .await?;
        }
        Command::Block { id } => toggle(&users, id, true).await?,
        Command::Unblock { id } => toggle(&users, id, false).await?,
    }

    render(&users.users().await?);
    while let Ok(toast) = toasts.try_recv() {
        eprintln!("{toast}");
    }

    drop(users);
    system.shutdown().await.map_err(anyhow::Error::msg)?;
    Ok(())
}

async fn toggle(
    users: &theusers::clients::UsersClient,
    id: String,
    blocked: bool,
) -> anyhow::Result<()> {
    match users.set_blocked(UserId::new(id), blocked).await? {
        UpdateOutcome::Applied(_) => {}
        UpdateOutcome::RolledBack => warn!("Change was reverted"),
        UpdateOutcome::Skipped => warn!("No persisted user with that id"),
    }
    Ok(())
}

fn render(users: &[User]) {
    for user in users {
        let marker = match user.status {
            EntryStatus::Persisted => " ",
            EntryStatus::Pending => "…",
            EntryStatus::Error => "!",
        };
        let state = if user.blocked { "blocked" } else { "active" };
        println!(
            "{marker} {:<38} {:<4} {:<24} @{:<20} {state}",
            user.id,
            user.initials(),
            user.name,
            user.username,
        );
    }
}
