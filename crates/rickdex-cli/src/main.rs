use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod card;

use card::{format_card, ShowOutput};
use rickdex_api::{CharacterApi, HttpApi};
use rickdex_bus::EventBus;
use rickdex_core::{load_config, parse_identifier, Controller, LoadStatus, RickdexConfig};
use rickdex_schema::CharacterId;

#[derive(Parser, Debug)]
#[command(name = "rickdex", version, about = "Rick and Morty character browser")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.rickdex",
        help = "Config root directory (contains config.yaml and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    #[command(about = "Browse characters interactively (default)")]
    Browse {
        #[arg(long, allow_hyphen_values = true, help = "Character ID to open first")]
        id: Option<String>,
    },
    #[command(about = "Print one character and its episodes")]
    Show {
        #[arg(allow_hyphen_values = true, help = "Character ID")]
        id: String,
        #[arg(long, help = "Print JSON instead of a text card")]
        json: bool,
    },
    #[command(about = "Print the effective configuration")]
    Config,
    #[command(about = "Check that the API answers")]
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let command = cli.command.unwrap_or(Commands::Browse { id: None });
    let interactive = matches!(command, Commands::Browse { .. });
    let _guard = init_logging(&cli.config_root, interactive)?;

    let config = load_config(&cli.config_root)?;

    match command {
        Commands::Browse { id } => {
            let start = match id {
                Some(raw) => parse_identifier(&raw)?,
                None => config.browser.start_id,
            };
            run_browser(&config, start).await?;
        }
        Commands::Show { id, json } => {
            let id = parse_identifier(&id)?;
            run_show(&config, id, json).await?;
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Ping => {
            let api = build_api(&config)?;
            api.health().await?;
            println!("API reachable at {}", api.api_base());
        }
    }

    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

/// File logging always; stderr only when the terminal is not owned by the TUI.
fn init_logging(config_root: &Path, interactive: bool) -> Result<WorkerGuard> {
    let log_dir = config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "rickdex.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = (!interactive)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    Ok(guard)
}

fn build_api(config: &RickdexConfig) -> Result<HttpApi> {
    HttpApi::with_settings(
        &config.api.base_url,
        config.api.timeout(),
        &config.api.user_agent,
    )
}

async fn run_browser(config: &RickdexConfig, start: CharacterId) -> Result<()> {
    let api = Arc::new(build_api(config)?);
    let bus = EventBus::new(config.browser.bus_capacity);
    // Subscribe before the controller starts so the first load shows up.
    let receivers = rickdex_tui::subscribe_all(&bus).await;
    let (controller, handle) = Controller::new(api, bus.publisher(), start);
    let task = controller.spawn();

    tracing::info!(%start, base = %config.api.base_url, "starting browser");
    let result = rickdex_tui::run_tui_from_receivers(
        receivers,
        handle,
        Duration::from_secs(config.browser.notice_ttl_secs),
    )
    .await;

    // Dropping the last handle stops the controller.
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "controller task ended abnormally");
    }
    result
}

async fn run_show(config: &RickdexConfig, id: CharacterId, json: bool) -> Result<()> {
    let api = Arc::new(build_api(config)?);
    let bus = EventBus::new(config.browser.bus_capacity);
    let (controller, handle) = Controller::new(api, bus.publisher(), id);
    controller.spawn();

    let view = handle.wait_for(|v| v.is_settled()).await?;
    let Some(character) = view.character.as_ref() else {
        return Err(anyhow!("character {id} not found"));
    };
    if view.episode_status == LoadStatus::Failed {
        tracing::warn!(%id, "episode list could not be resolved");
    }

    if json {
        let output = ShowOutput {
            character,
            episodes: &view.episodes,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", format_card(character, &view.episodes));
    }
    Ok(())
}
