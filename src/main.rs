use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use log::{LevelFilter, error, info};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use cobot_bridge_lib::commands;
use cobot_bridge_lib::config::AppConfig;
use cobot_bridge_lib::config::control_config::TransportMode;
use cobot_bridge_lib::core::bluetooth::SendOutcome;
use cobot_bridge_lib::core::{MessageView, ProfileRegistry};
use cobot_bridge_lib::logging::{apply_logging_config, setup_logging};
use cobot_bridge_lib::state::AppState;

#[derive(Parser)]
#[command(name = "cobot-bridge")]
#[command(about = "Drive CoBot / XRover robots over Bluetooth LE and the media server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Robot profile key, e.g. CoBot_Pro
    #[arg(short, long)]
    robot: Option<String>,

    /// Command transport: ble, websocket or hybrid
    #[arg(short, long, value_parser = parse_transport)]
    transport: Option<TransportMode>,

    /// Media server host
    #[arg(long)]
    host: Option<String>,

    /// Media server port
    #[arg(long)]
    port: Option<u16>,

    /// Use ws/http instead of wss/https
    #[arg(long)]
    insecure: bool,

    /// Channel name the robot publishes under
    #[arg(long)]
    channel_name: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in robot profiles
    Profiles {
        #[arg(long)]
        json: bool,
    },
    /// List the media server's channels
    Channels,
    /// Pair with the robot and disconnect again
    Pair,
    /// Send media server and Wi-Fi settings to the robot
    Provision {
        #[arg(long)]
        ssid: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Drive the robot from the keyboard (one token per line)
    Drive,
    /// Drive the robot from gesture labels (one label per line)
    Gestures,
    /// Forward commands from the media server to the robot
    Relay,
    /// Watch a media channel
    Subscribe,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default config
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config
    Show,
}

fn parse_transport(value: &str) -> Result<TransportMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "ble" => Ok(TransportMode::Ble),
        "websocket" | "ws" => Ok(TransportMode::Websocket),
        "hybrid" => Ok(TransportMode::Hybrid),
        other => Err(format!("unknown transport {}", other)),
    }
}

/// Prints operator-facing messages to stdout
struct ConsoleView;

impl MessageView for ConsoleView {
    fn show(&self, message: &str) {
        println!("{}", message);
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(robot) = &cli.robot {
        config.control.robot = robot.clone();
    }
    if let Some(transport) = cli.transport {
        config.control.transport = transport;
    }
    if let Some(host) = &cli.host {
        config.network.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if cli.insecure {
        config.network.secure_origin = false;
    }
    if let Some(channel_name) = &cli.channel_name {
        config.network.channel_name = channel_name.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.verbose {
        config.logging.level = LevelFilter::Debug.to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
}

fn print_profiles(json: bool) -> Result<()> {
    let registry = ProfileRegistry::builtin();
    if json {
        let profiles: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }
    for profile in registry.iter() {
        let transfer = match profile.max_transfer_size {
            Some(max) => format!("chunked({})", max),
            None => "unchunked".to_string(),
        };
        let sources: Vec<_> = profile.control_command_map.keys().map(|s| format!("{:?}", s)).collect();
        println!(
            "{:<16}{:<16}{:<14}{:<14}{}",
            profile.key,
            profile.label,
            transfer,
            format!("{:?}", profile.wire_format),
            sources.join(",")
        );
    }
    Ok(())
}

async fn run(cli: Cli, config: AppConfig, config_path: PathBuf) -> Result<()> {
    let view: Arc<dyn MessageView> = Arc::new(ConsoleView);
    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            ctrl_c_token.cancel();
        }
    });

    match cli.command {
        Commands::Profiles { json } => print_profiles(json),
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    bail!("{:?} already exists, use --force to overwrite", config_path);
                }
                AppConfig::default().save_config(&config_path).await?;
                println!("Wrote {}", config_path.display());
                Ok(())
            }
            ConfigAction::Show => {
                println!("# {}", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
        },
        Commands::Channels => {
            let app_state = AppState::new(config, config_path, view)?;
            for channel in commands::list_channels(&app_state).await? {
                println!("{:<10}{}", channel.id.to_string(), channel.label());
            }
            Ok(())
        }
        Commands::Pair => {
            let app_state = AppState::new(config, config_path, view)?;
            let name = commands::pair_robot(&app_state, &cancel_token).await?;
            println!("Paired with {}", name);
            commands::disconnect(&app_state).await
        }
        Commands::Provision { ssid, password } => {
            let mut config = config;
            if let Some(ssid) = ssid {
                config.network.ssid = ssid;
            }
            if let Some(password) = password {
                config.network.password = password;
            }
            let app_state = AppState::new(config, config_path, view)?;
            match commands::provision_network(&app_state, &cancel_token).await? {
                SendOutcome::Sent { chunks } => println!("Network settings sent ({} writes)", chunks),
                SendOutcome::Skipped => println!("Robot characteristic is not writable"),
            }
            Ok(())
        }
        Commands::Drive => {
            let app_state = AppState::new(config, config_path, view)?;
            let input = BufReader::new(tokio::io::stdin());
            commands::drive(&app_state, input, cancel_token).await
        }
        Commands::Gestures => {
            let app_state = AppState::new(config, config_path, view)?;
            let input = BufReader::new(tokio::io::stdin());
            let frames = commands::gesture_control(&app_state, input, cancel_token).await?;
            println!("{} frames processed", frames);
            Ok(())
        }
        Commands::Relay => {
            let app_state = AppState::new(config, config_path, view)?;
            commands::relay(&app_state, cancel_token).await
        }
        Commands::Subscribe => {
            let app_state = AppState::new(config, config_path, view.clone())?;
            let stats = commands::subscribe(&app_state, view, cancel_token).await?;
            println!(
                "{} descriptors, {} chunks, {} images, {} dropped",
                stats.descriptors, stats.chunks, stats.images, stats.dropped
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // command line logging flags apply while the config file is read
    let mut early = AppConfig::default();
    apply_overrides(&mut early, &cli);
    setup_logging(early.logging.level_filter(), early.logging.json);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::load_config(&config_path).await?;
    apply_overrides(&mut config, &cli);

    apply_logging_config(config.logging.level_filter(), config.logging.json);
    info!("Using config at {:?}", config_path);

    if let Err(e) = run(cli, config, config_path).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
