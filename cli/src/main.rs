// beacons: desktop CLI for proximity beacons
//
// Encodes and decodes beacon frames offline, and scans for nearby beacons through the
// local Bluetooth adapter.

mod config;
mod radio;

use anyhow::{Context, Result};
use beacons_core::{
    decode, encode, BeaconIdentity, BeaconPlugin, BeaconSighting, MethodCall, Proximity,
};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "beacons")]
#[command(about = "Proximity beacon toolkit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show adapter status
    Status,
    /// Print the advertisement frame for an identity
    Encode {
        #[command(flatten)]
        identity: IdentityArgs,
        /// Also print the frame as it appears in a raw scan record
        #[arg(short, long)]
        record: bool,
    },
    /// Decode a raw scan record given as hex
    Decode {
        hex: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rssi: i16,
    },
    /// Listen for beacons
    Scan {
        /// Stop after this many seconds (default from config)
        #[arg(short, long)]
        seconds: Option<u64>,
        /// Print one JSON object per sighting
        #[arg(long)]
        json: bool,
    },
    /// Advertise a beacon until interrupted
    Advertise {
        /// Key identifying this beacon locally
        #[arg(long, default_value = "cli")]
        id: String,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct IdentityArgs {
    /// Beacon UUID (default from config)
    #[arg(short, long)]
    uuid: Option<String>,
    #[arg(long, default_value_t = 0)]
    major: u16,
    #[arg(long, default_value_t = 0)]
    minor: u16,
    /// Calibrated RSSI at 1 m, in dBm
    #[arg(short, long, default_value_t = -59, allow_hyphen_values = true)]
    power: i8,
}

impl IdentityArgs {
    fn resolve(self, config: &config::Config) -> Result<BeaconIdentity> {
        let uuid = self
            .uuid
            .or_else(|| config.default_uuid.clone())
            .context("No UUID given and no default_uuid configured")?;
        Ok(BeaconIdentity::new(uuid, self.major, self.minor, self.power))
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.beacons.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Status => cmd_status(&config).await,
        Commands::Encode { identity, record } => cmd_encode(identity.resolve(&config)?, record),
        Commands::Decode { hex, rssi } => cmd_decode(&hex, rssi),
        Commands::Scan { seconds, json } => {
            cmd_scan(&config, seconds.unwrap_or(config.scan_seconds), json).await
        }
        Commands::Advertise { id, identity } => {
            let identity = identity.resolve(&config)?;
            cmd_advertise(&config, id, identity).await
        }
        Commands::Config { action } => cmd_config(config, action),
    }
}

async fn open_plugin(config: &config::Config) -> Result<BeaconPlugin> {
    let gateway = radio::BtleplugGateway::connect().await?;
    let plugin = BeaconPlugin::with_config(Arc::new(gateway), config.beacons.clone())?;
    Ok(plugin)
}

async fn cmd_status(config: &config::Config) -> Result<()> {
    let plugin = open_plugin(config).await?;

    println!("{}", "Beacons Status".bold());
    println!();
    println!("Platform:  {}", plugin.platform_version());
    if plugin.adapter_enabled() {
        println!("Adapter:   {}", "enabled".green());
    } else {
        println!("Adapter:   {}", "unavailable".red());
    }
    // desktop stacks only expose the central role
    println!("Advertise: {}", "unsupported".yellow());

    Ok(())
}

fn cmd_encode(identity: BeaconIdentity, record: bool) -> Result<()> {
    let frame = encode(&identity)?;

    println!("{}", "Beacon Frame".bold());
    println!("  UUID:   {}", identity.uuid.bright_cyan());
    println!("  Major:  {}", identity.major);
    println!("  Minor:  {}", identity.minor);
    println!("  Power:  {} dBm", identity.power_level);
    println!("  Frame:  {}", frame.to_hex().bright_yellow());
    if record {
        println!(
            "  Record: {}",
            hex::encode_upper(frame.to_scan_record(true)).bright_yellow()
        );
    }

    Ok(())
}

fn cmd_decode(raw_hex: &str, rssi: i16) -> Result<()> {
    let cleaned: String = raw_hex
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let raw = hex::decode(&cleaned).context("Invalid hex input")?;

    match decode(&raw, rssi) {
        Ok(sighting) => {
            println!("{}", serde_json::to_string_pretty(&sighting)?);
            Ok(())
        }
        Err(e) => anyhow::bail!("Not a beacon record: {}", e),
    }
}

async fn cmd_scan(config: &config::Config, seconds: u64, as_json: bool) -> Result<()> {
    let plugin = open_plugin(config).await?;
    let mut events = plugin
        .subscribe()
        .context("Event stream already claimed")?;

    if !plugin.start_listen() {
        anyhow::bail!("No scanner available on this machine");
    }
    if !as_json {
        println!(
            "{} for {}s (Ctrl+C to stop)",
            "Listening for beacons".bold(),
            seconds
        );
    }

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut interrupted => break,
            sighting = events.recv() => match sighting {
                Some(sighting) if as_json => println!("{}", serde_json::to_string(&sighting)?),
                Some(sighting) => print_sighting(&sighting),
                None => break,
            },
        }
    }

    let stats = plugin.scan_stats();
    plugin.shutdown();

    if !as_json {
        println!();
        println!(
            "Records seen: {}  beacons: {}  ignored: {}",
            stats.records_seen, stats.beacons_decoded, stats.records_rejected
        );
    }
    Ok(())
}

fn print_sighting(sighting: &BeaconSighting) {
    let proximity = match sighting.proximity() {
        Proximity::Immediate => "immediate".green(),
        Proximity::Near => "near".bright_green(),
        Proximity::Far => "far".yellow(),
        Proximity::Unknown => "unknown".dimmed(),
    };
    let distance = sighting
        .estimated_distance_m()
        .map(|d| format!("{:.1}m", d))
        .unwrap_or_else(|| "?".to_string());

    println!(
        "  {} {:>5} {:>5}  {:>4} dBm  ~{:<7} {}",
        sighting.identity.uuid.bright_cyan(),
        sighting.identity.major,
        sighting.identity.minor,
        sighting.rssi,
        distance,
        proximity
    );
}

async fn cmd_advertise(config: &config::Config, id: String, identity: BeaconIdentity) -> Result<()> {
    // surface an invalid UUID before touching the radio
    encode(&identity)?;

    let plugin = open_plugin(config).await?;
    let call = MethodCall::new(
        "startBeacon",
        json!({
            "beaconId": &id,
            "uuid": identity.uuid,
            "major": identity.major,
            "minor": identity.minor,
            "powerLevel": identity.power_level,
        }),
    );

    let started = plugin
        .handle_method_call(&call)
        .await
        .context("Failed to start beacon")?;

    if started != json!(true) {
        println!(
            "{} This adapter cannot advertise ({})",
            "✗".red(),
            plugin.platform_version()
        );
        return Ok(());
    }

    println!("{} Advertising {} (Ctrl+C to stop)", "✓".green(), id.bright_cyan());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl+C")?;
    plugin.shutdown();
    println!("{} Stopped", "✓".green());

    Ok(())
}

fn cmd_config(mut config: config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                println!("  {:<22} {}", key.bright_cyan(), value);
            }
            println!();
            println!(
                "File: {}",
                config::Config::config_file()?.display().to_string().dimmed()
            );
        }
    }

    Ok(())
}
