//! GoDice CLI - Main entry point
//!
//! Offline tooling around the GoDice protocol: replays captured notification
//! logs through a simulated die, classifies raw orientation vectors, and
//! prints encoded command frames.

mod config;
mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use godice_core::{resolve, Command, DieType, Rgb, Vector3};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "godice")]
#[command(about = "GoDice protocol tooling")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "godice.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Replay a log of hex-encoded notification frames
    Replay {
        /// Frame log, one frame per line
        file: PathBuf,
        /// Override the configured die type
        #[arg(short, long)]
        die_type: Option<DieType>,
        /// Issue battery and color requests answered by frames in the log
        #[arg(short, long)]
        query: bool,
    },
    /// Resolve the face value for an orientation vector
    Classify {
        die_type: DieType,
        #[arg(allow_negative_numbers = true)]
        x: i8,
        #[arg(allow_negative_numbers = true)]
        y: i8,
        #[arg(allow_negative_numbers = true)]
        z: i8,
    },
    /// Print the hex frame of a command
    #[command(subcommand)]
    Encode(EncodeCommand),
}

#[derive(Subcommand, Debug)]
enum EncodeCommand {
    /// Battery level request
    Battery,
    /// Color request
    Color,
    /// Set both LEDs, colors given as R,G,B
    Led {
        led1: String,
        /// Defaults to off
        led2: Option<String>,
    },
    /// Pulse the LEDs; times are in 10 ms ticks
    Pulse {
        count: u8,
        on_ticks: u8,
        off_ticks: u8,
        color: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("GoDice v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    match args.command {
        CliCommand::Replay {
            file,
            die_type,
            query,
        } => {
            if let Some(die_type) = die_type {
                config.session.die_type = die_type;
            }
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let frames = replay::parse_frame_log(&content)?;
            let report = replay::replay_frames(frames, config.session.clone(), query).await?;

            match config.output.format {
                OutputFormat::Json => {
                    for update in &report.updates {
                        println!("{}", serde_json::to_string(update)?);
                    }
                    println!(
                        "{}",
                        serde_json::json!({
                            "frames": report.frames,
                            "battery": report.battery,
                            "color": report.color,
                        })
                    );
                }
                OutputFormat::Text => {
                    for update in &report.updates {
                        match update.value {
                            Some(value) => println!("{:?}: {}", update.stability, value),
                            None => println!("{:?}", update.stability),
                        }
                    }
                    if let Some(level) = report.battery {
                        println!("Battery: {}%", level);
                    }
                    if let Some(color) = report.color {
                        println!("Color: {:?}", color);
                    }
                    println!(
                        "{} frames, {} orientation updates",
                        report.frames,
                        report.updates.len()
                    );
                }
            }
        }
        CliCommand::Classify { die_type, x, y, z } => {
            println!("{}", resolve(die_type, Vector3::new(x, y, z)));
        }
        CliCommand::Encode(command) => {
            let command = build_command(command)?;
            println!("{}", hex::encode(command.encode()));
        }
    }

    Ok(())
}

fn build_command(command: EncodeCommand) -> Result<Command> {
    Ok(match command {
        EncodeCommand::Battery => Command::RequestBattery,
        EncodeCommand::Color => Command::RequestColor,
        EncodeCommand::Led { led1, led2 } => Command::SetLed {
            led1: parse_rgb(&led1)?,
            led2: led2.as_deref().map(parse_rgb).transpose()?.unwrap_or(Rgb::OFF),
        },
        EncodeCommand::Pulse {
            count,
            on_ticks,
            off_ticks,
            color,
        } => Command::PulseLed {
            count,
            on_ticks,
            off_ticks,
            color: parse_rgb(&color)?,
        },
    })
}

/// Parse `R,G,B`; channels are clamped to 0..=255
fn parse_rgb(value: &str) -> Result<Rgb> {
    let channels = value
        .split(',')
        .map(|c| c.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid color: {}", value))?;
    Ok(Rgb::from_channels(&channels)?)
}
