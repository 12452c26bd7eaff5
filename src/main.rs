//! aoa-pilot CLI
//!
//! Drives a handset in accessory mode as a virtual touch pointer and
//! keyboard.
//!
//! # Usage
//!
//! ```bash
//! # Walk the setup wizard until boot completes (vision oracle + adb)
//! aoa-pilot --config bench.toml run
//!
//! # Manual gestures for bench debugging
//! aoa-pilot tap 540 1200
//! aoa-pilot swipe up
//! aoa-pilot key 0x28
//! aoa-pilot key tab --modifiers shift
//! aoa-pilot wake --power
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`; `-v` for `debug`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use aoa_pilot::bridge::adb::{AdbBridge, AdbScreenCapture};
use aoa_pilot::bridge::vision::VisionOracle;
use aoa_pilot::hid::keyboard::{key_by_name, modifier_by_name};
use aoa_pilot::navigator::{canonical_swipe, SwipeDirection};
use aoa_pilot::usb::aoa::AoaTransport;
use aoa_pilot::{
    Collaborators, GestureSynthesizer, NavigationController, Outcome, Point, Settings,
    SystemClock,
};

/// Android Open Accessory HID pilot
#[derive(Parser)]
#[command(name = "aoa-pilot")]
#[command(version)]
#[command(about = "Drive an Android handset over USB as a virtual touch pointer and keyboard")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device serial for adb (overrides the settings file)
    #[arg(short, long, global = true)]
    serial: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Navigate the setup wizard until the device reports boot completed
    Run {
        /// Step budget (overrides the settings file)
        #[arg(long)]
        max_steps: Option<u32>,

        /// Wall-clock limit in seconds (overrides the settings file)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Tap a screen pixel
    Tap { x: u32, y: u32 },

    /// Canonical swipe from the screen centre
    Swipe {
        #[arg(value_parser = ["up", "down", "left", "right"])]
        direction: String,
    },

    /// Press and release one key: a name (enter, power, volume_up, ...) or
    /// a HID usage id, decimal or 0x-prefixed hex
    Key {
        #[arg(value_parser = parse_key_code)]
        code: u8,

        /// Modifiers held with the key (ctrl, shift, alt, gui)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_modifier)]
        modifiers: Vec<u8>,
    },

    /// Wake the screen with a pointer nudge, or the power key
    Wake {
        #[arg(long)]
        power: bool,
    },
}

fn parse_key_code(s: &str) -> Result<u8, String> {
    if let Some(code) = key_by_name(s) {
        return Ok(code);
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid key code {s:?}: {e}"))
}

fn parse_modifier(s: &str) -> Result<u8, String> {
    modifier_by_name(s).ok_or_else(|| format!("unknown modifier {s:?}"))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if cli.serial.is_some() {
        settings.adb.serial = cli.serial.clone();
    }
    Ok(settings)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut settings = load_settings(&cli)?;
    if let Commands::Run { max_steps, timeout } = &cli.command {
        if let Some(max_steps) = max_steps {
            settings.navigator.max_steps = *max_steps;
        }
        if let Some(timeout) = timeout {
            settings.navigator.timeout_secs = *timeout;
        }
    }

    let transport = AoaTransport::find_device(settings.usb.vendor_id, settings.usb.product_id)
        .context("is the device attached and in accessory mode?")?;
    let gestures = GestureSynthesizer::new(transport, SystemClock);
    let mut controller = NavigationController::new(gestures, settings.navigator_config())?;
    let geometry = controller.geometry();
    let pointer = controller.config().pointer_id;
    let keyboard = controller.config().keyboard_id;

    match cli.command {
        Commands::Run { .. } => {
            let adb = AdbBridge::from_settings(&settings.adb);
            let mut frames = AdbScreenCapture::new(adb.clone());
            let mut oracle = VisionOracle::new(&settings.oracle)?;
            let report = controller.run(Collaborators {
                frames: &mut frames,
                probe: &adb,
                oracle: &mut oracle,
                text: &adb,
            })?;
            info!(
                "{:?} after {} steps ({} decisions, {} capture failures, {} pointer wakes, {} power-key wakes) in {:.1}s",
                report.outcome,
                report.steps,
                report.decisions,
                report.capture_failures,
                report.pointer_wakes,
                report.power_key_wakes,
                report.elapsed.as_secs_f64()
            );
            return Ok(match report.outcome {
                Outcome::Succeeded(_) => ExitCode::SUCCESS,
                Outcome::TimedOut | Outcome::StepExhausted => ExitCode::FAILURE,
            });
        }
        Commands::Tap { x, y } => {
            controller
                .gestures_mut()
                .tap(pointer, Point::new(x, y), geometry)?;
        }
        Commands::Swipe { direction } => {
            let (from, to) = canonical_swipe(SwipeDirection::parse(&direction), geometry);
            controller
                .gestures_mut()
                .swipe(pointer, from, to, geometry, Default::default())?;
        }
        Commands::Key { code, modifiers } => {
            let modifier = modifiers.iter().fold(0u8, |acc, m| acc | m);
            controller.gestures_mut().send_key(keyboard, code, modifier)?;
        }
        Commands::Wake { power: false } => {
            controller.gestures_mut().wake_via_pointer(pointer)?;
        }
        Commands::Wake { power: true } => {
            controller.gestures_mut().wake_via_power_key(keyboard)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
