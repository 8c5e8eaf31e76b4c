//! amBX lights CLI.
//!
//! A small host harness around the driver: discovers attached units,
//! lists them, and forwards color commands through the zone-lighting
//! adapter. In a full RGB host application this role is played by the
//! device registry; here it is a one-shot command.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ambx_driver::usb::RusbBackend;
use ambx_driver::{AmbxLights, ZoneLighting, discover};
use ambx_protocol::{Color, Zone};

#[derive(Parser, Debug)]
#[command(name = "ambx-lights")]
#[command(author, version, about = "Control Philips amBX Gaming lights")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List attached amBX devices and their zones
    List,
    /// Set one zone on every attached device
    Set {
        /// Zone to set
        #[arg(short, long, value_enum)]
        zone: CliZone,
        /// Color as RRGGBB hex
        color: Color,
    },
    /// Set all zones on every attached device
    SetAll {
        /// Color as RRGGBB hex
        color: Color,
    },
    /// Turn all lights off
    Off,
}

/// CLI zone names, mapped onto the wire zones.
#[derive(ValueEnum, Debug, Copy, Clone)]
enum CliZone {
    Left,
    Right,
    WallLeft,
    WallCenter,
    WallRight,
    All,
}

impl From<CliZone> for Zone {
    fn from(zone: CliZone) -> Zone {
        match zone {
            CliZone::Left => Zone::Left,
            CliZone::Right => Zone::Right,
            CliZone::WallLeft => Zone::WallLeft,
            CliZone::WallCenter => Zone::WallCenter,
            CliZone::WallRight => Zone::WallRight,
            CliZone::All => Zone::All,
        }
    }
}

/// Setup tracing subscriber for the CLI.
fn setup_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level)?;

    let backend = RusbBackend::new().context("failed to initialize the USB subsystem")?;

    let mut devices: Vec<AmbxLights<RusbBackend>> = discover(&backend)
        .into_iter()
        .enumerate()
        .map(|(index, session)| AmbxLights::new(session, index))
        .collect();

    if devices.is_empty() {
        println!("No amBX devices found.");
        return Ok(());
    }

    match args.command {
        CliCommand::List => {
            for device in &devices {
                println!("{} [{}]", device.name(), device.location());
                if !device.serial().is_empty() {
                    println!("  serial: {}", device.serial());
                }
                for (index, label) in device.zones().iter().enumerate() {
                    println!("  zone {}: {}", index, label);
                }
            }
        }
        CliCommand::Set { zone, color } => {
            for device in &mut devices {
                device.session_mut().set_zone_color(zone.into(), color)?;
            }
        }
        CliCommand::SetAll { color } => {
            for device in &mut devices {
                device.set_all(color)?;
            }
        }
        CliCommand::Off => {
            for device in &mut devices {
                device.set_all(Color::BLACK)?;
            }
        }
    }

    Ok(())
}
