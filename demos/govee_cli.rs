//! CLI application for controlling Govee lights through the cloud API.
//!
//! Every command goes through the quota-aware access layer, so a blocked or
//! rate-limited call is reported instead of being sent.
//!
//! Run with: cargo run --example govee_cli -- --help

use clap::{Parser, Subcommand};
use govee_lights_rs::{ApiAccessLayer, Brightness, Color, GoveeClient, HttpTransport, QuotaConfig};

#[derive(Parser)]
#[command(name = "govee-cli")]
#[command(about = "Control Govee smart lights from the command line", long_about = None)]
struct Cli {
    /// Govee developer API key
    #[arg(short, long, env = "GOVEE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Local daily call budget
    #[arg(long, default_value_t = QuotaConfig::DEFAULT_DAILY_LIMIT)]
    daily_limit: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all devices on the account
    Devices,

    /// Get the current state of a device
    State {
        /// Device id as shown by `devices`
        device: String,
    },

    /// Turn the light on
    On { device: String },

    /// Turn the light off
    Off { device: String },

    /// Set brightness (0-100)
    Brightness {
        device: String,
        /// Brightness level (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },

    /// Set RGB color (0-255 for each component)
    Color {
        device: String,
        /// Red component (0-255)
        red: u8,
        /// Green component (0-255)
        green: u8,
        /// Blue component (0-255)
        blue: u8,
    },

    /// Show local quota usage after listing devices
    Usage,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let transport = HttpTransport::new(cli.api_key)?;
    let config = QuotaConfig::new().daily_limit(cli.daily_limit);
    let client = GoveeClient::new(ApiAccessLayer::new(transport, config)?);

    // Device models are needed for every per-device call.
    let devices = client.devices().await?;

    match cli.command {
        Commands::Devices => {
            if devices.is_empty() {
                println!("No devices found on this account.");
            } else {
                println!("Found {} device(s):", devices.len());
                for device in &devices {
                    println!(
                        "  {:24}  {:8}  {}  [{}]",
                        device.device,
                        device.model,
                        device.name(),
                        device.support_cmds.join(", ")
                    );
                }
            }
        }

        Commands::State { device } => {
            let state = client.device_state(&device).await?;
            println!("State of {}:", device);
            if let Some(online) = state.online() {
                println!("  Online: {}", online);
            }
            println!("  Power: {}", if state.is_on() { "ON" } else { "OFF" });
            if let Some(brightness) = state.brightness() {
                println!("  Brightness: {}%", brightness.value());
            }
            if let Some(color) = state.color() {
                println!(
                    "  Color: RGB({}, {}, {})",
                    color.red(),
                    color.green(),
                    color.blue()
                );
            }
            if let Some(kelvin) = state.color_temp() {
                println!("  Temperature: {}K", kelvin);
            }
        }

        Commands::On { device } => {
            client.turn_on(&device).await?;
            println!("Light turned ON");
        }

        Commands::Off { device } => {
            client.turn_off(&device).await?;
            println!("Light turned OFF");
        }

        Commands::Brightness { device, level } => {
            let brightness = Brightness::create(level).ok_or("brightness must be 0-100")?;
            client.set_brightness(&device, brightness).await?;
            println!("Brightness set to {}%", level);
        }

        Commands::Color {
            device,
            red,
            green,
            blue,
        } => {
            client
                .set_color(&device, Color::rgb(red, green, blue))
                .await?;
            println!("Color set to RGB({}, {}, {})", red, green, blue);
        }

        Commands::Usage => {}
    }

    let report = client.api().usage_report().await;
    println!("\nUsage:\n{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
