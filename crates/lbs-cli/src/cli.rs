//! Command-line interface definitions and parsing

use clap::Parser;

use lbs_client::DeviceAddress;

/// BLE central client for an LED-Button-Service peripheral
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target device address
    #[arg(default_value = "c9:a3:d9:cb:02:b3")]
    pub address: DeviceAddress,

    /// Display name used in logs for the target device
    #[arg(short, long, default_value = "A_Minh")]
    pub name: String,

    /// Seconds to scan for the device per addressing-mode attempt
    #[arg(long, default_value_t = 10)]
    pub scan_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
