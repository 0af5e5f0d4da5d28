use clap::{Parser, Subcommand};
use meshdesk_core::{ModemPreset, SessionConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "meshdesk")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Path of the message and node store (defaults to the platform data directory)
    #[arg(short = 's', long, global = true, env = "MESHDESK_STORE")]
    pub store: Option<PathBuf>,

    /// Keep messages and nodes in memory only
    #[arg(long, global = true)]
    pub no_store: bool,

    /// Output in JSON format
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Warm-up discovery pass, discarded (e.g. 2s)
    #[arg(long, global = true, env = "MESHDESK_WARMUP_SCAN", default_value = "2s", value_parser = humantime::parse_duration)]
    pub warmup_scan: Duration,

    /// Discovery pass whose results are shown (e.g. 5s)
    #[arg(long, global = true, env = "MESHDESK_SCAN", default_value = "5s", value_parser = humantime::parse_duration)]
    pub scan_time: Duration,

    /// Connection timeout (e.g. 30s)
    #[arg(short = 't', long, global = true, env = "MESHDESK_CONNECT_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Upper bound for closing the link on disconnect
    #[arg(long, global = true, env = "MESHDESK_CLOSE_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    pub close_timeout: Duration,

    /// Upper bound for a single send
    #[arg(long, global = true, env = "MESHDESK_COMMAND_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    pub command_timeout: Duration,

    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover nearby devices
    Scan,

    /// Connect and chat; each stdin line is sent as a message
    Chat {
        /// Device address: tcp:host:port, a serial port, or a BLE name/MAC
        #[arg(short = 'a', long, env = "MESHDESK_ADDRESS")]
        address: String,

        /// Channel index
        #[arg(short = 'c', long, default_value = "0")]
        channel: u32,

        /// Destination node (number, 0x-hex, or !hex id); broadcast if omitted
        #[arg(long)]
        to: Option<String>,
    },

    /// Display stored nodes
    Nodes,

    /// Display stored chat history
    History {
        /// Only show this channel
        #[arg(short = 'c', long)]
        channel: Option<u32>,

        /// Show at most this many of the latest messages (0 for all)
        #[arg(short = 'n', long, default_value = "0")]
        limit: usize,
    },

    /// Push radio settings to a device
    Config {
        /// Device address: tcp:host:port, a serial port, or a BLE name/MAC
        #[arg(short = 'a', long, env = "MESHDESK_ADDRESS")]
        address: String,

        /// Firmware region code (e.g. 1 = US, 3 = EU_868)
        #[arg(short = 'r', long)]
        region: i32,

        /// Modem preset (LongFast, MediumSlow, ShortFast)
        #[arg(short = 'p', long, default_value = "LongFast")]
        preset: ModemPreset,
    },
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            warmup_scan: self.warmup_scan,
            scan: self.scan_time,
            connect_timeout: self.timeout,
            close_timeout: self.close_timeout,
            command_timeout: self.command_timeout,
        }
    }
}
