use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use packetwire_codec::ByteOrder;
use packetwire_frame::FrameConfig;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod ping;
pub mod serve;
pub mod version;

/// Idle pause when a step moved no bytes.
pub(crate) const STEP_BACKOFF: Duration = Duration::from_millis(1);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer pings on a Unix socket until interrupted.
    Serve(ServeArgs),
    /// Send pings to a server and report the pongs.
    Ping(PingArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Byte order for frame headers and integer bodies.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum WireOrder {
    #[default]
    Big,
    Little,
}

impl WireOrder {
    pub fn frame_config(self) -> FrameConfig {
        FrameConfig {
            byte_order: self.into(),
            ..FrameConfig::default()
        }
    }
}

impl From<WireOrder> for ByteOrder {
    fn from(order: WireOrder) -> Self {
        match order {
            WireOrder::Big => ByteOrder::Big,
            WireOrder::Little => ByteOrder::Little,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Byte order on the wire. Both sides must agree.
    #[arg(long, value_enum, default_value = "big")]
    pub byte_order: WireOrder,
    /// Exit after serving N peers.
    #[arg(long)]
    pub peers: Option<u64>,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Number of pings to send without waiting in between.
    #[arg(long, short = 'n', default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,
    /// Message carried by the first ping; each following ping adds one.
    #[arg(long, short = 'm', default_value = "0", allow_negative_numbers = true)]
    pub message: i32,
    /// Byte order on the wire. Both sides must agree.
    #[arg(long, value_enum, default_value = "big")]
    pub byte_order: WireOrder,
    /// Maximum time to wait for every pong (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
