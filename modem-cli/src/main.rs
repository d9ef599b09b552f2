//! WiFi modem CLI - run the modem emulator against a terminal or serial port.
//!
//! Usage:
//!   modem [--port DEVICE] [--flash FILE] [--drives DIR]
//!   modem settings [--defaults]
//!
//! Examples:
//!   modem                              # Talk to the modem from this terminal
//!   modem --port /dev/ttyUSB0          # Serve a legacy machine on a serial port
//!   modem --drives ~/disks             # Serve ATVS mounts from ~/disks
//!   modem settings                     # Print the saved settings as JSON

mod device;
mod flash_file;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{error, info, LevelFilter};

use modem_core::transport::{self, QUEUE_DEPTH};
use modem_core::{
    baud_rate, LocalFs, Modem, Peripherals, SerialDevice, Settings, SettingsStore, SystemClock,
    TcpNetwork, DEFAULT_BAUD_INDEX,
};

use device::{SerialPortDevice, TerminalDevice};
use flash_file::FileFlash;

/// Hayes-compatible WiFi modem emulator
#[derive(Parser, Debug)]
#[command(name = "modem")]
#[command(about = "Emulate a WiFi modem on a terminal or serial port")]
struct Args {
    /// Serial port to serve instead of this terminal
    #[arg(short, long)]
    port: Option<String>,

    /// Initial line rate for the serial port (saved settings override it)
    #[arg(short, long, default_value_t = baud_rate(DEFAULT_BAUD_INDEX))]
    baud: u32,

    /// Flash image holding saved settings
    #[arg(short, long, default_value = "modem-flash.bin")]
    flash: PathBuf,

    /// Directory served to ATVS drive mounts
    #[arg(short, long, default_value = ".")]
    drives: PathBuf,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the settings saved in the flash image as JSON
    Settings {
        /// Print factory defaults instead
        #[arg(long)]
        defaults: bool,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            // Raw mode needs an explicit carriage return.
            write!(
                buf,
                "{} [{}] {}: {}\r\n",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn print_settings(flash: &Path, defaults: bool) -> Result<(), Box<dyn std::error::Error>> {
    let settings = if defaults {
        Settings::default()
    } else {
        let store = SettingsStore::new(FileFlash::open(flash)?);
        store.load()?
    };
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn run_modem<D: SerialDevice + 'static>(
    device: D,
    peripherals: Peripherals,
) -> (
    tokio::task::JoinHandle<std::io::Result<()>>,
    tokio::task::JoinHandle<()>,
) {
    let (transport, context) = transport::channel(device, QUEUE_DEPTH);
    let transport_handle = tokio::task::spawn_blocking(move || context.run());
    let modem_handle = tokio::task::spawn_blocking(move || {
        let mut modem = Modem::new(transport, peripherals);
        modem.boot();
        modem.run();
    });
    (transport_handle, modem_handle)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(Command::Settings { defaults }) = args.command {
        return print_settings(&args.flash, defaults);
    }

    let peripherals = Peripherals {
        network: Box::new(TcpNetwork::new()),
        flash: Box::new(FileFlash::open(&args.flash)?),
        remote: Box::new(LocalFs::new(&args.drives)),
        clock: Box::new(SystemClock::new()),
    };

    let (transport_handle, modem_handle, raw_mode_enabled) = match &args.port {
        Some(port) => {
            let device = SerialPortDevice::open(port, args.baud)?;
            info!("serving {} at {} baud", port, args.baud);
            let (t, m) = run_modem(device, peripherals);
            (t, m, false)
        }
        None => {
            // Gracefully handle non-TTY
            let raw_mode_enabled = enable_raw_mode().is_ok();
            eprint!("Press Ctrl+] to exit.\r\n");
            let (t, m) = run_modem(TerminalDevice, peripherals);
            (t, m, raw_mode_enabled)
        }
    };

    let device_result = transport_handle.await?;
    modem_handle.await?;

    if raw_mode_enabled {
        let _ = disable_raw_mode();
    }

    if let Err(e) = device_result {
        if e.kind() != std::io::ErrorKind::ConnectionAborted {
            error!("device failed: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}
