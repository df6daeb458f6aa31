//! # Thermal Bridge CLI
//!
//! HTTP bridge between the booth software and a USB or Bluetooth LE thermal
//! receipt printer.
//!
//! ## Usage
//!
//! ```bash
//! # Run the print server on port 2462
//! thermal-bridge serve
//!
//! # List USB thermal printers
//! thermal-bridge scan-usb
//!
//! # Scan for BLE printers for 8 seconds
//! thermal-bridge scan-ble --timeout 8
//!
//! # One-shot print using the saved selection
//! thermal-bridge print https://dl.example.com/s/ABC123 ABC123
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use thermal_bridge::{
    BridgeError,
    coordinator::{PrintCoordinator, TransportState},
    printer::{ConfigStore, DeviceRegistry, config::DEFAULT_CONFIG_FILE},
    receipt::{Locale, ReceiptBuilder},
    server::{self, DEFAULT_LISTEN_ADDR, ServerConfig},
    transport::{BleTransport, BtleplugBackend, RusbBus},
};

/// Thermal Bridge - print download receipts on USB/BLE thermal printers
#[derive(Parser, Debug)]
#[command(name = "thermal-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer settings file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP print server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
        listen: String,

        /// Logo printed above the QR code (skipped if missing)
        #[arg(long, default_value = "assets/logo.png")]
        logo: PathBuf,

        /// Default BLE scan duration in seconds
        #[arg(long, default_value = "5")]
        scan_timeout: u64,

        /// Language of the call-to-action lines
        #[arg(long, value_enum, default_value = "en")]
        locale: Locale,
    },

    /// List connected USB thermal printers
    ScanUsb,

    /// Scan for BLE devices
    ScanBle {
        /// Scan duration in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },

    /// Print one receipt using the saved printer selection
    Print {
        /// Download URL encoded in the QR code
        url: String,

        /// Short code printed under the QR code
        code: String,

        #[arg(long, default_value = "assets/logo.png")]
        logo: PathBuf,

        #[arg(long, value_enum, default_value = "en")]
        locale: Locale,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), BridgeError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            logo,
            scan_timeout,
            locale,
        } => {
            let coordinator = Arc::new(coordinator(cli.config, logo, locale));
            let config = ServerConfig {
                listen_addr: listen,
                ble_scan_timeout: Duration::from_secs(scan_timeout),
            };

            let runtime = tokio::runtime::Runtime::new()?;
            let result = runtime.block_on(server::serve(config, coordinator.clone(), async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received, shutting down");
                }
            }));
            coordinator.shutdown();
            result
        }

        Commands::ScanUsb => {
            let mut registry = DeviceRegistry::new(Arc::new(RusbBus));
            let printers = registry.scan_usb();
            if printers.is_empty() {
                println!("No USB thermal printers found");
            }
            for (i, p) in printers.iter().enumerate() {
                println!("[{}] {} serial {}", i, p.display_name(), p.serial_or_na());
            }
            Ok(())
        }

        Commands::ScanBle { timeout } => {
            let ble = BleTransport::new(BtleplugBackend::new());
            let devices = ble.scan(Duration::from_secs(timeout))?;
            if devices.is_empty() {
                println!("No BLE devices found");
            }
            for (i, d) in devices.iter().enumerate() {
                println!("[{}] {}", i, d.display_name());
            }
            ble.shutdown();
            Ok(())
        }

        Commands::Print {
            url,
            code,
            logo,
            locale,
        } => {
            let coordinator = coordinator(cli.config, logo, locale);
            let result = coordinator.print(&url, &code);
            coordinator.shutdown();
            let receipt = result?;
            println!(
                "Printed {} bytes via {}{}",
                receipt.bytes,
                receipt.mode,
                if receipt.partial { " (partial)" } else { "" }
            );
            Ok(())
        }
    }
}

fn coordinator(config: PathBuf, logo: PathBuf, locale: Locale) -> PrintCoordinator {
    let transports = TransportState::start(
        Arc::new(RusbBus),
        BleTransport::new(BtleplugBackend::new()),
        Some(ConfigStore::new(config)),
    );
    PrintCoordinator::new(transports, ReceiptBuilder::new().logo(logo).locale(locale))
}
