//! pcictl - PCI device and AER counter snapshots from sysfs
//!
//! Each invocation reads sysfs once and prints the result.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pci_sysfs::{SysFs, SysfsConfig};

#[derive(Parser)]
#[command(name = "pcictl")]
#[command(about = "Inspect PCI devices and PCIe AER counters", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: /etc/pcictl/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read sysfs from this root instead of /sys
    #[arg(long, global = true)]
    sysfs_root: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all PCI devices
    Devices,

    /// Show AER counters of one PCI device (e.g. 0000:01:00.0)
    Aer {
        location: String,
    },

    /// Show AER totals of all PCIe root ports
    Rootports,

    /// Show AER counters behind network interfaces
    NetAer {
        /// Only this interface
        iface: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = SysfsConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.sysfs_root {
        config.sysfs_root = root;
    }
    tracing::debug!(
        root = %config.sysfs_root.display(),
        driver = %config.rootport_driver,
        "using sysfs"
    );
    let sysfs = SysFs::from_config(&config);

    match cli.command {
        Commands::Devices => commands::devices(&sysfs, cli.json),
        Commands::Aer { location } => commands::aer(&sysfs, &location, cli.json),
        Commands::Rootports => commands::rootports(&sysfs, cli.json),
        Commands::NetAer { iface } => commands::net_aer(&sysfs, iface.as_deref(), cli.json),
    }
}
