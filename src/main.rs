// SPDX-License-Identifier: GPL-3.0-only

use camera_setup::config::AppConfig;
use camera_setup::constants::timing;
use camera_setup::storage;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod cli;

#[derive(Parser)]
#[command(name = "camera-setup")]
#[command(about = "Configure camera controls, regions of interest and snapshots")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive viewer in the terminal (default)
    Terminal {
        /// Device or file to open on start
        #[arg(short, long)]
        device: Option<String>,

        /// Session file to load on start
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List video devices
    List,

    /// Show the controls of a device
    Controls {
        /// Device path, e.g. /dev/video0
        device: String,
    },

    /// Show the resolutions a device offers
    Resolutions {
        /// Device path, e.g. /dev/video0
        device: String,
    },

    /// Apply the device settings of a session file
    Apply {
        /// Session file
        config: PathBuf,
    },

    /// Set device controls, e.g. `set /dev/video0 brightness=10 gain=3`
    Set {
        /// Device path, e.g. /dev/video0
        device: String,

        /// Assignments as name=value
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Reset every control of a device to its default
    Reset {
        /// Device path, e.g. /dev/video0
        device: String,
    },

    /// Save an annotated snapshot of the source in a session file
    Snapshot {
        /// Session file
        config: PathBuf,

        /// Output file (.jpg, .jpeg or .png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seconds to wait for the first frame
        #[arg(short, long, default_value_t = timing::SNAPSHOT_FRAME_TIMEOUT.as_secs())]
        timeout: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Terminal { .. }));

    // Set RUST_LOG to control the log level, e.g. RUST_LOG=camera_setup=debug
    // The terminal UI logs to a file so the screen stays intact
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_ansi(!interactive)
        .with_writer(log_writer(interactive))
        .init();

    let config = AppConfig::load();

    match cli.command {
        None => camera_setup::terminal::run(config, None, None),
        Some(Commands::Terminal { device, config: session }) => {
            camera_setup::terminal::run(config, device, session)
        }
        Some(Commands::List) => cli::list_devices(),
        Some(Commands::Controls { device }) => cli::show_controls(&config, &device),
        Some(Commands::Resolutions { device }) => cli::show_resolutions(&config, &device),
        Some(Commands::Apply { config: session }) => cli::apply_config(&config, &session),
        Some(Commands::Set {
            device,
            assignments,
        }) => cli::set_controls(&config, &device, &assignments),
        Some(Commands::Reset { device }) => cli::reset_controls(&config, &device),
        Some(Commands::Snapshot {
            config: session,
            output,
            timeout,
        }) => cli::take_snapshot(&config, &session, output, timeout),
    }
}

fn log_writer(interactive: bool) -> BoxMakeWriter {
    if !interactive {
        return BoxMakeWriter::new(std::io::stderr);
    }

    let path = storage::log_file_path();
    let file = path
        .parent()
        .map(std::fs::create_dir_all)
        .transpose()
        .and_then(|_| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
        });

    match file {
        Ok(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
        Err(_) => BoxMakeWriter::new(std::io::sink),
    }
}
