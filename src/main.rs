// SPDX-License-Identifier: GPL-3.0-only

use camera_enhance::config::ColorPreset;
use camera_enhance::constants;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-enhance")]
#[command(about = "Capture enhancement pipeline for multi-lens cameras")]
#[command(version = constants::app_version())]
struct Cli {
    /// Config file (default: ~/.config/camera-enhance/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enhance an exposure bracket (or a single image) from disk
    Enhance {
        /// Input images, darkest to brightest
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// EV offset of each input (default: evenly spread over the configured range)
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        evs: Vec<f32>,

        /// Total zoom to apply as a digital crop
        #[arg(short, long, default_value = "1.0")]
        zoom: f32,

        /// Color preset (natural, vivid, portrait, landscape)
        #[arg(short, long)]
        preset: Option<ColorPreset>,

        /// Output image path (default: ~/Pictures/camera-enhance/enhanced_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write capture metadata as JSON
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Write the log-encoded gain map as PNG
        #[arg(long)]
        gain_map: Option<PathBuf>,
    },

    /// Print the zoom plan for a target zoom on a given camera set
    PlanZoom {
        /// Target total zoom
        target: f32,

        /// Device has a telephoto lens
        #[arg(long)]
        telephoto: bool,

        /// Device has a periscope lens
        #[arg(long)]
        periscope: bool,

        /// Largest optical zoom of the device
        #[arg(long, default_value = "1.0")]
        max_optical: f32,

        /// Main sensor resolution in megapixels
        #[arg(long, default_value = "12.0")]
        sensor_mp: f32,

        /// Disable optical zoom
        #[arg(long)]
        no_optical: bool,
    },

    /// Capture from a simulated triple camera fed by a still image
    Simulate {
        /// Source image for the simulated scene
        input: PathBuf,

        /// Target total zoom
        #[arg(short, long, default_value = "1.0")]
        zoom: f32,

        /// Color preset (natural, vivid, portrait, landscape)
        #[arg(short, long)]
        preset: Option<ColorPreset>,

        /// Simulate a single wide camera instead of wide + tele + periscope
        #[arg(long)]
        single_lens: bool,

        /// Make the capture at this EV offset fail
        #[arg(long, allow_negative_numbers = true)]
        fail_ev: Vec<f32>,

        /// Enable super-resolution with the given scale
        #[arg(long)]
        super_resolution: Option<f32>,

        /// Output image path (default: ~/Pictures/camera-enhance/simulated_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write capture metadata as JSON
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_enhance=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Enhance {
            inputs,
            evs,
            zoom,
            preset,
            output,
            metadata,
            gain_map,
        } => cli::enhance(
            config,
            cli::EnhanceArgs {
                inputs,
                evs,
                zoom,
                preset,
                output,
                metadata,
                gain_map,
            },
        ),
        Commands::PlanZoom {
            target,
            telephoto,
            periscope,
            max_optical,
            sensor_mp,
            no_optical,
        } => cli::plan_zoom(
            &config,
            target,
            camera_enhance::ZoomCapabilities {
                has_telephoto: telephoto,
                has_periscope: periscope,
                max_optical_zoom: max_optical,
                sensor_resolution_megapixels: sensor_mp,
            },
            !no_optical,
        ),
        Commands::Simulate {
            input,
            zoom,
            preset,
            single_lens,
            fail_ev,
            super_resolution,
            output,
            metadata,
        } => cli::simulate(
            config,
            cli::SimulateArgs {
                input,
                zoom,
                preset,
                single_lens,
                fail_evs: fail_ev,
                super_resolution,
                output,
                metadata,
            },
        ),
    }
}
