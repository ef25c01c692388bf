// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sfsampler::audio::{self, OutputDevice};
use sfsampler::config::EngineConfig;
use sfsampler::demo;
use sfsampler::engine::Sampler;
use sfsampler::mixer::AudioMixer;

/// Key the demo arpeggio starts from.
const DEMO_ROOT_KEY: u8 = 48;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A SoundFont sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays an arpeggio on a synthetic instrument through the configured device.
    Demo {
        /// The path to the engine config.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// Time between notes in milliseconds.
        #[arg[short, long, default_value_t = 200]]
        tempo_ms: u64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Demo { config, tempo_ms } => {
            let config = EngineConfig::load(config.as_deref())?;
            let settings = config.sampler_settings()?;
            let release = settings.release;

            let mixer = Arc::new(AudioMixer::new(
                config.channels(),
                config.sample_rate(),
                config.master_gain(),
            ));
            let sampler = Sampler::new(mixer.clone(), settings);
            sampler.import_instrument(&demo::sine_instrument(config.sample_rate()))?;

            let device = OutputDevice::open(config.device(), mixer)?;
            info!(device = device.name(), tempo_ms, "Playing demo");

            let tempo = Duration::from_millis(tempo_ms);
            for key in demo::arpeggio(DEMO_ROOT_KEY) {
                sampler.note_on(key);
                thread::sleep(tempo);
                sampler.note_off(key);
            }

            sampler.stop_all();
            thread::sleep(release + Duration::from_millis(100));
            info!(voices = sampler.active_voice_count(), "Demo finished");
        }
    }

    Ok(())
}
