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
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use clipsynth::audio;
use clipsynth::config::Config;
use clipsynth::notes::Instrument;
use clipsynth::AudioSystem;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays game sounds, music, and synthesized notes."
)]
struct Cli {
    /// The engine configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays a sound once and waits for it to finish.
    Sound {
        /// The sound file, relative to the configured assets directory.
        name: String,
        /// The volume, from 0 to 128.
        #[arg(short, long, default_value_t = 128)]
        volume: i32,
    },
    /// Plays music tracks in turn, switching tracks every few seconds.
    Music {
        /// The music files, relative to the configured assets directory.
        #[arg(required = true)]
        names: Vec<String>,
        /// Seconds to play each track before switching.
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
        /// The volume, from 0 to 128.
        #[arg(short, long, default_value_t = 128)]
        volume: i32,
    },
    /// Plays notes on one instrument at the same time.
    Notes {
        /// square, triangle, saw, sine, or wavetable.
        instrument: String,
        /// Note frequencies in Hz.
        #[arg(required = true)]
        frequencies: Vec<f32>,
        /// How long each note lasts, in synthesizer ticks.
        #[arg(short, long, default_value_t = 100)]
        ticks: u64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::deserialize(path)?,
        None => Config::default(),
    };

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
        Commands::Sound { name, volume } => {
            let system = AudioSystem::init(&config);
            if !system.clips().is_enabled() {
                return Err("clip playback is unavailable".into());
            }

            system.play_sound(&name, volume);
            while system.clips().clip_count() > 0 {
                thread::sleep(POLL_INTERVAL);
            }
            system.shutdown();
        }
        Commands::Music {
            names,
            seconds,
            volume,
        } => {
            let system = AudioSystem::init(&config);
            if !system.clips().is_enabled() {
                return Err("clip playback is unavailable".into());
            }

            for name in names.iter() {
                println!("Playing {}", name);
                system.play_music(name, volume);
                thread::sleep(Duration::from_secs(seconds));
            }
            system.shutdown();
        }
        Commands::Notes {
            instrument,
            frequencies,
            ticks,
        } => {
            let instrument: Instrument = instrument.parse()?;
            let system = AudioSystem::init(&config);
            if !system.notes().is_enabled() {
                return Err("note synthesis is unavailable".into());
            }

            for frequency in frequencies {
                system.trigger_note(frequency, ticks, instrument);
            }
            while system.notes().is_active() {
                thread::sleep(POLL_INTERVAL);
            }
            system.shutdown();
        }
    }

    Ok(())
}
