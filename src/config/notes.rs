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
use std::{
    error::Error,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::audio::OutputFormat;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;
pub const DEFAULT_MAX_POLYPHONY: usize = 2;
pub const DEFAULT_MIN_TICKS: u64 = 5;
pub const DEFAULT_MAX_TICKS: u64 = 500;
/// The safe maximum of the unsigned 8-bit mono format.
pub const DEFAULT_CEILING: u8 = 235;

/// A YAML representation of the note synthesizer configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Notes {
    /// Whether the synthesizer opens a stream at all (default: true).
    enabled: Option<bool>,

    /// Desired output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Frames per callback. One callback is one tick (default: 512).
    buffer_frames: Option<u32>,

    /// Number of notes rendered at once (default: 2).
    max_polyphony: Option<usize>,

    /// Shortest note duration in ticks (default: 5).
    min_ticks: Option<u64>,

    /// Longest note duration in ticks (default: 500).
    max_ticks: Option<u64>,

    /// Highest value a mixed sample may reach (default: 235).
    ceiling: Option<u8>,

    /// A WAV file holding one cycle for the wavetable instrument.
    wavetable: Option<PathBuf>,
}

impl Notes {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Returns the desired output format. The synthesizer is always mono.
    pub fn output_format(&self) -> Result<OutputFormat, Box<dyn Error>> {
        OutputFormat::new(
            self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            1,
            self.buffer_frames.unwrap_or(DEFAULT_BUFFER_FRAMES),
        )
    }

    pub fn max_polyphony(&self) -> usize {
        self.max_polyphony.unwrap_or(DEFAULT_MAX_POLYPHONY).max(1)
    }

    /// Returns the duration bounds in ticks as (min, max). A max below the min
    /// is raised to the min.
    pub fn tick_bounds(&self) -> (u64, u64) {
        let min = self.min_ticks.unwrap_or(DEFAULT_MIN_TICKS);
        let max = self.max_ticks.unwrap_or(DEFAULT_MAX_TICKS).max(min);
        (min, max)
    }

    pub fn ceiling(&self) -> u8 {
        self.ceiling.unwrap_or(DEFAULT_CEILING)
    }

    pub fn wavetable(&self) -> Option<&Path> {
        self.wavetable.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let notes = Notes::default();
        assert!(notes.enabled());
        let format = notes.output_format().unwrap();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.channels, 1);
        assert_eq!(format.buffer_frames, 512);
        assert_eq!(notes.max_polyphony(), 2);
        assert_eq!(notes.tick_bounds(), (5, 500));
        assert_eq!(notes.ceiling(), 235);
        assert!(notes.wavetable().is_none());
    }

    #[test]
    fn test_parse() {
        let yaml = r#"
            enabled: false
            sample_rate: 22050
            max_polyphony: 0
            min_ticks: 10
            max_ticks: 3
            wavetable: tables/violin.wav
        "#;

        let notes: Notes = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(!notes.enabled());
        assert_eq!(notes.output_format().unwrap().sample_rate, 22050);
        assert_eq!(notes.max_polyphony(), 1);
        assert_eq!(notes.tick_bounds(), (10, 10));
        assert_eq!(notes.wavetable(), Some(Path::new("tables/violin.wav")));
    }
}
