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
use std::{f64::consts::PI, path::Path};

use tracing::debug;

use super::instrument::REFERENCE_FREQUENCY;
use crate::audio::{
    wav::{self, DecodeError},
    OutputFormat,
};

/// Relative strength of each harmonic in the built-in bowed-string cycle.
const VIOLIN_HARMONICS: [f64; 8] = [1.0, 0.62, 0.48, 0.30, 0.26, 0.14, 0.11, 0.06];

/// One cycle of a waveform, with entries in `0..=255`.
#[derive(Debug, Clone, PartialEq)]
pub struct Wavetable {
    table: Vec<f64>,
}

impl Wavetable {
    /// Builds the default bowed-string cycle, sized so that one table length
    /// lasts one period of the reference pitch at `sample_rate`.
    pub fn violin(sample_rate: u32) -> Wavetable {
        let len = ((sample_rate as f64 / REFERENCE_FREQUENCY).round() as usize).max(2);
        let raw: Vec<f64> = (0..len)
            .map(|i| {
                let t = i as f64 / len as f64;
                VIOLIN_HARMONICS
                    .iter()
                    .enumerate()
                    .map(|(k, amplitude)| amplitude * (2.0 * PI * (k + 1) as f64 * t).sin())
                    .sum()
            })
            .collect();

        let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = (max - min).max(f64::EPSILON);
        Wavetable {
            table: raw
                .into_iter()
                .map(|v| ((v - min) / span * 255.0).round())
                .collect(),
        }
    }

    /// Wraps raw table entries. Returns None for an empty table.
    pub fn from_samples(samples: Vec<u8>) -> Option<Wavetable> {
        if samples.is_empty() {
            return None;
        }
        Some(Wavetable {
            table: samples.into_iter().map(f64::from).collect(),
        })
    }

    /// Loads a single-cycle WAV file, resampled to `sample_rate` and mixed to
    /// mono.
    pub fn from_wav(path: &Path, sample_rate: u32) -> Result<Wavetable, DecodeError> {
        let format = OutputFormat {
            sample_rate,
            channels: 1,
            buffer_frames: 1,
        };
        let pcm = wav::decode_file(path, &format)?;
        let samples = pcm
            .samples
            .iter()
            .map(|&s| ((s as i32 + 32768) >> 8) as u8)
            .collect();

        let table =
            Wavetable::from_samples(samples).ok_or_else(|| DecodeError::Empty(path.into()))?;
        debug!(path = ?path, len = table.len(), "Loaded wavetable");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Reads the table at a fractional position, wrapping around and
    /// interpolating linearly between neighboring entries.
    pub fn lookup(&self, position: f64) -> f64 {
        let len = self.table.len();
        let position = position.max(0.0);
        let i = (position.floor() as usize) % len;
        let j = (i + 1) % len;
        let frac = position.fract();
        self.table[i] + (self.table[j] - self.table[i]) * frac
    }
}
