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
    collections::HashMap,
    error::Error,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::audio::OutputFormat;

pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_CHANNELS: u16 = 2;
pub const DEFAULT_BUFFER_FRAMES: u32 = 4096;
pub const DEFAULT_FADE_STEP: u8 = 2;
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// A YAML representation of the clip mixer configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Clips {
    /// Desired output sample rate in Hz (default: 48000).
    sample_rate: Option<u32>,

    /// Desired output channel count (default: 2).
    channels: Option<u16>,

    /// Desired frames per callback (default: 4096).
    buffer_frames: Option<u32>,

    /// Volume removed from a fading music track per callback (default: 2).
    fade_step: Option<u8>,

    /// Maximum number of queued one-shot sounds. Unlimited when unset.
    max_sounds: Option<usize>,

    /// Clips the queue holds before it has to allocate (default: 32).
    queue_capacity: Option<usize>,

    /// Base directory that clip names are resolved against.
    assets: Option<PathBuf>,

    /// Clips preloaded at startup and played from memory, by name.
    templates: Option<HashMap<String, String>>,
}

impl Clips {
    /// Returns the desired output format.
    pub fn output_format(&self) -> Result<OutputFormat, Box<dyn Error>> {
        OutputFormat::new(
            self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            self.channels.unwrap_or(DEFAULT_CHANNELS),
            self.buffer_frames.unwrap_or(DEFAULT_BUFFER_FRAMES),
        )
    }

    pub fn fade_step(&self) -> u8 {
        self.fade_step.unwrap_or(DEFAULT_FADE_STEP)
    }

    pub fn max_sounds(&self) -> Option<usize> {
        self.max_sounds
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    /// Returns the asset directory (default: the working directory).
    pub fn assets(&self) -> &Path {
        self.assets.as_deref().unwrap_or(Path::new("."))
    }

    /// Resolves a clip name to a file. Absolute paths are used as-is.
    pub fn asset_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.assets().join(path)
        }
    }

    /// Template names mapped to their asset names.
    pub fn templates(&self) -> Option<&HashMap<String, String>> {
        self.templates.as_ref()
    }
}
