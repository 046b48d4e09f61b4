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

use std::{error::Error, fmt};

/// The output format of a stream: what an engine asks for when opening a device,
/// and what the device actually gives back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Requested frames per callback
    pub buffer_frames: u32,
}

impl OutputFormat {
    /// Creates a new OutputFormat
    pub fn new(
        sample_rate: u32,
        channels: u16,
        buffer_frames: u32,
    ) -> Result<Self, Box<dyn Error>> {
        if sample_rate == 0 {
            return Err("Sample rate must be greater than 0".into());
        }
        if channels == 0 {
            return Err("Channel count must be greater than 0".into());
        }
        if buffer_frames == 0 {
            return Err("Buffer size must be greater than 0".into());
        }

        Ok(OutputFormat {
            sample_rate,
            channels,
            buffer_frames,
        })
    }

    /// Number of interleaved samples in one callback buffer.
    pub fn buffer_samples(&self) -> usize {
        self.buffer_frames as usize * self.channels as usize
    }
}

impl Default for OutputFormat {
    /// 48kHz stereo with 4096 frames per callback.
    fn default() -> Self {
        OutputFormat {
            sample_rate: 48000,
            channels: 2,
            buffer_frames: 4096,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz, {}ch, {} frames",
            self.sample_rate, self.channels, self.buffer_frames
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_new() {
        let format = OutputFormat::new(44100, 1, 512).unwrap();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.channels, 1);
        assert_eq!(format.buffer_frames, 512);

        let format = OutputFormat::new(48000, 2, 4096).unwrap();
        assert_eq!(format.buffer_samples(), 8192);
    }

    #[test]
    fn test_output_format_new_invalid() {
        assert!(OutputFormat::new(0, 2, 512).is_err());
        assert!(OutputFormat::new(44100, 0, 512).is_err());
        assert!(OutputFormat::new(44100, 2, 0).is_err());
    }

    #[test]
    fn test_output_format_default() {
        let format = OutputFormat::default();
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.channels, 2);
        assert_eq!(format.buffer_frames, 4096);
    }

    #[test]
    fn test_output_format_display() {
        let format = OutputFormat::new(44100, 1, 512).unwrap();
        assert_eq!(format!("{}", format), "44100Hz, 1ch, 512 frames");
    }
}
