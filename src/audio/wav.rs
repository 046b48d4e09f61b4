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

//! WAV decoding into the engine's PCM layout.
//!
//! Files are read completely into memory and converted to the stream's
//! channel count and sample rate, so the mixer can add them straight into
//! device buffers.

use std::path::{Path, PathBuf};

use hound::WavReader;
use tracing::{debug, info};

use super::OutputFormat;

/// Error types for decoding sample files
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("{0} contains no samples")]
    Empty(PathBuf),
}

/// Decoded PCM: interleaved signed 16-bit samples.
#[derive(Debug, Clone)]
pub struct Pcm {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Pcm {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Decodes the WAV file at `path` and converts it to `format`'s channel count
/// and sample rate.
pub fn decode_file(path: &Path, format: &OutputFormat) -> Result<Pcm, DecodeError> {
    let wav_error = |source| DecodeError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let reader = WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let samples = read_samples(reader).map_err(wav_error)?;
    if samples.is_empty() || spec.channels == 0 {
        return Err(DecodeError::Empty(path.to_path_buf()));
    }

    let samples = remix(&samples, spec.channels, format.channels);
    let samples = if spec.sample_rate != format.sample_rate {
        info!(
            path = ?path,
            source_rate = spec.sample_rate,
            target_rate = format.sample_rate,
            "Transcoding sample"
        );
        transcode_samples(
            &samples,
            format.channels,
            spec.sample_rate,
            format.sample_rate,
        )
    } else {
        samples
    };

    let pcm = Pcm {
        samples: samples.iter().map(|&s| to_i16(s)).collect(),
        channels: format.channels,
        sample_rate: format.sample_rate,
    };

    debug!(
        path = ?path,
        channels = pcm.channels,
        sample_rate = pcm.sample_rate,
        frames = pcm.frames(),
        "Decoded sample"
    );
    Ok(pcm)
}

/// Reads every sample as f32 in [-1.0, 1.0].
fn read_samples<R: std::io::Read>(mut reader: WavReader<R>) -> Result<Vec<f32>, hound::Error> {
    let spec = reader.spec();
    match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            // Use i64 to avoid overflow for 32-bit samples
            let scale_factor = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale_factor))
                .collect()
        }
    }
}

/// Converts interleaved samples from one channel count to another. Mono is
/// copied to every output channel; wider layouts are averaged down to mono or
/// truncated/padded channel by channel.
fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }

    let from = from as usize;
    let to = to as usize;
    let frames = samples.len() / from;
    let mut output = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        if from == 1 {
            output.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            output.extend((0..to).map(|ch| frame.get(ch).copied().unwrap_or(0.0)));
        }
    }

    output
}

/// Transcodes samples from one sample rate to another using linear interpolation.
/// Simple, and sufficient for game sound effects and music loops.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
