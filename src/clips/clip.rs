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

//! A single playback instance of a sampled sound or music track.

use std::sync::Arc;

use crate::audio::wav::Pcm;

/// Full gain. Volumes are clamped to `0..=MAX_VOLUME`.
pub const MAX_VOLUME: u8 = 128;

/// Clamps a requested volume into the valid gain range.
pub fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, MAX_VOLUME as i32) as u8
}

/// One active playback instance. Lengths and cursors count interleaved
/// samples of the stream format.
#[derive(Debug, Clone)]
pub struct Clip {
    name: Arc<str>,
    buffer: Arc<[i16]>,
    origin_cursor: usize,
    read_cursor: usize,
    total_length: usize,
    remaining_length: usize,
    is_looping: bool,
    is_fading: bool,
    owns_buffer: bool,
    volume: u8,
}

impl Clip {
    /// Creates a clip that owns freshly decoded PCM.
    pub fn from_pcm(name: &str, pcm: Pcm, looping: bool, volume: i32) -> Clip {
        let buffer: Arc<[i16]> = pcm.samples.into();
        let total_length = buffer.len();
        Clip {
            name: name.into(),
            buffer,
            origin_cursor: 0,
            read_cursor: 0,
            total_length,
            remaining_length: total_length,
            is_looping: looping,
            is_fading: false,
            owns_buffer: true,
            volume: clamp_volume(volume),
        }
    }

    /// Creates a playback instance that shares this clip's buffer. The copy
    /// starts at the template's origin and does not own the buffer.
    pub fn duplicate(&self, looping: bool, volume: i32) -> Clip {
        Clip {
            name: self.name.clone(),
            buffer: self.buffer.clone(),
            origin_cursor: self.origin_cursor,
            read_cursor: self.origin_cursor,
            total_length: self.total_length,
            remaining_length: self.total_length,
            is_looping: looping,
            is_fading: false,
            owns_buffer: false,
            volume: clamp_volume(volume),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remaining_length(&self) -> usize {
        self.remaining_length
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn origin_cursor(&self) -> usize {
        self.origin_cursor
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub fn is_fading(&self) -> bool {
        self.is_fading
    }

    pub fn owns_buffer(&self) -> bool {
        self.owns_buffer
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Music that is still playing normally.
    pub(crate) fn is_playing_music(&self) -> bool {
        self.is_looping && !self.is_fading
    }

    /// Music that has been marked to fade out.
    pub(crate) fn is_fading_music(&self) -> bool {
        self.is_looping && self.is_fading
    }

    pub(crate) fn start_fade(&mut self) {
        self.is_fading = true;
    }

    /// Cuts the clip so the next callback collects it.
    pub(crate) fn silence(&mut self) {
        self.remaining_length = 0;
        self.volume = 0;
    }

    /// Steps the fade down by `step`. Once the volume is already zero the clip
    /// is exhausted instead.
    pub(crate) fn fade_step(&mut self, step: u8) {
        if self.volume > 0 {
            self.volume = self.volume.saturating_sub(step);
        } else {
            self.remaining_length = 0;
        }
    }

    /// Rewinds to the origin for another pass of the loop.
    pub(crate) fn restart(&mut self) {
        self.read_cursor = self.origin_cursor;
        self.remaining_length = self.total_length;
    }

    /// True if this clip restarts instead of being collected when exhausted.
    pub(crate) fn restarts(&self) -> bool {
        self.is_playing_music() && self.total_length > 0
    }

    /// Mixes as much of the clip as fits into `out`. A restarting loop that
    /// runs out mid-buffer continues from its origin.
    pub(crate) fn mix_into(&mut self, out: &mut [i16]) {
        let mut offset = 0;
        while offset < out.len() && self.remaining_length > 0 {
            let count = (out.len() - offset).min(self.remaining_length);
            let end = self.read_cursor + count;
            mix_s16(
                &mut out[offset..offset + count],
                &self.buffer[self.read_cursor..end],
                self.volume,
            );
            self.read_cursor = end;
            self.remaining_length -= count;
            offset += count;

            if self.remaining_length == 0 && self.restarts() {
                self.restart();
            }
        }
    }
}

/// Adds `src` into `dst` at `volume`, saturating at the i16 range.
pub fn mix_s16(dst: &mut [i16], src: &[i16], volume: u8) {
    if volume == 0 {
        return;
    }

    for (d, &s) in dst.iter_mut().zip(src) {
        let scaled = (s as i32 * volume as i32) / MAX_VOLUME as i32;
        *d = (*d as i32 + scaled).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
}
