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
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{DeviceError, OutputFormat, PauseHandle, Renderer};

/// State shared between a mock stream and the device that opened it.
struct StreamState {
    format: OutputFormat,
    renderer: Arc<dyn Renderer>,
    paused: AtomicBool,
    closed: AtomicBool,
    callbacks: AtomicU64,
}

/// A mock device. Doesn't actually play anything: callbacks are delivered only
/// when `pump` is called, which lets tests step the engines one buffer at a time.
#[derive(Clone)]
pub struct Device {
    name: String,
    unavailable: bool,
    streams: Arc<Mutex<Vec<Arc<StreamState>>>>,
}

impl Device {
    /// Gets the given mock device. Names ending in "unavailable" refuse to open.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            unavailable: name.ends_with("unavailable"),
            streams: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn stream(&self, index: usize) -> Option<Arc<StreamState>> {
        self.streams.lock().get(index).cloned()
    }

    fn latest(&self) -> Option<Arc<StreamState>> {
        self.streams.lock().last().cloned()
    }

    /// Number of streams opened on this device so far.
    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Delivers one callback of `frames` frames to the most recently opened
    /// stream. Returns None when no callback would be delivered (no stream,
    /// paused, or closed).
    pub fn pump(&self, frames: usize) -> Option<Vec<i16>> {
        let state = self.latest()?;
        deliver(&state, frames)
    }

    /// Delivers one callback of the negotiated buffer size.
    pub fn pump_buffer(&self) -> Option<Vec<i16>> {
        let state = self.latest()?;
        deliver(&state, state.format.buffer_frames as usize)
    }

    /// Delivers one callback of the negotiated buffer size to the stream
    /// opened `index`th.
    pub fn pump_stream(&self, index: usize) -> Option<Vec<i16>> {
        let state = self.stream(index)?;
        deliver(&state, state.format.buffer_frames as usize)
    }

    /// Returns whether the latest stream is paused, or None without a stream.
    pub fn is_paused(&self) -> Option<bool> {
        self.latest()
            .map(|state| state.paused.load(Ordering::Acquire))
    }

    /// Returns true if any stream is open and not yet closed.
    pub fn is_open(&self) -> bool {
        self.streams
            .lock()
            .iter()
            .any(|state| !state.closed.load(Ordering::Acquire))
    }

    /// Number of callbacks delivered to the latest stream.
    pub fn callbacks(&self) -> u64 {
        self.latest()
            .map_or(0, |state| state.callbacks.load(Ordering::Relaxed))
    }
}

fn deliver(state: &StreamState, frames: usize) -> Option<Vec<i16>> {
    if state.paused.load(Ordering::Acquire) || state.closed.load(Ordering::Acquire) {
        return None;
    }

    let channels = state.format.channels;
    let mut out = vec![0i16; frames * channels as usize];
    state.renderer.render(&mut out, channels);
    state.callbacks.fetch_add(1, Ordering::Relaxed);
    Some(out)
}

impl super::Device for Device {
    fn open(
        &self,
        desired: &OutputFormat,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Box<dyn super::Stream>, DeviceError> {
        let span = span!(Level::INFO, "open stream (mock)");
        let _enter = span.enter();

        if self.unavailable {
            return Err(DeviceError::Unavailable(self.name.clone()));
        }

        let state = Arc::new(StreamState {
            format: *desired,
            renderer,
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            callbacks: AtomicU64::new(0),
        });
        self.streams.lock().push(state.clone());

        info!(device = self.name, format = %desired, "Opened stream.");
        Ok(Box::new(Stream { state }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

/// A stream on the mock device.
pub struct Stream {
    state: Arc<StreamState>,
}

impl super::Stream for Stream {
    fn format(&self) -> &OutputFormat {
        &self.state.format
    }

    fn set_paused(&self, paused: bool) -> Result<(), DeviceError> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(DeviceError::Disconnected);
        }
        self.state.paused.store(paused, Ordering::Release);
        Ok(())
    }

    fn pause_handle(&self) -> Arc<dyn PauseHandle> {
        Arc::new(Pauser {
            state: self.state.clone(),
        })
    }
}

/// Flips the shared paused flag directly, as a real device would once its
/// output thread handled the request.
struct Pauser {
    state: Arc<StreamState>,
}

impl PauseHandle for Pauser {
    fn request_paused(&self, paused: bool) {
        if !self.state.closed.load(Ordering::Acquire) {
            self.state.paused.store(paused, Ordering::Release);
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::Release);
    }
}

/// A renderer that only writes silence.
#[cfg(test)]
pub struct Silence;

#[cfg(test)]
impl Renderer for Silence {
    fn render(&self, out: &mut [i16], _channels: u16) {
        out.fill(0);
    }
}
