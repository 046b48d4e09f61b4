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

//! The note synthesizer.
//!
//! Time is measured in ticks: one tick is one device callback. Notes are kept
//! in trigger order and the first `max_polyphony` of them are rendered. When
//! no notes remain the synthesizer goes idle: its tick counter starts over and
//! the renderer asks the device to stop delivering callbacks. The next trigger
//! restarts the device.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use super::{Instrument, Wavetable};
use crate::audio::{self, OutputFormat, PauseHandle, Renderer};
use crate::config;

/// Lowest frequency a note is clamped to.
pub const MIN_FREQUENCY: f32 = 1.0;

const NOTE_CAPACITY: usize = 64;

/// One synthesized voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub frequency: f32,
    pub instrument: Instrument,
    pub start_tick: u64,
    pub end_tick: u64,
    /// Samples rendered since the note started.
    pub phase: u64,
}

/// What a trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A new note was added.
    Started,
    /// A note with the same frequency and instrument was lengthened.
    Extended,
}

struct SynthState {
    notes: Vec<Note>,
    tick: u64,
    sample_rate: u32,
    wavetable: Wavetable,
}

struct SynthShared {
    state: Mutex<SynthState>,
    active: AtomicBool,
    paused: AtomicBool,
    /// Lets the renderer stop its own stream. Set once the stream is open.
    pauser: OnceLock<Arc<dyn PauseHandle>>,
    max_polyphony: usize,
    ceiling: u8,
}

impl SynthShared {
    fn new(config: &config::Notes, sample_rate: u32) -> SynthShared {
        SynthShared {
            state: Mutex::new(SynthState {
                notes: Vec::with_capacity(NOTE_CAPACITY),
                tick: 0,
                sample_rate,
                wavetable: Wavetable::violin(sample_rate),
            }),
            active: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            pauser: OnceLock::new(),
            max_polyphony: config.max_polyphony(),
            ceiling: config.ceiling(),
        }
    }

    /// Runs with the state lock held, so a trigger either lands before this
    /// and keeps the synthesizer running or sees the pause afterwards.
    fn go_idle(&self, state: &mut SynthState) {
        self.active.store(false, Ordering::Release);
        state.tick = 0;
        if let Some(pauser) = self.pauser.get() {
            if !self.paused.swap(true, Ordering::AcqRel) {
                pauser.request_paused(true);
            }
        }
    }
}

impl Renderer for SynthShared {
    fn render(&self, out: &mut [i16], channels: u16) {
        out.fill(0);
        if self.paused.load(Ordering::Acquire) {
            return;
        }
        let Some(mut state) = self.state.try_lock() else {
            return;
        };

        let tick = state.tick;
        state.notes.retain(|note| note.end_tick > tick);
        if state.notes.is_empty() {
            self.go_idle(&mut state);
            return;
        }

        let SynthState {
            notes,
            sample_rate,
            wavetable,
            ..
        } = &mut *state;
        let voices = notes.len().min(self.max_polyphony);
        let ceiling = self.ceiling as f64;

        for frame in out.chunks_mut(channels.max(1) as usize) {
            let mut sum = 0.0;
            for note in notes[..voices].iter_mut() {
                sum += note
                    .instrument
                    .sample(note.phase, note.frequency, *sample_rate, wavetable);
                note.phase += 1;
            }
            let value = sum.clamp(0.0, ceiling) as u8;
            frame.fill(<i16 as cpal::Sample>::from_sample(value));
        }

        state.tick += 1;
    }
}

/// Clamps a requested frequency into the range the waveforms can render.
fn clamp_frequency(frequency: f32, sample_rate: u32) -> f32 {
    if !frequency.is_finite() {
        return MIN_FREQUENCY;
    }
    let nyquist = (sample_rate as f32 / 2.0).max(MIN_FREQUENCY);
    frequency.clamp(MIN_FREQUENCY, nyquist)
}

/// Synthesizes notes into a mono stream.
pub struct NoteSynth {
    shared: Arc<SynthShared>,
    stream: Mutex<Option<Box<dyn audio::Stream>>>,
    format: OutputFormat,
    tick_bounds: (u64, u64),
}

impl NoteSynth {
    /// Opens a stream on `device`. The synthesizer is inert if it is disabled
    /// in the config or the device can't be opened.
    pub fn open(device: &dyn audio::Device, config: &config::Notes) -> NoteSynth {
        let span = span!(Level::INFO, "note synth");
        let _enter = span.enter();

        if !config.enabled() {
            info!("Note synthesizer disabled");
            return NoteSynth::inert(config);
        }
        let desired = match config.output_format() {
            Ok(desired) => desired,
            Err(e) => {
                warn!(err = e.as_ref(), "Invalid note format, synthesizer disabled");
                return NoteSynth::inert(config);
            }
        };

        let shared = Arc::new(SynthShared::new(config, desired.sample_rate));
        let renderer: Arc<dyn Renderer> = shared.clone();
        let stream = match device.open(&desired, renderer) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    err = %e,
                    device = %device,
                    "Unable to open note stream, synthesizer disabled"
                );
                return NoteSynth::inert(config);
            }
        };

        let format = *stream.format();
        let _ = shared.pauser.set(stream.pause_handle());
        let wavetable = load_wavetable(config, format.sample_rate);
        {
            let mut state = shared.state.lock();
            state.sample_rate = format.sample_rate;
            state.wavetable = wavetable;
        }

        info!(device = %device, format = %format, "Note synthesizer started");
        NoteSynth {
            shared,
            stream: Mutex::new(Some(stream)),
            format,
            tick_bounds: config.tick_bounds(),
        }
    }

    /// Creates a synthesizer with no stream.
    pub fn inert(config: &config::Notes) -> NoteSynth {
        let format = config.output_format().unwrap_or_default();
        NoteSynth {
            shared: Arc::new(SynthShared::new(config, format.sample_rate)),
            stream: Mutex::new(None),
            format,
            tick_bounds: config.tick_bounds(),
        }
    }

    /// Starts a note, or extends it if the same frequency and instrument is
    /// already sounding. Out of range parameters are clamped. Returns None if
    /// the synthesizer is inert.
    pub fn trigger_note(
        &self,
        frequency: f32,
        duration_ticks: u64,
        instrument: Instrument,
    ) -> Option<Trigger> {
        if !self.is_enabled() {
            return None;
        }

        let (min_ticks, max_ticks) = self.tick_bounds;
        let duration = duration_ticks.clamp(min_ticks, max_ticks);
        let frequency = clamp_frequency(frequency, self.format.sample_rate);

        let trigger = {
            let mut state = self.shared.state.lock();
            let tick = state.tick;
            self.shared.active.store(true, Ordering::Release);

            match state
                .notes
                .iter_mut()
                .find(|note| note.frequency == frequency && note.instrument == instrument)
            {
                Some(note) => {
                    note.end_tick = tick + duration;
                    Trigger::Extended
                }
                None => {
                    state.notes.push(Note {
                        frequency,
                        instrument,
                        start_tick: tick,
                        end_tick: tick + duration,
                        phase: 0,
                    });
                    Trigger::Started
                }
            }
        };

        debug!(frequency, duration, %instrument, ?trigger, "Note triggered");
        // Covers both an explicit pause and an idle stop.
        if self.is_paused() {
            self.resume_all();
        }
        Some(trigger)
    }

    /// Pauses playback. Does nothing if already paused.
    pub fn pause_all(&self) {
        self.set_paused(true);
    }

    /// Resumes playback. Does nothing if not paused.
    pub fn resume_all(&self) {
        self.set_paused(false);
    }

    fn set_paused(&self, paused: bool) {
        if self.shared.paused.swap(paused, Ordering::AcqRel) == paused {
            return;
        }
        if let Some(stream) = self.stream.lock().as_ref() {
            if let Err(e) = stream.set_paused(paused) {
                warn!(err = %e, paused, "Unable to change note stream state");
            }
        }
    }

    /// True while the device is stopped, either by `pause_all` or because the
    /// synthesizer went idle.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// True while at least one note is sounding.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// True while a stream is open.
    pub fn is_enabled(&self) -> bool {
        self.stream.lock().is_some()
    }

    pub fn note_count(&self) -> usize {
        self.shared.state.lock().notes.len()
    }

    /// A snapshot of the current notes in trigger order.
    pub fn notes(&self) -> Vec<Note> {
        self.shared.state.lock().notes.clone()
    }

    /// Ticks since the synthesizer last went active.
    pub fn tick(&self) -> u64 {
        self.shared.state.lock().tick
    }

    /// The negotiated stream format.
    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// Stops the stream and drops every note. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let Some(stream) = self.stream.lock().take() else {
            return;
        };
        if let Err(e) = stream.set_paused(true) {
            debug!(err = %e, "Note stream already closed");
        }
        {
            let mut state = self.shared.state.lock();
            state.notes.clear();
            state.tick = 0;
        }
        self.shared.active.store(false, Ordering::Release);
        drop(stream);
        info!("Note synthesizer stopped");
    }
}

impl Drop for NoteSynth {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn load_wavetable(config: &config::Notes, sample_rate: u32) -> Wavetable {
    match config.wavetable() {
        Some(path) => Wavetable::from_wav(path, sample_rate).unwrap_or_else(|e| {
            warn!(err = %e, "Unable to load wavetable, using built-in");
            Wavetable::violin(sample_rate)
        }),
        None => Wavetable::violin(sample_rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::testutil::write_wav;

    const A4: f32 = 440.0;

    fn notes_config(yaml: &str) -> crate::config::Notes {
        let yaml = format!("notes:\n  buffer_frames: 64\n{}", yaml);
        crate::config::Config::parse(&yaml)
            .unwrap()
            .notes()
            .clone()
    }

    fn synth(yaml: &str) -> (mock::Device, NoteSynth) {
        let device = mock::Device::get("mock");
        let synth = NoteSynth::open(&device, &notes_config(yaml));
        (device, synth)
    }

    fn ceiling_sample() -> i16 {
        <i16 as cpal::Sample>::from_sample(235u8)
    }

    #[test]
    fn test_retrigger_extends_note() {
        let (device, synth) = synth("");
        assert_eq!(synth.trigger_note(A4, 10, Instrument::Sine), Some(Trigger::Started));
        for _ in 0..3 {
            device.pump_buffer().unwrap();
        }
        assert_eq!(synth.tick(), 3);

        assert_eq!(synth.trigger_note(A4, 20, Instrument::Sine), Some(Trigger::Extended));
        let notes = synth.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].start_tick, 0);
        assert_eq!(notes[0].end_tick, 23);
        assert_eq!(notes[0].phase, 3 * 64);
    }

    #[test]
    fn test_same_frequency_other_instrument_is_separate() {
        let (_device, synth) = synth("");
        synth.trigger_note(A4, 10, Instrument::Sine);
        assert_eq!(synth.trigger_note(A4, 10, Instrument::Saw), Some(Trigger::Started));
        assert_eq!(synth.note_count(), 2);
    }

    #[test]
    fn test_two_squares_clamp_to_ceiling() {
        let (device, synth) = synth("");
        synth.trigger_note(A4, 10, Instrument::Square);
        synth.trigger_note(880.0, 10, Instrument::Square);

        let out = device.pump_buffer().unwrap();
        assert_eq!(out[0], ceiling_sample());
    }

    #[test]
    fn test_ceiling_holds_for_all_instruments() {
        for instrument in Instrument::ALL {
            let (device, synth) = synth("");
            synth.trigger_note(A4, 50, instrument);
            synth.trigger_note(A4 * 1.5, 50, instrument);
            synth.trigger_note(A4 * 2.0, 50, instrument);

            for _ in 0..40 {
                let out = device.pump_buffer().unwrap();
                assert!(
                    out.iter().all(|&s| s <= ceiling_sample()),
                    "{instrument} exceeded the ceiling"
                );
            }
        }
    }

    #[test]
    fn test_trigger_activates_immediately() {
        let (device, synth) = synth("");
        assert!(!synth.is_active());
        let out = device.pump_buffer().unwrap();
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(synth.tick(), 0);
        // Nothing to play, so the first callback stops the device.
        assert_eq!(device.is_paused(), Some(true));
        assert!(device.pump_buffer().is_none());

        synth.trigger_note(A4, 5, Instrument::Triangle);
        assert!(synth.is_active());
        assert_eq!(device.is_paused(), Some(false));
        assert!(device.pump_buffer().is_some());
        assert_eq!(synth.tick(), 1);
    }

    #[test]
    fn test_expiry_goes_idle() {
        let (device, synth) = synth("");
        synth.trigger_note(A4, 1, Instrument::Square);
        assert_eq!(synth.notes()[0].end_tick, 5);

        for _ in 0..5 {
            device.pump_buffer().unwrap();
        }
        assert_eq!(synth.tick(), 5);
        assert!(synth.is_active());

        let out = device.pump_buffer().unwrap();
        assert!(out.iter().all(|&s| s == 0));
        assert!(!synth.is_active());
        assert_eq!(synth.note_count(), 0);
        assert_eq!(synth.tick(), 0);
    }

    #[test]
    fn test_idle_stops_device_until_next_trigger() {
        let (device, synth) = synth("");
        synth.trigger_note(A4, 5, Instrument::Square);
        for _ in 0..6 {
            device.pump_buffer().unwrap();
        }
        assert!(!synth.is_active());
        assert!(synth.is_paused());
        assert_eq!(device.is_paused(), Some(true));

        let callbacks = device.callbacks();
        for _ in 0..10 {
            assert!(device.pump_buffer().is_none());
        }
        assert_eq!(device.callbacks(), callbacks);
        assert_eq!(synth.tick(), 0);

        assert_eq!(synth.trigger_note(A4, 5, Instrument::Square), Some(Trigger::Started));
        assert_eq!(device.is_paused(), Some(false));
        assert!(!synth.is_paused());
        let out = device.pump_buffer().unwrap();
        assert!(out.iter().any(|&s| s != 0));
        assert_eq!(synth.notes()[0].start_tick, 0);
    }

    #[test]
    fn test_polyphony_cap() {
        let (device, synth) = synth("");
        synth.trigger_note(200.0, 10, Instrument::Sine);
        synth.trigger_note(300.0, 10, Instrument::Sine);
        synth.trigger_note(400.0, 10, Instrument::Sine);

        device.pump_buffer().unwrap();
        let notes = synth.notes();
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].phase, 64);
        assert_eq!(notes[1].phase, 64);
        assert_eq!(notes[2].phase, 0);
    }

    #[test]
    fn test_parameters_are_clamped() {
        let (_device, synth) = synth("");
        synth.trigger_note(100_000.0, 0, Instrument::Saw);
        synth.trigger_note(f32::NAN, 10_000, Instrument::Saw);
        synth.trigger_note(-5.0, 7, Instrument::Sine);

        let notes = synth.notes();
        assert_eq!(notes[0].frequency, 22050.0);
        assert_eq!(notes[0].end_tick, 5);
        assert_eq!(notes[1].frequency, MIN_FREQUENCY);
        assert_eq!(notes[1].end_tick, 500);
        assert_eq!(notes[2].frequency, MIN_FREQUENCY);
        assert_eq!(notes[2].end_tick, 7);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let (device, synth) = synth("");
        synth.pause_all();
        synth.pause_all();
        assert!(synth.is_paused());
        assert_eq!(device.is_paused(), Some(true));

        synth.resume_all();
        synth.resume_all();
        assert_eq!(device.is_paused(), Some(false));
    }

    #[test]
    fn test_trigger_resumes_paused_stream() {
        let (device, synth) = synth("");
        synth.pause_all();
        synth.trigger_note(A4, 10, Instrument::Sine);
        assert!(!synth.is_paused());
        assert_eq!(device.is_paused(), Some(false));
    }

    #[test]
    fn test_disabled_is_inert() {
        let (device, synth) = synth("  enabled: false\n");
        assert!(!synth.is_enabled());
        assert!(!device.is_open());
        assert_eq!(synth.trigger_note(A4, 10, Instrument::Sine), None);
        synth.pause_all();
        synth.shutdown();
    }

    #[test]
    fn test_unavailable_device_is_inert() {
        let device = mock::Device::get("mock-unavailable");
        let synth = NoteSynth::open(&device, &notes_config(""));
        assert!(!synth.is_enabled());
        assert_eq!(synth.trigger_note(A4, 10, Instrument::Sine), None);
        assert_eq!(synth.note_count(), 0);
    }

    #[test]
    fn test_wavetable_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycle.wav");
        write_wav(path.clone(), vec![vec![i16::MAX; 4]], 44100).unwrap();

        let (device, synth) = synth(&format!("  wavetable: {}\n", path.display()));
        synth.trigger_note(A4, 10, Instrument::Wavetable);
        let out = device.pump_buffer().unwrap();
        // 255 / 2 truncates to 127.
        assert!(out.iter().all(|&s| s == <i16 as cpal::Sample>::from_sample(127u8)));
    }

    #[test]
    fn test_shutdown() {
        let (device, synth) = synth("");
        synth.trigger_note(A4, 10, Instrument::Sine);
        synth.shutdown();
        assert!(!device.is_open());
        assert!(!synth.is_active());
        assert_eq!(synth.note_count(), 0);
        assert_eq!(synth.trigger_note(A4, 10, Instrument::Sine), None);
        synth.shutdown();
    }
}
