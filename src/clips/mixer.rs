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

//! The clip mixer: sound effects and music tracks mixed into one stream.
//!
//! Producers splice clips into the queue under its mutex, and each splice is a
//! constant number of pointer updates apart from the fade pass a new music
//! track makes. The device callback waits at most `SPLICE_WAIT` for the lock.
//! Only a producer that holds it longer than that (in practice `shutdown`
//! dropping every clip) costs a buffer of silence.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use super::{Clip, ClipQueue};
use crate::audio::{
    self,
    wav::{self, DecodeError},
    OutputFormat, Renderer,
};
use crate::config;

/// Longest the callback waits for a producer to finish a splice.
const SPLICE_WAIT: Duration = Duration::from_millis(5);

/// State shared between the mixer and its stream callback.
struct MixerShared {
    queue: Mutex<ClipQueue>,
    paused: AtomicBool,
    fade_step: u8,
}

impl MixerShared {
    fn new(config: &config::Clips) -> MixerShared {
        MixerShared {
            queue: Mutex::new(ClipQueue::with_capacity(config.queue_capacity())),
            paused: AtomicBool::new(false),
            fade_step: config.fade_step(),
        }
    }
}

impl Renderer for MixerShared {
    fn render(&self, out: &mut [i16], _channels: u16) {
        out.fill(0);
        if self.paused.load(Ordering::Acquire) {
            return;
        }
        let Some(mut queue) = self.queue.try_lock_for(SPLICE_WAIT) else {
            return;
        };

        let mut fading_music_seen = false;
        queue.walk_mut(|clip| {
            if clip.remaining_length() > 0 {
                if clip.is_fading_music() {
                    fading_music_seen = true;
                    clip.fade_step(self.fade_step);
                    if clip.remaining_length() > 0 {
                        clip.mix_into(out);
                    }
                } else if !(fading_music_seen && clip.is_playing_music()) {
                    clip.mix_into(out);
                }
            }

            if clip.remaining_length() > 0 {
                return true;
            }
            if clip.restarts() {
                clip.restart();
                return true;
            }
            false
        });
    }
}

/// Mixes sound effects and looping music into a single output stream.
pub struct ClipMixer {
    shared: Arc<MixerShared>,
    stream: Mutex<Option<Box<dyn audio::Stream>>>,
    format: OutputFormat,
    config: config::Clips,
}

impl ClipMixer {
    /// Opens a stream on `device`. If the device can't be opened, the mixer is
    /// returned inert and every play call is a no-op.
    pub fn open(device: &dyn audio::Device, config: &config::Clips) -> ClipMixer {
        let span = span!(Level::INFO, "clip mixer");
        let _enter = span.enter();

        let desired = match config.output_format() {
            Ok(desired) => desired,
            Err(e) => {
                warn!(err = e.as_ref(), "Invalid clip format, clip playback disabled");
                return ClipMixer::inert(config);
            }
        };

        let shared = Arc::new(MixerShared::new(config));
        let renderer: Arc<dyn Renderer> = shared.clone();
        match device.open(&desired, renderer) {
            Ok(stream) => {
                let format = *stream.format();
                info!(device = %device, format = %format, "Clip mixer started");
                ClipMixer {
                    shared,
                    stream: Mutex::new(Some(stream)),
                    format,
                    config: config.clone(),
                }
            }
            Err(e) => {
                warn!(
                    err = %e,
                    device = %device,
                    "Unable to open clip stream, clip playback disabled"
                );
                ClipMixer::inert(config)
            }
        }
    }

    /// Creates a mixer with no stream.
    pub fn inert(config: &config::Clips) -> ClipMixer {
        ClipMixer {
            shared: Arc::new(MixerShared::new(config)),
            stream: Mutex::new(None),
            format: config.output_format().unwrap_or_default(),
            config: config.clone(),
        }
    }

    /// Decodes the named asset into a template clip in the stream format.
    pub fn load_clip(&self, name: &str, looping: bool, volume: i32) -> Result<Clip, DecodeError> {
        let path = self.config.asset_path(name);
        let pcm = wav::decode_file(&path, &self.format)?;
        Ok(Clip::from_pcm(name, pcm, looping, volume))
    }

    /// Plays the named asset once.
    pub fn play_sound(&self, name: &str, volume: i32) {
        if !self.is_enabled() {
            return;
        }
        match self.load_clip(name, false, volume) {
            Ok(clip) => self.enqueue_sound(clip),
            Err(e) => warn!(err = %e, name, "Unable to play sound"),
        }
    }

    /// Loops the named asset, fading out whatever music is playing.
    pub fn play_music(&self, name: &str, volume: i32) {
        if !self.is_enabled() {
            return;
        }
        match self.load_clip(name, true, volume) {
            Ok(clip) => self.enqueue_music(clip),
            Err(e) => warn!(err = %e, name, "Unable to play music"),
        }
    }

    /// Plays a template clip once, sharing its buffer.
    pub fn play_sound_from_template(&self, template: &Clip, volume: i32) {
        if !self.is_enabled() {
            return;
        }
        self.enqueue_sound(template.duplicate(false, volume));
    }

    /// Loops a template clip, sharing its buffer.
    pub fn play_music_from_template(&self, template: &Clip, volume: i32) {
        if !self.is_enabled() {
            return;
        }
        self.enqueue_music(template.duplicate(true, volume));
    }

    fn enqueue_sound(&self, clip: Clip) {
        let mut queue = self.shared.queue.lock();
        if let Some(max_sounds) = self.config.max_sounds() {
            if queue.sound_count() >= max_sounds {
                debug!(name = clip.name(), max_sounds, "Too many sounds, dropping");
                return;
            }
        }
        queue.push_back(clip);
    }

    fn enqueue_music(&self, clip: Clip) {
        let mut queue = self.shared.queue.lock();

        // Every playing track starts fading. One that is still waiting behind a
        // track that was already fading is cut outright.
        let mut fading_music_seen = false;
        queue.walk_mut(|existing| {
            if existing.is_playing_music() {
                if fading_music_seen {
                    debug!(name = existing.name(), "Cutting waiting music");
                    existing.silence();
                }
                existing.start_fade();
            } else if existing.is_fading_music() {
                fading_music_seen = true;
            }
            true
        });

        debug!(name = clip.name(), "Queueing music");
        queue.push_back(clip);
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
                warn!(err = %e, paused, "Unable to change clip stream state");
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// True while a stream is open.
    pub fn is_enabled(&self) -> bool {
        self.stream.lock().is_some()
    }

    /// Number of clips currently queued.
    pub fn clip_count(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// The negotiated stream format.
    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// Stops the stream and frees every queued clip. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let Some(stream) = self.stream.lock().take() else {
            return;
        };
        if let Err(e) = stream.set_paused(true) {
            debug!(err = %e, "Clip stream already closed");
        }
        let freed = self.shared.queue.lock().clear();
        drop(stream);
        info!(freed, "Clip mixer stopped");
    }
}

impl Drop for ClipMixer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
