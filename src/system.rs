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
use std::collections::HashMap;

use tracing::{info, warn};

use crate::audio;
use crate::clips::{Clip, ClipMixer, MAX_VOLUME};
use crate::config::Config;
use crate::notes::{Instrument, NoteSynth, Trigger};

/// Owns both engines and the preloaded template clips. Built once when audio
/// becomes available and torn down with `shutdown` or on drop.
pub struct AudioSystem {
    clips: ClipMixer,
    notes: NoteSynth,
    templates: HashMap<String, Clip>,
}

impl AudioSystem {
    /// Opens the configured device. If it can't be found, both engines are
    /// inert.
    pub fn init(config: &Config) -> AudioSystem {
        match audio::get_device(config.device()) {
            Ok(device) => AudioSystem::with_device(device.as_ref(), config),
            Err(e) => {
                warn!(err = %e, device = config.device(), "Audio device unavailable");
                AudioSystem::inert(config)
            }
        }
    }

    /// Opens both engines on `device` and preloads the templates.
    pub fn with_device(device: &dyn audio::Device, config: &Config) -> AudioSystem {
        let clips = ClipMixer::open(device, config.clips());
        let notes = NoteSynth::open(device, config.notes());
        let templates = preload_templates(&clips, config);
        AudioSystem {
            clips,
            notes,
            templates,
        }
    }

    /// Builds the system without any device.
    pub fn inert(config: &Config) -> AudioSystem {
        AudioSystem {
            clips: ClipMixer::inert(config.clips()),
            notes: NoteSynth::inert(config.notes()),
            templates: HashMap::new(),
        }
    }

    pub fn clips(&self) -> &ClipMixer {
        &self.clips
    }

    pub fn notes(&self) -> &NoteSynth {
        &self.notes
    }

    /// Gets a preloaded template by name.
    pub fn template(&self, name: &str) -> Option<&Clip> {
        self.templates.get(name)
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn play_sound(&self, name: &str, volume: i32) {
        self.clips.play_sound(name, volume);
    }

    pub fn play_music(&self, name: &str, volume: i32) {
        self.clips.play_music(name, volume);
    }

    /// Plays a preloaded template once.
    pub fn play_template(&self, name: &str, volume: i32) {
        match self.templates.get(name) {
            Some(template) => self.clips.play_sound_from_template(template, volume),
            None => warn!(name, "Unknown template"),
        }
    }

    /// Loops a preloaded template as music.
    pub fn play_template_music(&self, name: &str, volume: i32) {
        match self.templates.get(name) {
            Some(template) => self.clips.play_music_from_template(template, volume),
            None => warn!(name, "Unknown template"),
        }
    }

    pub fn trigger_note(
        &self,
        frequency: f32,
        duration_ticks: u64,
        instrument: Instrument,
    ) -> Option<Trigger> {
        self.notes.trigger_note(frequency, duration_ticks, instrument)
    }

    pub fn pause_all(&self) {
        self.clips.pause_all();
        self.notes.pause_all();
    }

    pub fn resume_all(&self) {
        self.clips.resume_all();
        self.notes.resume_all();
    }

    /// Stops both engines. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.clips.shutdown();
        self.notes.shutdown();
    }
}

fn preload_templates(clips: &ClipMixer, config: &Config) -> HashMap<String, Clip> {
    let mut templates = HashMap::new();
    if !clips.is_enabled() {
        return templates;
    }
    let Some(configured) = config.clips().templates() else {
        return templates;
    };

    for (name, asset) in configured {
        match clips.load_clip(asset, false, MAX_VOLUME as i32) {
            Ok(clip) => {
                templates.insert(name.clone(), clip);
            }
            Err(e) => warn!(err = %e, name, "Unable to preload template"),
        }
    }

    info!(templates = templates.len(), "Preloaded templates");
    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::testutil::write_constant_wav;

    fn config(assets: &std::path::Path) -> Config {
        Config::parse(&format!(
            r#"
            device: mock
            clips:
              buffer_frames: 64
              assets: {}
              templates:
                kick: kick.wav
                missing: nope.wav
            notes:
              buffer_frames: 32
            "#,
            assets.display()
        ))
        .unwrap()
    }

    #[test]
    fn test_templates_preloaded() {
        let dir = tempfile::tempdir().unwrap();
        write_constant_wav(dir.path().join("kick.wav"), 1000, 100, 48000).unwrap();
        let device = mock::Device::get("mock");
        let system = AudioSystem::with_device(&device, &config(dir.path()));

        assert_eq!(device.stream_count(), 2);
        assert_eq!(system.template_count(), 1);
        let kick = system.template("kick").unwrap();
        assert!(kick.owns_buffer());
        assert_eq!(kick.total_length(), 200);

        system.play_template("kick", 64);
        system.play_template("missing", 64);
        assert_eq!(system.clips().clip_count(), 1);

        let out = device.pump_stream(0).unwrap();
        assert!(out.iter().all(|&s| s == 500));
    }

    #[test]
    fn test_both_engines_run() {
        let dir = tempfile::tempdir().unwrap();
        write_constant_wav(dir.path().join("kick.wav"), 1000, 100, 48000).unwrap();
        let device = mock::Device::get("mock");
        let system = AudioSystem::with_device(&device, &config(dir.path()));

        system.play_template_music("kick", 128);
        assert_eq!(
            system.trigger_note(440.0, 10, Instrument::Square),
            Some(Trigger::Started)
        );

        assert!(device.pump_stream(0).unwrap().iter().all(|&s| s == 1000));
        let notes = device.pump_stream(1).unwrap();
        assert_eq!(notes.len(), 32);
        assert_eq!(system.notes().tick(), 1);
    }

    #[test]
    fn test_pause_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let device = mock::Device::get("mock");
        let system = AudioSystem::with_device(&device, &config(dir.path()));

        system.pause_all();
        system.pause_all();
        assert!(system.clips().is_paused());
        assert!(system.notes().is_paused());
        assert!(device.pump_stream(0).is_none());

        system.resume_all();
        assert!(device.pump_stream(0).is_some());

        system.shutdown();
        system.shutdown();
        assert!(!device.is_open());
    }

    #[test]
    fn test_unavailable_device() {
        let dir = tempfile::tempdir().unwrap();
        write_constant_wav(dir.path().join("kick.wav"), 1000, 100, 48000).unwrap();
        let device = mock::Device::get("mock-unavailable");
        let system = AudioSystem::with_device(&device, &config(dir.path()));

        assert!(!system.clips().is_enabled());
        assert!(!system.notes().is_enabled());
        assert_eq!(system.template_count(), 0);
        system.play_template("kick", 128);
        assert_eq!(system.trigger_note(440.0, 10, Instrument::Sine), None);
    }

    #[test]
    fn test_init_with_mock_device_name() {
        let dir = tempfile::tempdir().unwrap();
        let system = AudioSystem::init(&config(dir.path()));
        assert!(system.clips().is_enabled());
        assert!(system.notes().is_enabled());
    }
}
