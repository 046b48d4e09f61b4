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

//! Procedural note synthesis.
//!
//! This module provides:
//! - Five waveform instruments, one of them wavetable based
//! - A tick-driven synthesizer that sums the oldest active notes into a mono stream

mod instrument;
mod synth;
mod wavetable;

pub use instrument::{Instrument, LEVEL, REFERENCE_FREQUENCY};
pub use synth::{Note, NoteSynth, Trigger, MIN_FREQUENCY};
pub use wavetable::Wavetable;
