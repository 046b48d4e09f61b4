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
use std::{error::Error, f64::consts::PI, fmt, str::FromStr};

use super::Wavetable;

/// Peak value of a single voice in the unsigned 8-bit domain.
pub const LEVEL: f64 = 127.4;

/// The pitch at which a wavetable plays back one table length per cycle.
pub const REFERENCE_FREQUENCY: f64 = 440.0;

/// The waveform a note is synthesized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Square = 0,
    Triangle = 1,
    Saw = 2,
    Sine = 3,
    Wavetable = 4,
}

impl Instrument {
    pub const ALL: [Instrument; 5] = [
        Instrument::Square,
        Instrument::Triangle,
        Instrument::Saw,
        Instrument::Sine,
        Instrument::Wavetable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Instrument::Square => "square",
            Instrument::Triangle => "triangle",
            Instrument::Saw => "saw",
            Instrument::Sine => "sine",
            Instrument::Wavetable => "wavetable",
        }
    }

    /// Computes the voice's value at `phase` samples into the note, in
    /// `0.0..=LEVEL` (the wavetable reaches at most half the table's peak).
    pub fn sample(self, phase: u64, frequency: f32, sample_rate: u32, table: &Wavetable) -> f64 {
        let frequency = frequency as f64;
        let samples_per_cycle = sample_rate as f64 / frequency;
        let phase_f = phase as f64;

        match self {
            Instrument::Square => {
                let period = (samples_per_cycle.floor() as u64).max(1);
                if ((phase % period) as f64) < samples_per_cycle / 2.0 {
                    LEVEL
                } else {
                    0.0
                }
            }
            Instrument::Triangle => {
                let position = (phase_f / samples_per_cycle).fract();
                ((position - 0.5).abs() * 2.0).min(1.0) * LEVEL
            }
            Instrument::Saw => (phase_f / samples_per_cycle).fract() * LEVEL,
            Instrument::Sine => {
                ((2.0 * PI * phase_f / samples_per_cycle).sin() + 1.0) * LEVEL / 2.0
            }
            Instrument::Wavetable => {
                table.lookup(phase_f * frequency / REFERENCE_FREQUENCY) / 2.0
            }
        }
    }
}

impl FromStr for Instrument {
    type Err = Box<dyn Error>;

    /// Accepts a name or a numeric id.
    fn from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        match s.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(Instrument::Square),
            "triangle" => Ok(Instrument::Triangle),
            "saw" | "sawtooth" => Ok(Instrument::Saw),
            "sine" => Ok(Instrument::Sine),
            "wavetable" | "violin" => Ok(Instrument::Wavetable),
            other => match other.parse::<i32>() {
                Ok(id) => Instrument::try_from(id),
                Err(_) => Err(format!("Unknown instrument: {}", s).into()),
            },
        }
    }
}

impl TryFrom<i32> for Instrument {
    type Error = Box<dyn Error>;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Instrument::ALL
            .into_iter()
            .find(|instrument| *instrument as i32 == id)
            .ok_or_else(|| format!("Unknown instrument id: {}", id).into())
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Wavetable {
        Wavetable::violin(44100)
    }

    #[test]
    fn test_parse() {
        assert_eq!("square".parse::<Instrument>().unwrap(), Instrument::Square);
        assert_eq!("Sine".parse::<Instrument>().unwrap(), Instrument::Sine);
        assert_eq!("violin".parse::<Instrument>().unwrap(), Instrument::Wavetable);
        assert_eq!("2".parse::<Instrument>().unwrap(), Instrument::Saw);
        assert!("5".parse::<Instrument>().is_err());
        assert!("kazoo".parse::<Instrument>().is_err());
        assert_eq!(Instrument::try_from(1).unwrap(), Instrument::Triangle);
        assert_eq!(Instrument::Wavetable.to_string(), "wavetable");
    }

    #[test]
    fn test_square() {
        // 10 samples per cycle: high for the first half.
        let table = table();
        assert_eq!(Instrument::Square.sample(0, 10.0, 100, &table), LEVEL);
        assert_eq!(Instrument::Square.sample(4, 10.0, 100, &table), LEVEL);
        assert_eq!(Instrument::Square.sample(5, 10.0, 100, &table), 0.0);
        assert_eq!(Instrument::Square.sample(10, 10.0, 100, &table), LEVEL);
    }

    #[test]
    fn test_triangle() {
        let table = table();
        assert_eq!(Instrument::Triangle.sample(0, 10.0, 100, &table), LEVEL);
        assert!(Instrument::Triangle.sample(5, 10.0, 100, &table).abs() < 1e-9);
        let quarter = Instrument::Triangle.sample(25, 1.0, 100, &table);
        assert!((quarter - LEVEL / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_saw_single_ramp() {
        let table = table();
        assert_eq!(Instrument::Saw.sample(0, 10.0, 100, &table), 0.0);
        let half = Instrument::Saw.sample(5, 10.0, 100, &table);
        assert!((half - LEVEL / 2.0).abs() < 1e-9);
        assert!(Instrument::Saw.sample(9, 10.0, 100, &table) > half);
        assert_eq!(Instrument::Saw.sample(10, 10.0, 100, &table), 0.0);
    }

    #[test]
    fn test_sine() {
        let table = table();
        let zero = Instrument::Sine.sample(0, 1.0, 100, &table);
        assert!((zero - LEVEL / 2.0).abs() < 1e-9);
        let peak = Instrument::Sine.sample(25, 1.0, 100, &table);
        assert!((peak - LEVEL).abs() < 1e-9);
        let trough = Instrument::Sine.sample(75, 1.0, 100, &table);
        assert!(trough.abs() < 1e-9);
    }

    #[test]
    fn test_wavetable_halves_table() {
        let table = Wavetable::from_samples(vec![0, 100, 200]).unwrap();
        // At the reference pitch the phase indexes the table directly.
        let value = Instrument::Wavetable.sample(2, 440.0, 44100, &table);
        assert!((value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_values_stay_in_range() {
        let table = table();
        for instrument in Instrument::ALL {
            for phase in 0..2000 {
                let value = instrument.sample(phase, 261.6, 44100, &table);
                assert!((0.0..=LEVEL + 0.5).contains(&value), "{instrument}: {value}");
            }
        }
    }
}
