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
use std::path::Path;

use serde::Deserialize;

pub mod clips;
pub mod error;
pub mod notes;

pub use clips::Clips;
pub use error::ConfigError;
pub use notes::Notes;

const DEFAULT_DEVICE: &str = "default";

/// The top level engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Config {
    /// The output device. "default" selects the host default.
    device: Option<String>,

    /// Clip mixer settings.
    #[serde(default)]
    clips: Clips,

    /// Note synthesizer settings.
    #[serde(default)]
    notes: Notes,
}

impl Config {
    /// Loads the configuration from a file. The format follows the extension.
    pub fn deserialize(path: &Path) -> Result<Config, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses the configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Config, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.clips
            .output_format()
            .map_err(|e| ConfigError::Invalid {
                section: "clips",
                reason: e.to_string(),
            })?;
        self.notes
            .output_format()
            .map_err(|e| ConfigError::Invalid {
                section: "notes",
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    pub fn clips(&self) -> &Clips {
        &self.clips
    }

    pub fn notes(&self) -> &Notes {
        &self.notes
    }
}
