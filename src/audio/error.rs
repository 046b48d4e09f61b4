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
/// Error types for opening and driving output devices
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no device found with name {0}")]
    NotFound(String),

    #[error("no default output device available")]
    NoDefault,

    #[error("device {0} is unavailable")]
    Unavailable(String),

    #[error("unsupported device sample format {0}")]
    UnsupportedSampleFormat(String),

    #[error("output stream thread is gone")]
    Disconnected,

    #[error("unable to list devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("unable to read device name: {0}")]
    Name(#[from] cpal::DeviceNameError),

    #[error("unable to query supported configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("unable to query default config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unable to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("unable to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("unable to pause output stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
