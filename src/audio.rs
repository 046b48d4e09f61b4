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
use std::{fmt, sync::Arc};

pub mod cpal;
pub mod error;
pub mod format;
pub mod mock;
pub mod wav;

pub use error::DeviceError;
pub use format::OutputFormat;

/// Something an output stream pulls samples from. Called on the device thread
/// whenever the device needs more audio; must fill `out` before returning and
/// must never wait longer than a small fraction of a buffer.
pub trait Renderer: Send + Sync + 'static {
    /// Fills `out` with interleaved samples for `channels` channels.
    fn render(&self, out: &mut [i16], channels: u16);
}

/// An open output stream. Dropping it closes the stream.
pub trait Stream: Send + Sync {
    /// The format the device actually negotiated.
    fn format(&self) -> &OutputFormat;

    /// Pauses or resumes callback delivery.
    fn set_paused(&self, paused: bool) -> Result<(), DeviceError>;

    /// A handle that can pause or resume this stream from inside its own
    /// render callback.
    fn pause_handle(&self) -> Arc<dyn PauseHandle>;
}

/// Requests a pause state change without blocking. A request made after the
/// stream closed is dropped.
pub trait PauseHandle: Send + Sync {
    fn request_paused(&self, paused: bool);
}

pub trait Device: fmt::Display + Send + Sync {
    /// Opens an output stream as close to `desired` as the device allows. The
    /// renderer starts receiving callbacks as soon as this returns.
    fn open(
        &self,
        desired: &OutputFormat,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Box<dyn Stream>, DeviceError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, DeviceError> {
    cpal::Device::list()
}

/// Gets a device with the given name. "default" selects the host's default output.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, DeviceError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(cpal::Device::get(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mock_device() {
        let device = get_device("mock-device").unwrap();
        assert_eq!(device.to_string(), "mock-device (Mock)");
    }

    #[test]
    fn test_get_unavailable_mock_device() {
        let device = get_device("mock-unavailable").unwrap();
        let renderer: Arc<dyn Renderer> = Arc::new(mock::Silence);
        assert!(matches!(
            device.open(&OutputFormat::default(), renderer),
            Err(DeviceError::Unavailable(_))
        ));
    }
}
