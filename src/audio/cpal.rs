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
use std::{fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, span, warn, Level};

use super::{DeviceError, OutputFormat, PauseHandle, Renderer};

/// Commands sent from a stream handle to its output thread.
enum Command {
    Play,
    Pause,
    Close,
}

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, DeviceError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, DeviceError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = %e, host = host_id.name(), "Host unavailable");
                    continue;
                }
            };
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = %e,
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. "default" selects the default host's
    /// default output device.
    pub fn get(name: &str) -> Result<Device, DeviceError> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host.default_output_device().ok_or(DeviceError::NoDefault)?;
            let max_channels = device
                .supported_output_configs()?
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            return Ok(Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
            });
        }

        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }

    /// Picks the supported config closest to the desired format: matching
    /// channels and sample rate if possible (16-bit preferred), otherwise the
    /// device default.
    fn negotiate(
        &self,
        desired: &OutputFormat,
    ) -> Result<(cpal::SupportedStreamConfig, OutputFormat), DeviceError> {
        let candidates: Vec<cpal::SupportedStreamConfigRange> = self
            .device
            .supported_output_configs()?
            .filter(|range| {
                range.channels() == desired.channels
                    && range.min_sample_rate().0 <= desired.sample_rate
                    && desired.sample_rate <= range.max_sample_rate().0
            })
            .collect();

        let chosen = candidates
            .iter()
            .find(|range| range.sample_format() == cpal::SampleFormat::I16)
            .or_else(|| candidates.first())
            .cloned()
            .map(|range| range.with_sample_rate(cpal::SampleRate(desired.sample_rate)));

        let supported = match chosen {
            Some(supported) => supported,
            None => {
                let fallback = self.device.default_output_config()?;
                warn!(
                    device = self.name,
                    desired = %desired,
                    channels = fallback.channels(),
                    sample_rate = fallback.sample_rate().0,
                    "Desired format unsupported, using device default"
                );
                fallback
            }
        };

        let negotiated = OutputFormat {
            sample_rate: supported.sample_rate().0,
            channels: supported.channels(),
            buffer_frames: desired.buffer_frames,
        };
        Ok((supported, negotiated))
    }
}

/// Builds a stream whose callback renders into an i16 scratch buffer and
/// converts into the device's native sample type.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    renderer: Arc<dyn Renderer>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    let channels = config.channels;
    let mut scratch: Vec<i16> = match config.buffer_size {
        cpal::BufferSize::Fixed(frames) => vec![0; frames as usize * channels as usize],
        cpal::BufferSize::Default => Vec::new(),
    };

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0);
            }
            let scratch = &mut scratch[..data.len()];
            renderer.render(scratch, channels);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = <T as cpal::Sample>::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

fn build_stream_for_format(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    renderer: Arc<dyn Renderer>,
) -> Result<cpal::Stream, DeviceError> {
    let stream = match sample_format {
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, renderer)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, renderer)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, renderer)?,
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, renderer)?,
        other => return Err(DeviceError::UnsupportedSampleFormat(format!("{:?}", other))),
    };
    Ok(stream)
}

/// Runs on the output thread: owns the cpal stream (which is not Send) until
/// the handle sends Close or every command sender is gone.
fn run_output_thread(
    device: cpal::Device,
    supported: cpal::SupportedStreamConfig,
    buffer_frames: u32,
    renderer: Arc<dyn Renderer>,
    ready_tx: Sender<Result<(), DeviceError>>,
    command_rx: Receiver<Command>,
) {
    let sample_format = supported.sample_format();
    let mut config = supported.config();
    config.buffer_size = cpal::BufferSize::Fixed(buffer_frames);

    let stream = match build_stream_for_format(&device, &config, sample_format, renderer.clone())
    {
        Ok(stream) => stream,
        Err(e) => {
            warn!(err = %e, buffer_frames, "Fixed buffer size rejected, using default");
            config.buffer_size = cpal::BufferSize::Default;
            match build_stream_for_format(&device, &config, sample_format, renderer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            }
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.into()));
        return;
    }
    let _ = ready_tx.send(Ok(()));
    info!("CPAL output stream started successfully");

    while let Ok(command) = command_rx.recv() {
        let result = match command {
            Command::Play => stream.play().map_err(DeviceError::from),
            Command::Pause => stream.pause().map_err(DeviceError::from),
            Command::Close => break,
        };
        if let Err(e) = result {
            error!(err = %e, "Unable to change stream state");
        }
    }

    debug!("CPAL output stream closed");
}

impl super::Device for Device {
    fn open(
        &self,
        desired: &OutputFormat,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Box<dyn super::Stream>, DeviceError> {
        let span = span!(Level::INFO, "open stream (cpal)");
        let _enter = span.enter();

        let (supported, format) = self.negotiate(desired)?;
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (command_tx, command_rx) = crossbeam_channel::bounded(8);

        let device = self.device.clone();
        let buffer_frames = desired.buffer_frames;
        let thread = thread::Builder::new()
            .name(format!("audio-out-{}", format.channels))
            .spawn(move || {
                run_output_thread(
                    device,
                    supported,
                    buffer_frames,
                    renderer,
                    ready_tx,
                    command_rx,
                )
            })?;

        ready_rx.recv().map_err(|_| DeviceError::Disconnected)??;

        info!(device = self.name, format = %format, "Opened stream.");
        Ok(Box::new(Stream {
            format,
            commands: Some(command_tx),
            thread: Some(thread),
        }))
    }
}

/// Handle to a stream running on its output thread.
pub struct Stream {
    format: OutputFormat,
    commands: Option<Sender<Command>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl super::Stream for Stream {
    fn format(&self) -> &OutputFormat {
        &self.format
    }

    fn set_paused(&self, paused: bool) -> Result<(), DeviceError> {
        let commands = self.commands.as_ref().ok_or(DeviceError::Disconnected)?;
        let command = if paused {
            Command::Pause
        } else {
            Command::Play
        };
        commands.send(command).map_err(|_| DeviceError::Disconnected)
    }

    fn pause_handle(&self) -> Arc<dyn PauseHandle> {
        Arc::new(CommandPauser {
            commands: self.commands.clone(),
        })
    }
}

/// Pause handle for the render callback. Uses `try_send` so a full command
/// queue drops the request instead of stalling the device thread.
struct CommandPauser {
    commands: Option<Sender<Command>>,
}

impl PauseHandle for CommandPauser {
    fn request_paused(&self, paused: bool) {
        if let Some(commands) = &self.commands {
            let command = if paused {
                Command::Pause
            } else {
                Command::Play
            };
            let _ = commands.try_send(command);
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Pause handles may still hold senders, so the thread is told to stop
        // rather than waiting for the channel to close.
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Close);
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
