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
use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::error;

mod output;

pub use output::OutputDevice;

/// Errors raised while talking to the audio backend.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no device found with name {0}")]
    DeviceNotFound(String),

    #[error("unsupported sample format {0}")]
    UnsupportedSampleFormat(String),

    #[error("output thread exited before the stream started")]
    OutputThreadExited,

    #[error(transparent)]
    Host(#[from] cpal::HostUnavailable),

    #[error(transparent)]
    Devices(#[from] cpal::DevicesError),

    #[error(transparent)]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error(transparent)]
    DefaultStreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An output device known to cpal.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub max_channels: u16,
    pub host: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Lists output devices known to cpal, sorted by name.
pub fn list_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    Ok(output_devices()?
        .into_iter()
        .map(|(info, _)| info)
        .collect())
}

/// Returns every output device along with its description.
fn output_devices() -> Result<Vec<(DeviceInfo, cpal::Device)>, AudioError> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let output_configs = match device.supported_output_configs() {
                Ok(output_configs) => output_configs,
                Err(_) => continue,
            };
            let max_channels = output_configs
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);

            if max_channels > 0 {
                let info = DeviceInfo {
                    name: device.name()?,
                    max_channels,
                    host: host_id.name().to_string(),
                };
                devices.push((info, device));
            }
        }
    }

    devices.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));
    Ok(devices)
}

/// Finds the output device with the given name. "default" selects the default
/// output device of the default host.
fn find_device(name: &str) -> Result<cpal::Device, AudioError> {
    if name == "default" {
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()));
    }

    output_devices()?
        .into_iter()
        .find(|(info, _)| info.name.trim() == name)
        .map(|(_, device)| device)
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}
