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
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{error, info};

use super::{find_device, AudioError};
use crate::mixer::AudioMixer;

/// A cpal output stream rendering an [`AudioMixer`].
///
/// cpal streams can't move between threads, so the stream lives on its own
/// thread until the device is dropped.
pub struct OutputDevice {
    name: String,
    shutdown_tx: Option<Sender<()>>,
    output_thread: Option<JoinHandle<()>>,
}

impl OutputDevice {
    /// Opens the named device and starts rendering `mixer` into it.
    pub fn open(name: &str, mixer: Arc<AudioMixer>) -> Result<OutputDevice, AudioError> {
        let device = find_device(name)?;
        let (started_tx, started_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let output_thread = thread::spawn(move || {
            let stream = match start_stream(&device, mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = started_tx.send(Err(e));
                    return;
                }
            };
            let _ = started_tx.send(Ok(()));

            // Blocks until the device drops its sender.
            let _ = shutdown_rx.recv();
            drop(stream);
        });

        match started_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(_) => return Err(AudioError::OutputThreadExited),
        }

        info!(device = name, "Output stream started");
        Ok(OutputDevice {
            name: name.to_string(),
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        // Dropping the sender wakes the output thread.
        self.shutdown_tx.take();
        if let Some(output_thread) = self.output_thread.take() {
            if output_thread.join().is_err() {
                error!(device = self.name, "Output thread panicked");
            }
        }
    }
}

/// Builds and starts a stream in the device's default sample format.
fn start_stream(device: &cpal::Device, mixer: Arc<AudioMixer>) -> Result<cpal::Stream, AudioError> {
    let config = cpal::StreamConfig {
        channels: mixer.num_channels(),
        sample_rate: cpal::SampleRate(mixer.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    };

    let sample_format = device.default_output_config()?.sample_format();
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, mixer)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, mixer)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(device, &config, mixer)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, &config, mixer)?,
        other => return Err(AudioError::UnsupportedSampleFormat(format!("{:?}", other))),
    };
    stream.play()?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<AudioMixer>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let num_channels = usize::from(config.channels);
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.process_into_output(&mut scratch, data.len() / num_channels);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!(err = err.to_string(), "Output stream error"),
        None,
    )
}
