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

//! Playable samples.
//!
//! A sample owns one or two channels of 16-bit PCM and a set of editable
//! metadata fields. Playback reads a floating point render buffer that is built
//! on first use and rebuilt after the frame count or sample rate changes.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::{PrintMapping, Value};

/// Scale used to normalize 16-bit PCM into floating point.
const PCM_SCALE: f32 = 0x7FFF as f32;

/// Planar floating point audio derived from a sample's PCM data.
#[derive(Debug)]
pub struct RenderBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl RenderBuffer {
    /// Converts the PCM channels, padding or truncating each one to `num_frames`.
    fn from_pcm(data: &[Arc<[i16]>], num_frames: usize, sample_rate: u32) -> RenderBuffer {
        let channels = data
            .iter()
            .map(|pcm| {
                let mut channel: Vec<f32> = pcm
                    .iter()
                    .take(num_frames)
                    .map(|&value| value as f32 / PCM_SCALE)
                    .collect();
                channel.resize(num_frames, 0.0);
                channel
            })
            .collect();

        RenderBuffer {
            channels,
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the number of frames per channel.
    pub fn num_frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns the sample rate the buffer was built for.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the samples of a single channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }
}

/// A playable sample.
pub struct Sample {
    /// PCM data, one array per channel (left then right for stereo).
    data: Vec<Arc<[i16]>>,
    pub name: Value<String>,
    pub num_frames: Value<u32>,
    pub sample_rate: Value<u32>,
    /// Lowest MIDI key at which this sample is selected.
    pub lowest_key: Value<u8>,
    /// MIDI key at which the sample plays at its native pitch.
    pub root_key: Value<u8>,
    /// Pitch correction in cents.
    pub root_fine_tune: Value<i32>,
    /// Loop start in frames, relative to the start of the sample.
    pub loop_start: Value<u32>,
    /// Loop end in frames, relative to the start of the sample.
    pub loop_end: Value<u32>,
    pub loop_enabled: Value<bool>,
    /// Number of voices currently sounding this sample. Decrements happen on
    /// the audio thread, so observers of this value must not block or allocate.
    pub num_playing: Value<u32>,
    /// The cached render buffer. None means it has to be (re)built.
    render_cache: Arc<Mutex<Option<Arc<RenderBuffer>>>>,
}

impl Sample {
    /// Creates a new sample.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: Vec<Arc<[i16]>>,
        name: &str,
        num_frames: u32,
        sample_rate: u32,
        lowest_key: u8,
        root_key: u8,
        root_fine_tune: i32,
        loop_start: u32,
        loop_end: u32,
        loop_enabled: bool,
    ) -> Sample {
        debug_assert!(
            !data.is_empty() && data.len() <= 2,
            "samples have one or two channels"
        );

        let sample = Sample {
            data,
            name: Value::new(name.to_string(), PrintMapping::any()),
            num_frames: Value::new(num_frames, PrintMapping::positive_integer()),
            sample_rate: Value::new(sample_rate, PrintMapping::positive_integer()),
            lowest_key: Value::new(lowest_key, PrintMapping::midi_note()),
            root_key: Value::new(root_key, PrintMapping::midi_note()),
            root_fine_tune: Value::new(root_fine_tune, PrintMapping::linear_int(-1200, 1200)),
            loop_start: Value::new(loop_start, PrintMapping::positive_integer()),
            loop_end: Value::new(loop_end, PrintMapping::positive_integer()),
            loop_enabled: Value::new(loop_enabled, PrintMapping::boolean()),
            num_playing: Value::new(0, PrintMapping::positive_integer()),
            render_cache: Arc::new(Mutex::new(None)),
        };

        // The render buffer depends on the frame count and the sample rate.
        let cache = sample.render_cache.clone();
        sample.num_frames.add_observer(move |_| *cache.lock() = None);
        let cache = sample.render_cache.clone();
        sample.sample_rate.add_observer(move |_| *cache.lock() = None);

        sample
    }

    /// Returns the PCM data of every channel.
    pub fn data(&self) -> &[Arc<[i16]>] {
        &self.data
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.data.len()
    }

    /// Returns the size of the PCM data in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.iter().map(|pcm| std::mem::size_of_val(&**pcm)).sum()
    }

    /// Returns the render buffer, building it if needed. Concurrent callers
    /// share a single build.
    pub fn render_buffer(&self) -> Arc<RenderBuffer> {
        let mut cache = self.render_cache.lock();
        if let Some(buffer) = cache.as_ref() {
            return buffer.clone();
        }

        let buffer = Arc::new(RenderBuffer::from_pcm(
            &self.data,
            self.num_frames.get() as usize,
            self.sample_rate.get(),
        ));
        *cache = Some(buffer.clone());
        buffer
    }

    /// Returns true if a render buffer is currently cached.
    pub fn has_render_buffer(&self) -> bool {
        self.render_cache.lock().is_some()
    }

    /// Returns the playback rate multiplier needed to sound `key`.
    pub fn pitch_ratio(&self, key: u8) -> f64 {
        pitch_ratio(key, self.root_key.get(), self.root_fine_tune.get())
    }

    /// Returns the loop region in frames if looping is enabled.
    pub fn loop_region(&self) -> Option<(u32, u32)> {
        if self.loop_enabled.get() {
            Some((self.loop_start.get(), self.loop_end.get()))
        } else {
            None
        }
    }

    /// Detaches all observers and drops the render buffer.
    pub fn dispose(&self) {
        self.name.dispose();
        self.num_frames.dispose();
        self.sample_rate.dispose();
        self.lowest_key.dispose();
        self.root_key.dispose();
        self.root_fine_tune.dispose();
        self.loop_start.dispose();
        self.loop_end.dispose();
        self.loop_enabled.dispose();
        self.num_playing.dispose();
        *self.render_cache.lock() = None;
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("name", &self.name.get())
            .field("channels", &self.channel_count())
            .field("num_frames", &self.num_frames.get())
            .field("sample_rate", &self.sample_rate.get())
            .field("lowest_key", &self.lowest_key.get())
            .field("root_key", &self.root_key.get())
            .field("root_fine_tune", &self.root_fine_tune.get())
            .field("loop", &self.loop_region())
            .finish()
    }
}

/// `2^((key - root_key) / 12 + fine_tune / 1200)`
pub fn pitch_ratio(key: u8, root_key: u8, fine_tune_cents: i32) -> f64 {
    let semitones = f64::from(key) - f64::from(root_key);
    2.0f64.powf(semitones / 12.0 + f64::from(fine_tune_cents) / 1200.0)
}
