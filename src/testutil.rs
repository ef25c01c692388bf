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

//! Zone fixtures shared by the unit tests.

use std::sync::Arc;

use crate::zone::{
    ChannelRole, Generators, InstrumentSource, KeyRange, SampleHeader, Zone, ZoneSample,
    GENERATOR_SAMPLE_MODES,
};

/// Builds zones with sensible defaults. Offsets are absolute, the PCM data
/// always has `end - start` frames.
pub struct ZoneBuilder {
    key_range: Option<KeyRange>,
    header: SampleHeader,
    pcm_value: i16,
    loop_enabled: bool,
}

impl ZoneBuilder {
    /// A mono zone selected from `lo` upwards with 1000 frames at 44.1kHz.
    pub fn mono(lo: u8) -> ZoneBuilder {
        ZoneBuilder {
            key_range: Some(KeyRange { lo, hi: 127 }),
            header: SampleHeader {
                name: format!("mono-{}", lo),
                sample_rate: 44100,
                start: 0,
                end: 1000,
                start_loop: 0,
                end_loop: 0,
                original_pitch: 60,
                pitch_correction: 0,
                channel_role: ChannelRole::MONO,
            },
            pcm_value: 0x4000,
            loop_enabled: false,
        }
    }

    pub fn role(mut self, role: ChannelRole) -> Self {
        self.header.channel_role = role;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.header.name = name.to_string();
        self
    }

    pub fn no_key_range(mut self) -> Self {
        self.key_range = None;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.header.sample_rate = sample_rate;
        self
    }

    pub fn offsets(mut self, start: u32, end: u32) -> Self {
        self.header.start = start;
        self.header.end = end;
        self
    }

    pub fn loop_points(mut self, start_loop: u32, end_loop: u32) -> Self {
        self.header.start_loop = start_loop;
        self.header.end_loop = end_loop;
        self
    }

    pub fn looped(mut self) -> Self {
        self.loop_enabled = true;
        self
    }

    pub fn original_pitch(mut self, pitch: u8) -> Self {
        self.header.original_pitch = pitch;
        self
    }

    pub fn pitch_correction(mut self, cents: i8) -> Self {
        self.header.pitch_correction = cents;
        self
    }

    /// Every PCM frame of the zone gets this value.
    pub fn pcm_value(mut self, value: i16) -> Self {
        self.pcm_value = value;
        self
    }

    pub fn build(self) -> Zone {
        let frames = self.header.end.saturating_sub(self.header.start) as usize;
        let mut generators = Generators::new();
        if self.loop_enabled {
            generators.set(GENERATOR_SAMPLE_MODES, 1);
        }

        Zone {
            key_range: self.key_range,
            sample: ZoneSample {
                header: self.header,
                data: Arc::from(vec![self.pcm_value; frames]),
            },
            generators,
        }
    }
}

/// A left/right zone pair sharing the `lo` boundary, in that order.
pub fn stereo_pair(lo: u8) -> (Zone, Zone) {
    let left = ZoneBuilder::mono(lo)
        .role(ChannelRole::LEFT)
        .name(&format!("left-{}", lo))
        .pcm_value(0x7FFF)
        .build();
    let right = ZoneBuilder::mono(lo)
        .role(ChannelRole::RIGHT)
        .name(&format!("right-{}", lo))
        .pcm_value(-0x7FFF)
        .build();
    (left, right)
}

/// Wraps zones into an instrument source.
pub fn instrument_source(zones: Vec<Zone>) -> InstrumentSource {
    InstrumentSource {
        name: "test instrument".to_string(),
        zones,
    }
}

/// Calculate RMS (Root Mean Square) of a signal
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
