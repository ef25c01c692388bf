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

//! A synthetic instrument for trying out an output device without a SoundFont.

use std::f64::consts::TAU;
use std::sync::Arc;

use crate::zone::{
    ChannelRole, Generators, InstrumentSource, KeyRange, SampleHeader, Zone, ZoneSample,
    GENERATOR_SAMPLE_MODES,
};

/// Root keys of the demo zones. The lowest zone also covers every key below it.
const ROOT_KEYS: [u8; 6] = [24, 36, 48, 60, 72, 84];

/// The zone rooted here is stereo, the others are mono.
const STEREO_ROOT: u8 = 60;

const AMPLITUDE: f64 = 0.4 * 0x7FFF as f64;
const FADE_IN_FRAMES: usize = 64;

/// Builds an instrument of looped sine waves, one zone group per octave.
///
/// Sample offsets are absolute positions in one shared data chunk, the way a
/// SoundFont lays them out.
pub fn sine_instrument(sample_rate: u32) -> InstrumentSource {
    let frames = (sample_rate / 2).max(1) as usize;
    let mut zones = Vec::new();
    let mut offset = 0u32;

    for (i, &root) in ROOT_KEYS.iter().enumerate() {
        let lo = if i == 0 { 0 } else { root };
        let hi = ROOT_KEYS.get(i + 1).map(|next| next - 1).unwrap_or(127);
        let frequency = 440.0 * 2f64.powf((f64::from(root) - 69.0) / 12.0);

        if root == STEREO_ROOT {
            zones.push(sine_zone(
                &format!("sine-{}-L", root),
                KeyRange { lo, hi },
                ChannelRole::LEFT,
                sine(frequency, sample_rate, frames, 1.0),
                offset,
                sample_rate,
                frequency,
                root,
            ));
            zones.push(sine_zone(
                &format!("sine-{}-R", root),
                KeyRange { lo, hi },
                ChannelRole::RIGHT,
                sine(frequency, sample_rate, frames, 0.5),
                offset + frames as u32,
                sample_rate,
                frequency,
                root,
            ));
            offset += 2 * frames as u32;
        } else {
            zones.push(sine_zone(
                &format!("sine-{}", root),
                KeyRange { lo, hi },
                ChannelRole::MONO,
                sine(frequency, sample_rate, frames, 1.0),
                offset,
                sample_rate,
                frequency,
                root,
            ));
            offset += frames as u32;
        }
    }

    InstrumentSource {
        name: "Sine".to_string(),
        zones,
    }
}

/// The notes of a rising and falling major arpeggio over two octaves from `root`.
pub fn arpeggio(root: u8) -> Vec<u8> {
    let up: Vec<u8> = [0u8, 4, 7, 12, 16, 19, 24]
        .iter()
        .map(|interval| root.saturating_add(*interval).min(127))
        .collect();
    let down = up.iter().rev().skip(1).copied();
    up.iter().copied().chain(down).collect()
}

fn sine(frequency: f64, sample_rate: u32, frames: usize, level: f64) -> Vec<i16> {
    (0..frames)
        .map(|frame| {
            let fade = (frame as f64 / FADE_IN_FRAMES as f64).min(1.0);
            let phase = TAU * frequency * frame as f64 / f64::from(sample_rate);
            (phase.sin() * AMPLITUDE * level * fade).round() as i16
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn sine_zone(
    name: &str,
    key_range: KeyRange,
    channel_role: ChannelRole,
    data: Vec<i16>,
    start: u32,
    sample_rate: u32,
    frequency: f64,
    root: u8,
) -> Zone {
    let frames = data.len() as u32;
    // Loop a whole number of periods from the second quarter on.
    let period = f64::from(sample_rate) / frequency;
    let loop_start = frames / 4;
    let cycles = ((f64::from(frames - loop_start)) / period).floor().max(1.0);
    let loop_end = (loop_start + (cycles * period).round() as u32).min(frames);

    let mut generators = Generators::new();
    generators.set(GENERATOR_SAMPLE_MODES, 1);

    Zone {
        key_range: Some(key_range),
        sample: ZoneSample {
            header: SampleHeader {
                name: name.to_string(),
                sample_rate,
                start,
                end: start + frames,
                start_loop: start + loop_start,
                end_loop: start + loop_end,
                original_pitch: root,
                pitch_correction: 0,
                channel_role,
            },
            data: Arc::from(data),
        },
        generators,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_samples;
    use crate::config::KeyRangePolicy;

    #[test]
    fn test_sine_instrument_builds() {
        let source = sine_instrument(44100);
        assert_eq!(source.zones.len(), ROOT_KEYS.len() + 1);

        let samples = build_samples(&source, KeyRangePolicy::Strict).unwrap();
        assert_eq!(samples.len(), ROOT_KEYS.len());

        for sample in samples.iter() {
            assert!(sample.loop_enabled.get());
            assert!(sample.loop_start.get() < sample.loop_end.get());
            assert!(sample.loop_end.get() <= sample.num_frames.get());
            assert_eq!(sample.num_frames.get(), 22050);
        }

        let stereo = samples
            .iter()
            .find(|sample| sample.root_key.get() == STEREO_ROOT)
            .unwrap();
        assert_eq!(stereo.channel_count(), 2);
        assert_eq!(stereo.name.get(), "sine-60-L");
        assert_eq!(samples[0].lowest_key.get(), 0);
    }

    #[test]
    fn test_sine_loop_points_are_relative() {
        let source = sine_instrument(8000);
        let last = source.zones.last().unwrap();
        assert!(last.sample.header.start > 0);

        let samples = build_samples(&source, KeyRangePolicy::Strict).unwrap();
        let sample = samples.last().unwrap();
        assert_eq!(sample.loop_start.get(), 1000);
    }

    #[test]
    fn test_sine_stays_in_range() {
        let data = sine(440.0, 44100, 1000, 1.0);
        assert_eq!(data[0], 0);
        assert!(data.iter().all(|v| v.unsigned_abs() <= (0.4 * 32767.0) as u16 + 1));
    }

    #[test]
    fn test_arpeggio() {
        assert_eq!(
            arpeggio(60),
            vec![60, 64, 67, 72, 76, 79, 84, 79, 76, 72, 67, 64, 60]
        );
        assert_eq!(*arpeggio(120).iter().max().unwrap(), 127);
    }
}
