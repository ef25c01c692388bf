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

//! Conversion of parser zones into playable samples.
//!
//! Zones are grouped by the lower bound of their key range. Each group becomes
//! one sample: a single mono (or lone left/right) zone, or a left/right pair
//! merged into a stereo sample.

mod error;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

pub use error::BuildError;

use crate::config::KeyRangePolicy;
use crate::sample::Sample;
use crate::zone::{ChannelRole, InstrumentSource, SampleHeader, Zone, ZoneSample};

/// Collects the zones that share a lowest key.
struct SampleBuilder<'a> {
    lowest_key: u8,
    /// The first zone of the group. Its generators apply to the whole sample.
    zone: &'a Zone,
    members: Vec<&'a ZoneSample>,
}

impl<'a> SampleBuilder<'a> {
    fn new(lowest_key: u8, zone: &'a Zone) -> Self {
        Self {
            lowest_key,
            zone,
            members: Vec::new(),
        }
    }

    fn push(&mut self, sample: &'a ZoneSample) {
        self.members.push(sample);
    }

    /// The channel roles of all members OR'ed together.
    fn role_mask(&self) -> ChannelRole {
        self.members
            .iter()
            .fold(ChannelRole::from_bits(0), |mask, sample| {
                mask | sample.header.channel_role
            })
    }

    fn build(&self) -> Result<Sample, BuildError> {
        let mask = self.role_mask();
        match mask {
            ChannelRole::MONO | ChannelRole::LEFT | ChannelRole::RIGHT => {
                if self.members.len() > 1 {
                    warn!(
                        lowest_key = self.lowest_key,
                        members = self.members.len(),
                        "Mono sample has more than one channel, using the first"
                    );
                }
                let sample = self.members[0];
                let num_frames = frame_count(&sample.header);
                Ok(self.make(vec![sample], &sample.header, num_frames))
            }
            ChannelRole::STEREO => {
                let left = self.first_with_role(ChannelRole::LEFT);
                let right = self.first_with_role(ChannelRole::RIGHT);
                let (left, right) = match (left, right) {
                    (Some(left), Some(right)) => (left, right),
                    _ => {
                        return Err(BuildError::UnknownAudioConfiguration {
                            lowest_key: self.lowest_key,
                            mask: mask.bits(),
                        })
                    }
                };
                if self.members.len() > 2 {
                    warn!(
                        lowest_key = self.lowest_key,
                        members = self.members.len(),
                        "Stereo sample has more than two channels, using the first left and right"
                    );
                }
                if left.header.sample_rate != right.header.sample_rate {
                    return Err(BuildError::SampleRateMismatch {
                        lowest_key: self.lowest_key,
                        left: left.header.sample_rate,
                        right: right.header.sample_rate,
                    });
                }

                let num_frames = frame_count(&left.header).max(frame_count(&right.header));
                Ok(self.make(vec![left, right], &left.header, num_frames))
            }
            _ => Err(BuildError::UnknownAudioConfiguration {
                lowest_key: self.lowest_key,
                mask: mask.bits(),
            }),
        }
    }

    fn first_with_role(&self, role: ChannelRole) -> Option<&'a ZoneSample> {
        self.members
            .iter()
            .copied()
            .find(|sample| sample.header.channel_role == role)
    }

    /// Creates the sample. Metadata comes from `header`, the first channel's header.
    fn make(&self, channels: Vec<&ZoneSample>, header: &SampleHeader, num_frames: u32) -> Sample {
        let loop_enabled = self.zone.generators.loop_enabled();
        let (loop_start, loop_end) = loop_points(header, num_frames);
        if loop_enabled
            && (i64::from(loop_start) != i64::from(header.start_loop) - i64::from(header.start)
                || i64::from(loop_end) != i64::from(header.end_loop) - i64::from(header.start))
        {
            warn!(
                sample = header.name,
                start_loop = header.start_loop,
                end_loop = header.end_loop,
                loop_start,
                loop_end,
                "Loop points out of range, clamped"
            );
        }

        Sample::new(
            channels.iter().map(|sample| sample.data.clone()).collect(),
            &header.name,
            num_frames,
            header.sample_rate,
            self.lowest_key,
            header.original_pitch,
            i32::from(header.pitch_correction),
            loop_start,
            loop_end,
            loop_enabled,
        )
    }
}

fn frame_count(header: &SampleHeader) -> u32 {
    header.end.saturating_sub(header.start)
}

/// Converts the absolute loop offsets into frames relative to the sample start,
/// keeping `0 <= loop_start <= loop_end <= num_frames`.
fn loop_points(header: &SampleHeader, num_frames: u32) -> (u32, u32) {
    let start = i64::from(header.start);
    let num_frames = i64::from(num_frames);
    let loop_start = (i64::from(header.start_loop) - start).clamp(0, num_frames);
    let loop_end = (i64::from(header.end_loop) - start).clamp(loop_start, num_frames);
    (loop_start as u32, loop_end as u32)
}

/// Builds the samples of an instrument, sorted ascending by lowest key.
///
/// Zones with a sample rate of zero are skipped. Any invalid channel
/// configuration fails the whole build so that imports are all or nothing.
pub fn build_samples(
    source: &InstrumentSource,
    policy: KeyRangePolicy,
) -> Result<Vec<Sample>, BuildError> {
    let mut builders: BTreeMap<u8, SampleBuilder> = BTreeMap::new();

    for (index, zone) in source.zones.iter().enumerate() {
        let lowest_key = match (zone.key_range, policy) {
            (Some(key_range), _) => key_range.lo,
            (None, KeyRangePolicy::Strict) => {
                return Err(BuildError::MissingKeyRange {
                    instrument: source.name.clone(),
                    zone: index,
                })
            }
            (None, KeyRangePolicy::DefaultToZero) => {
                warn!(
                    instrument = source.name,
                    zone = index,
                    "Zone has no key range, assuming key 0"
                );
                0
            }
        };

        if zone.sample.header.sample_rate == 0 {
            debug!(
                instrument = source.name,
                zone = index,
                sample = zone.sample.header.name,
                "Skipping zone without sample rate"
            );
            continue;
        }

        builders
            .entry(lowest_key)
            .or_insert_with(|| SampleBuilder::new(lowest_key, zone))
            .push(&zone.sample);
    }

    // BTreeMap iteration yields the groups in ascending key order.
    let samples = builders
        .values()
        .map(SampleBuilder::build)
        .collect::<Result<Vec<Sample>, BuildError>>()?;

    let total_bytes: usize = samples.iter().map(Sample::memory_size).sum();
    info!(
        instrument = source.name,
        samples = samples.len(),
        memory_kb = total_bytes / 1024,
        "Samples built"
    );

    Ok(samples)
}
