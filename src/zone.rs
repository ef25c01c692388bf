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

//! Instrument zones as handed over by a SoundFont parser.
//!
//! Decoding the SoundFont binary is not done here. A parser fills these types and
//! the [builder](crate::builder) turns them into playable samples.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Generator index of `sampleModes`, which controls looping.
pub const GENERATOR_SAMPLE_MODES: u16 = 54;

/// The role a sample plays in a channel configuration.
///
/// Roles are bit flags so the roles of all zones sharing a key boundary can be
/// combined into a single mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRole(u16);

impl ChannelRole {
    /// A sample with a single (mono) channel.
    pub const MONO: ChannelRole = ChannelRole(1);
    /// The right channel of a stereo pair.
    pub const RIGHT: ChannelRole = ChannelRole(2);
    /// The left channel of a stereo pair.
    pub const LEFT: ChannelRole = ChannelRole(4);
    /// Both channels of a stereo pair.
    pub const STEREO: ChannelRole = ChannelRole(2 | 4);

    /// Creates a role from the raw SoundFont sample type.
    pub const fn from_bits(bits: u16) -> ChannelRole {
        ChannelRole(bits)
    }

    /// Returns the raw bits of this role.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns true if every bit of `other` is set in this role.
    pub const fn contains(self, other: ChannelRole) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ChannelRole {
    type Output = ChannelRole;

    fn bitor(self, rhs: ChannelRole) -> ChannelRole {
        ChannelRole(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ChannelRole {
    fn bitor_assign(&mut self, rhs: ChannelRole) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChannelRole::MONO => write!(f, "Mono"),
            ChannelRole::RIGHT => write!(f, "Right"),
            ChannelRole::LEFT => write!(f, "Left"),
            ChannelRole::STEREO => write!(f, "Left|Right"),
            ChannelRole(bits) => write!(f, "ChannelRole({})", bits),
        }
    }
}

/// An inclusive MIDI key range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyRange {
    pub lo: u8,
    pub hi: u8,
}

/// The sample header of a zone. All offsets are absolute positions in the
/// SoundFont's sample data chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleHeader {
    pub name: String,
    pub sample_rate: u32,
    pub start: u32,
    pub end: u32,
    pub start_loop: u32,
    pub end_loop: u32,
    /// MIDI key at which the sample plays without transposition.
    pub original_pitch: u8,
    /// Pitch correction in cents.
    pub pitch_correction: i8,
    pub channel_role: ChannelRole,
}

/// The sample referenced by a zone: its header and 16-bit PCM data.
#[derive(Clone, Debug)]
pub struct ZoneSample {
    pub header: SampleHeader,
    pub data: Arc<[i16]>,
}

impl ZoneSample {
    /// Returns the size of the PCM data in bytes.
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(&*self.data)
    }
}

/// A generator value attached to a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generator {
    pub amount: i16,
}

/// The generator table of a zone, indexed by SoundFont generator number.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Generators(HashMap<u16, Generator>);

impl Generators {
    /// Creates an empty generator table.
    pub fn new() -> Generators {
        Generators(HashMap::new())
    }

    /// Sets the amount of the given generator.
    pub fn set(&mut self, index: u16, amount: i16) {
        self.0.insert(index, Generator { amount });
    }

    /// Returns the generator with the given index, if present.
    pub fn get(&self, index: u16) -> Option<&Generator> {
        self.0.get(&index)
    }

    /// Returns true if the zone asks for its sample to loop.
    pub fn loop_enabled(&self) -> bool {
        self.get(GENERATOR_SAMPLE_MODES)
            .is_some_and(|generator| generator.amount == 1)
    }
}

/// A region of an instrument binding a key range to a sample.
#[derive(Clone, Debug)]
pub struct Zone {
    pub key_range: Option<KeyRange>,
    pub sample: ZoneSample,
    pub generators: Generators,
}

/// An instrument as exposed by the parser: a name and an ordered list of zones.
#[derive(Clone, Debug)]
pub struct InstrumentSource {
    pub name: String,
    pub zones: Vec<Zone>,
}

impl InstrumentSource {
    /// Returns the total size of the PCM data of all zones in bytes.
    pub fn byte_len(&self) -> usize {
        self.zones.iter().map(|zone| zone.sample.byte_len()).sum()
    }
}
