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

/// Errors that abort an instrument import.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{instrument} zone {zone} has no key range")]
    MissingKeyRange { instrument: String, zone: usize },

    #[error("Unknown audio configuration ({mask}) for samples starting at key {lowest_key}")]
    UnknownAudioConfiguration { lowest_key: u8, mask: u16 },

    #[error(
        "Stereo sample starting at key {lowest_key} has mismatched sample rates ({left}Hz left, {right}Hz right)"
    )]
    SampleRateMismatch { lowest_key: u8, left: u32, right: u32 },
}
