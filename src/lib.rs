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

//! A SoundFont-driven sample playback engine.
//!
//! Parsed instrument zones are turned into [`sample::Sample`]s by the
//! [`builder`], held by an [`instrument::Instrument`] and played by the
//! [`engine::Sampler`], which renders voices through an [`mixer::AudioMixer`].

pub mod audio;
pub mod builder;
pub mod config;
pub mod demo;
pub mod engine;
pub mod instrument;
pub mod mixer;
pub mod sample;
pub mod value;
pub mod voice;
pub mod zone;

#[cfg(test)]
mod testutil;
