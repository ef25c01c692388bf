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
// Voice mixing shared by the cpal output and offline rendering
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::voice::Voice;

/// Core audio mixing logic that's independent of any audio backend
#[derive(Clone)]
pub struct AudioMixer {
    /// Voices currently being rendered
    voices: Arc<Mutex<Vec<Voice>>>,
    /// Sender for new voices, usable from any thread without touching the voice list
    voice_tx: Sender<Voice>,
    voice_rx: Receiver<Voice>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
    /// Master gain as f32 bits
    master_gain: Arc<AtomicU32>,
    /// Number of frames rendered so far
    clock: Arc<AtomicU64>,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32, master_gain: f32) -> Self {
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded();
        Self {
            voices: Arc::new(Mutex::new(Vec::new())),
            voice_tx,
            voice_rx,
            num_channels,
            sample_rate,
            master_gain: Arc::new(AtomicU32::new(master_gain.to_bits())),
            clock: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a sender that hands voices to the mixer
    pub fn voice_sender(&self) -> Sender<Voice> {
        self.voice_tx.clone()
    }

    /// Returns the frame clock shared with stop handles
    pub fn clock(&self) -> Arc<AtomicU64> {
        self.clock.clone()
    }

    /// Returns the next frame to be rendered
    pub fn current_frame(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    pub fn master_gain(&self) -> f32 {
        f32::from_bits(self.master_gain.load(Ordering::Relaxed))
    }

    pub fn set_master_gain(&self, gain: f32) {
        self.master_gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    /// Returns the number of voices that are rendering or waiting to be picked up
    pub fn active_voice_count(&self) -> usize {
        self.voices.lock().len() + self.voice_rx.len()
    }

    /// Renders `num_frames` frames into the interleaved `output` buffer and
    /// advances the clock by the frames that fit. The buffer is overwritten.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let num_channels = self.num_channels as usize;
        let len = (num_frames * num_channels).min(output.len());
        let output = &mut output[..len];
        output.fill(0.0);

        let frame_start = self.clock.load(Ordering::Acquire);
        let gain = self.master_gain();
        {
            let mut voices = self.voices.lock();
            voices.extend(self.voice_rx.try_iter());
            voices.retain_mut(|voice| voice.render(output, num_channels, frame_start, gain));
        }

        let rendered = len.checked_div(num_channels).unwrap_or(0);
        self.clock
            .store(frame_start + rendered as u64, Ordering::Release);
    }

    /// Processes multiple frames of audio mixing
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut output = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut output, num_frames);
        output
    }

    /// Gets the number of channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
