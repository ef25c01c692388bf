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

//! Voices: single playing occurrences of a sample.
//!
//! A voice is created on the control thread, handed to the mixer and rendered
//! there until it terminates. The only way to reach a voice after that is its
//! [`StopHandle`], which schedules the release ramp on the mixer's frame clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::sample::{RenderBuffer, Sample};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Marks a voice whose release has not been scheduled.
const NO_RELEASE: u64 = u64::MAX;

/// Lifecycle of a voice.
///
/// Running out of non-looping data also moves a voice to `Releasing`. With no
/// data left to ramp down, it terminates on the next frame it renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    /// Waiting for its start frame.
    Scheduled,
    /// Playing at unity gain.
    Sounding,
    /// Ramping down towards silence.
    Releasing,
    /// Finished. The voice no longer produces output.
    Terminated,
}

/// Releases a voice. Stopping is idempotent: only the first call schedules a
/// release, later calls do nothing.
#[derive(Clone, Debug)]
pub struct StopHandle {
    voice_id: u64,
    release_at: Arc<AtomicU64>,
    clock: Arc<AtomicU64>,
    schedule_delay_frames: u64,
    start_at: u64,
}

impl StopHandle {
    /// Schedules the release ramp. The ramp begins at the later of the voice's
    /// start frame and the current frame plus the scheduling delay. Returns
    /// false if the voice had already been stopped.
    pub fn stop(&self) -> bool {
        let now = self.clock.load(Ordering::Acquire);
        let release_at = self
            .start_at
            .max(now.saturating_add(self.schedule_delay_frames));
        let stopped = self
            .release_at
            .compare_exchange(NO_RELEASE, release_at, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if stopped {
            debug!(voice_id = self.voice_id, release_at, "Voice stop scheduled");
        }
        stopped
    }

    /// Returns true if the voice has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.release_at.load(Ordering::Acquire) != NO_RELEASE
    }

    /// Returns the ID of the voice this handle stops.
    pub fn voice_id(&self) -> u64 {
        self.voice_id
    }
}

/// A single playing occurrence of a sample.
pub struct Voice {
    id: u64,
    sample: Arc<Sample>,
    /// Snapshot of the render buffer taken when the voice was created.
    buffer: Arc<RenderBuffer>,
    key: u8,
    /// Source frames advanced per output frame.
    step: f64,
    position: f64,
    /// Loop region in source frames, clamped to the buffer.
    loop_region: Option<(usize, usize)>,
    /// Output frame at which the voice starts sounding.
    start_at: u64,
    /// Output frame at which the release ramp is scheduled to begin.
    release_at: Arc<AtomicU64>,
    /// Frame the ramp actually began at. A release scheduled behind the frame
    /// being rendered starts at that frame instead, so the ramp always begins at unity.
    release_start: Option<u64>,
    release_frames: u64,
    state: VoiceState,
}

impl Voice {
    /// Creates a voice playing `sample` at the pitch of `key`, starting at output
    /// frame `start_at`. The sample's playing count is incremented immediately.
    pub fn new(
        sample: Arc<Sample>,
        key: u8,
        output_rate: u32,
        start_at: u64,
        release_frames: u64,
    ) -> Voice {
        let buffer = sample.render_buffer();
        let ratio = sample.pitch_ratio(key);
        let step = ratio * f64::from(buffer.sample_rate()) / f64::from(output_rate);
        let num_frames = buffer.num_frames();
        let loop_region = sample.loop_region().map(|(start, end)| {
            let start = (start as usize).min(num_frames);
            let end = (end as usize).min(num_frames);
            if end <= start {
                (0, num_frames)
            } else {
                (start, end)
            }
        });

        sample.num_playing.update(|playing| playing + 1);

        let mut voice = Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            sample,
            buffer,
            key,
            step,
            position: 0.0,
            loop_region,
            start_at,
            release_at: Arc::new(AtomicU64::new(NO_RELEASE)),
            release_start: None,
            release_frames,
            state: VoiceState::Scheduled,
        };

        if !step.is_finite() || step <= 0.0 || num_frames == 0 {
            warn!(
                sample = voice.sample.name.get(),
                key,
                step,
                num_frames,
                "Voice has nothing to play"
            );
            voice.terminate();
        }

        voice
    }

    /// Returns a handle that stops this voice relative to `clock`.
    pub fn stop_handle(&self, clock: Arc<AtomicU64>, schedule_delay_frames: u64) -> StopHandle {
        StopHandle {
            voice_id: self.id,
            release_at: self.release_at.clone(),
            clock,
            schedule_delay_frames,
            start_at: self.start_at,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Returns the playback rate in source frames per output frame.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Adds this voice into `out`, an interleaved buffer with `channels` channels
    /// whose first frame is output frame `frame_start`. Returns false once the
    /// voice has terminated.
    ///
    /// This runs on the audio thread. Terminating a voice notifies the sample's
    /// `num_playing` observers from here, so they must not block.
    pub fn render(
        &mut self,
        out: &mut [f32],
        channels: usize,
        frame_start: u64,
        gain: f32,
    ) -> bool {
        if channels == 0 {
            return self.state != VoiceState::Terminated;
        }

        let source_channels = self.buffer.channel_count();
        let num_frames = self.buffer.num_frames();

        for (i, frame_out) in out.chunks_exact_mut(channels).enumerate() {
            let frame = frame_start + i as u64;
            match self.state {
                VoiceState::Terminated => return false,
                VoiceState::Scheduled if frame < self.start_at => continue,
                VoiceState::Scheduled => {
                    self.state = VoiceState::Sounding;
                    debug!(voice_id = self.id, frame, "Voice started");
                }
                _ => {}
            }

            if self.loop_region.is_none() && self.position >= num_frames as f64 {
                // Out of data: nothing left to ramp down.
                self.terminate();
                return false;
            }

            let mut envelope = 1.0f32;
            if self.release_start.is_none() && frame >= self.release_at.load(Ordering::Acquire) {
                self.release_start = Some(frame);
            }
            if let Some(release_start) = self.release_start {
                self.state = VoiceState::Releasing;
                let elapsed = frame - release_start;
                if elapsed >= self.release_frames {
                    self.terminate();
                    return false;
                }
                envelope = 1.0 - elapsed as f32 / self.release_frames as f32;
            }

            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            let next = match self.loop_region {
                Some((loop_start, loop_end)) if index + 1 >= loop_end => loop_start,
                _ => index + 1,
            };
            let scale = envelope * gain;
            for (channel, value) in frame_out.iter_mut().enumerate() {
                let source = self.buffer.channel(channel % source_channels);
                let current = source[index];
                let following = source.get(next).copied().unwrap_or(0.0);
                *value += (current + (following - current) * fraction) * scale;
            }

            self.position += self.step;
            match self.loop_region {
                Some((loop_start, loop_end)) if self.position >= loop_end as f64 => {
                    let length = (loop_end - loop_start) as f64;
                    self.position = loop_start as f64 + (self.position - loop_start as f64) % length;
                }
                None if self.position >= num_frames as f64 => {
                    self.state = VoiceState::Releasing;
                }
                _ => {}
            }
        }

        self.state != VoiceState::Terminated
    }

    fn terminate(&mut self) {
        if self.state == VoiceState::Terminated {
            return;
        }
        self.state = VoiceState::Terminated;
        self.sample
            .num_playing
            .update(|playing| playing.saturating_sub(1));
        debug!(voice_id = self.id, key = self.key, "Voice terminated");
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pcm: Vec<i16>, sample_rate: u32, loop_region: Option<(u32, u32)>) -> Arc<Sample> {
        let num_frames = pcm.len() as u32;
        let (loop_start, loop_end) = loop_region.unwrap_or((0, 0));
        Arc::new(Sample::new(
            vec![Arc::from(pcm)],
            "test",
            num_frames,
            sample_rate,
            0,
            60,
            0,
            loop_start,
            loop_end,
            loop_region.is_some(),
        ))
    }

    fn scaled(values: &[i16]) -> Vec<f32> {
        values.iter().map(|&v| v as f32 / 32767.0).collect()
    }

    #[test]
    fn test_plays_at_native_rate_and_ends() {
        let pcm = vec![0, 0x7FFF, 0, -0x7FFF];
        let sample = sample(pcm.clone(), 44100, None);
        let mut voice = Voice::new(sample.clone(), 60, 44100, 0, 0);
        assert_eq!(sample.num_playing.get(), 1);
        assert_eq!(voice.step(), 1.0);

        let mut out = vec![0.0f32; 8];
        assert!(!voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(&out[..4], scaled(&pcm).as_slice());
        assert_eq!(&out[4..], &[0.0; 4]);
        assert_eq!(voice.state(), VoiceState::Terminated);
        assert_eq!(sample.num_playing.get(), 0);
    }

    #[test]
    fn test_natural_end_passes_through_releasing() {
        let sample = sample(vec![0x7FFF; 4], 44100, None);
        let mut voice = Voice::new(sample.clone(), 60, 44100, 0, 0);

        let mut out = vec![0.0f32; 4];
        assert!(voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(out, vec![1.0; 4]);
        assert_eq!(voice.state(), VoiceState::Releasing);
        assert_eq!(sample.num_playing.get(), 1);

        let mut out = vec![0.0f32; 2];
        assert!(!voice.render(&mut out, 1, 4, 1.0));
        assert_eq!(out, vec![0.0; 2]);
        assert_eq!(voice.state(), VoiceState::Terminated);
        assert_eq!(sample.num_playing.get(), 0);
    }

    #[test]
    fn test_playing_count_observers_run_on_termination() {
        let sample = sample(vec![0x7FFF; 2], 44100, None);
        let counts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let counts = counts.clone();
            sample
                .num_playing
                .add_observer(move |playing| counts.lock().push(*playing));
        }

        let mut voice = Voice::new(sample, 60, 44100, 0, 0);
        let mut out = vec![0.0f32; 4];
        assert!(!voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(*counts.lock(), vec![1, 0]);
    }

    #[test]
    fn test_octave_up_doubles_step() {
        let pcm: Vec<i16> = (0..8).map(|i| i * 1000).collect();
        let mut voice = Voice::new(sample(pcm, 44100, None), 72, 44100, 0, 0);
        assert_eq!(voice.step(), 2.0);

        let mut out = vec![0.0f32; 4];
        voice.render(&mut out, 1, 0, 1.0);
        assert_eq!(out, scaled(&[0, 2000, 4000, 6000]));
    }

    #[test]
    fn test_sample_rate_conversion_interpolates() {
        let mut voice = Voice::new(sample(vec![0, 0x7FFF, 0x7FFF], 22050, None), 60, 44100, 0, 0);
        assert_eq!(voice.step(), 0.5);

        let mut out = vec![0.0f32; 3];
        voice.render(&mut out, 1, 0, 1.0);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_loop_repeats_region() {
        let pcm: Vec<i16> = (0..8).map(|i| i * 100).collect();
        let sample = sample(pcm, 44100, Some((2, 6)));
        let mut voice = Voice::new(sample.clone(), 60, 44100, 0, 0);

        let mut out = vec![0.0f32; 12];
        assert!(voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(
            out,
            scaled(&[0, 100, 200, 300, 400, 500, 200, 300, 400, 500, 200, 300])
        );
        assert_eq!(voice.state(), VoiceState::Sounding);
        assert_eq!(sample.num_playing.get(), 1);
    }

    #[test]
    fn test_degenerate_loop_region_loops_whole_buffer() {
        let sample = sample(vec![100, 200, 300], 44100, Some((2, 2)));
        let mut voice = Voice::new(sample, 60, 44100, 0, 0);

        let mut out = vec![0.0f32; 6];
        assert!(voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(out, scaled(&[100, 200, 300, 100, 200, 300]));
    }

    #[test]
    fn test_stop_ramps_then_terminates() {
        let sample = sample(vec![0x7FFF; 100], 44100, None);
        let clock = Arc::new(AtomicU64::new(0));
        let mut voice = Voice::new(sample.clone(), 60, 44100, 0, 4);
        let handle = voice.stop_handle(clock.clone(), 0);

        let mut out = vec![0.0f32; 2];
        assert!(voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(out, vec![1.0, 1.0]);

        clock.store(2, Ordering::Release);
        assert!(handle.stop());
        assert!(handle.is_stopped());

        let mut out = vec![0.0f32; 6];
        assert!(!voice.render(&mut out, 1, 2, 1.0));
        assert_eq!(out, vec![1.0, 0.75, 0.5, 0.25, 0.0, 0.0]);
        assert_eq!(voice.state(), VoiceState::Terminated);
        assert_eq!(sample.num_playing.get(), 0);
    }

    #[test]
    fn test_stop_between_renders_ramps_from_unity() {
        let sample = sample(vec![0x7FFF; 10_000], 44100, None);
        let clock = Arc::new(AtomicU64::new(0));
        let mut voice = Voice::new(sample, 60, 44100, 0, 4410);
        let handle = voice.stop_handle(clock, 256);

        // The block started at frame 0 and the clock has not moved yet, so the
        // release lands at frame 256, behind the next frame to render.
        let mut out = vec![0.0f32; 600];
        assert!(voice.render(&mut out, 1, 0, 1.0));
        assert!(handle.stop());

        let mut out = vec![0.0f32; 4410];
        assert!(voice.render(&mut out, 1, 600, 1.0));
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 1.0 - 1.0 / 4410.0);
        assert!(out.windows(2).all(|pair| pair[1] < pair[0]));
        assert_eq!(voice.state(), VoiceState::Releasing);

        let mut out = vec![0.0f32; 1];
        assert!(!voice.render(&mut out, 1, 5010, 1.0));
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let sample = sample(vec![0x7FFF; 100], 44100, None);
        let clock = Arc::new(AtomicU64::new(0));
        let mut voice = Voice::new(sample.clone(), 60, 44100, 0, 0);
        let handle = voice.stop_handle(clock, 0);

        assert!(handle.stop());
        assert!(!handle.stop());

        let mut out = vec![0.0f32; 4];
        assert!(!voice.render(&mut out, 1, 0, 1.0));
        drop(voice);
        assert!(!handle.stop());
        assert_eq!(sample.num_playing.get(), 0);
    }

    #[test]
    fn test_release_is_scheduled_after_delay() {
        let sample = sample(vec![0x7FFF; 100], 44100, None);
        let clock = Arc::new(AtomicU64::new(0));
        let mut voice = Voice::new(sample, 60, 44100, 0, 2);
        let handle = voice.stop_handle(clock, 3);
        handle.stop();

        let mut out = vec![0.0f32; 6];
        assert!(!voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_scheduled_start() {
        let sample = sample(vec![0x7FFF; 100], 44100, None);
        let mut voice = Voice::new(sample, 60, 44100, 3, 0);

        let mut out = vec![0.0f32; 2];
        voice.render(&mut out, 1, 0, 1.0);
        assert_eq!(out, vec![0.0, 0.0]);
        assert_eq!(voice.state(), VoiceState::Scheduled);

        let mut out = vec![0.0f32; 2];
        voice.render(&mut out, 1, 2, 1.0);
        assert_eq!(out, vec![0.0, 1.0]);
        assert_eq!(voice.state(), VoiceState::Sounding);
    }

    #[test]
    fn test_stop_before_start_waits_for_start() {
        let sample = sample(vec![0x7FFF; 100], 44100, None);
        let clock = Arc::new(AtomicU64::new(0));
        let mut voice = Voice::new(sample, 60, 44100, 2, 2);
        voice.stop_handle(clock, 0).stop();

        let mut out = vec![0.0f32; 5];
        assert!(!voice.render(&mut out, 1, 0, 1.0));
        assert_eq!(out, vec![0.0, 0.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_mono_fills_every_output_channel() {
        let mut voice = Voice::new(sample(vec![0x7FFF; 10], 44100, None), 60, 44100, 0, 0);
        let mut out = vec![0.0f32; 4];
        voice.render(&mut out, 2, 0, 0.5);
        assert_eq!(out, vec![0.5; 4]);
    }

    #[test]
    fn test_stereo_channels_map_left_right() {
        let sample = Arc::new(Sample::new(
            vec![Arc::from(vec![0x7FFFi16; 10]), Arc::from(vec![-0x7FFFi16; 10])],
            "stereo",
            10,
            44100,
            0,
            60,
            0,
            0,
            0,
            false,
        ));
        let mut voice = Voice::new(sample, 60, 44100, 0, 0);
        let mut out = vec![0.0f32; 4];
        voice.render(&mut out, 2, 0, 1.0);
        assert_eq!(out, vec![1.0, -1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_render_is_additive() {
        let mut voice = Voice::new(sample(vec![0x7FFF; 10], 44100, None), 60, 44100, 0, 0);
        let mut out = vec![0.25f32; 2];
        voice.render(&mut out, 1, 0, 1.0);
        assert_eq!(out, vec![1.25, 1.25]);
    }

    #[test]
    fn test_drop_releases_playing_count() {
        let sample = sample(vec![0; 10], 44100, None);
        let first = Voice::new(sample.clone(), 60, 44100, 0, 0);
        let second = Voice::new(sample.clone(), 64, 44100, 0, 0);
        assert_eq!(sample.num_playing.get(), 2);

        drop(first);
        assert_eq!(sample.num_playing.get(), 1);
        drop(second);
        assert_eq!(sample.num_playing.get(), 0);
    }

    #[test]
    fn test_zero_sample_rate_terminates_immediately() {
        let sample = sample(vec![0x7FFF; 10], 44100, None);
        sample.sample_rate.set(0);
        let voice = Voice::new(sample.clone(), 60, 44100, 0, 0);
        assert_eq!(voice.state(), VoiceState::Terminated);
        assert_eq!(sample.num_playing.get(), 0);
    }
}
