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

//! The sampler: routes note events to the active instrument and starts voices.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use midly::live::LiveEvent;
use midly::MidiMessage;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::builder::BuildError;
use crate::config::{KeyRangePolicy, RetriggerBehavior};
use crate::instrument::Instrument;
use crate::mixer::AudioMixer;
use crate::sample::Sample;
use crate::voice::{StopHandle, Voice};
use crate::zone::InstrumentSource;

/// Runtime settings of the sampler.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerSettings {
    /// Length of the release ramp after a stop.
    pub release: Duration,
    /// Frames between a note event and the frame its voice starts or releases at.
    pub schedule_delay_frames: u64,
    pub key_range_policy: KeyRangePolicy,
    pub retrigger: RetriggerBehavior,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        SamplerSettings {
            release: Duration::from_millis(100),
            schedule_delay_frames: 256,
            key_range_policy: KeyRangePolicy::default(),
            retrigger: RetriggerBehavior::default(),
        }
    }
}

/// Plays the active instrument in response to note events.
pub struct Sampler {
    /// The mixer voices are rendered by.
    mixer: Arc<AudioMixer>,
    /// Channel for adding voices without lock contention.
    voice_tx: Sender<Voice>,
    /// The active instrument, replaced as a whole on import.
    instrument: RwLock<Option<Arc<Instrument>>>,
    /// Stop handle of the most recent voice per key.
    held: Mutex<HashMap<u8, StopHandle>>,
    settings: SamplerSettings,
    release_frames: u64,
}

impl Sampler {
    /// Creates a sampler that renders through `mixer`.
    pub fn new(mixer: Arc<AudioMixer>, settings: SamplerSettings) -> Sampler {
        let release_frames =
            (settings.release.as_secs_f64() * f64::from(mixer.sample_rate())).round() as u64;
        Sampler {
            voice_tx: mixer.voice_sender(),
            mixer,
            instrument: RwLock::new(None),
            held: Mutex::new(HashMap::new()),
            settings,
            release_frames,
        }
    }

    /// Builds an instrument from `source` and makes it the active instrument.
    /// On failure the previous instrument stays active.
    pub fn import_instrument(&self, source: &InstrumentSource) -> Result<(), BuildError> {
        let instrument = match Instrument::from_source(source, self.settings.key_range_policy) {
            Ok(instrument) => Arc::new(instrument),
            Err(e) => {
                error!(instrument = source.name, err = %e, "Instrument import failed");
                return Err(e);
            }
        };

        info!(
            instrument = source.name,
            samples = instrument.len(),
            memory_kb = instrument.memory_size() / 1024,
            "Instrument imported"
        );

        // Sounding voices keep their own render buffers, so the previous
        // instrument can be disposed right away.
        let _previous = self.instrument.write().replace(instrument);
        Ok(())
    }

    /// Returns the active instrument.
    pub fn instrument(&self) -> Option<Arc<Instrument>> {
        self.instrument.read().clone()
    }

    /// Starts a voice for `key`. Keys without a sample are ignored.
    pub fn note_on(&self, key: u8) {
        let sample = match self.instrument().and_then(|instrument| instrument.resolve(key)) {
            Some(sample) => sample,
            None => {
                warn!(key, "No sample for key");
                return;
            }
        };

        let handle = self.play_voice(&sample, key);
        let previous = self.held.lock().insert(key, handle);
        if let Some(previous) = previous {
            match self.settings.retrigger {
                RetriggerBehavior::Overlap => {}
                RetriggerBehavior::Release => {
                    previous.stop();
                }
            }
        }
    }

    /// Releases the voice most recently started for `key`, if any.
    pub fn note_off(&self, key: u8) {
        let handle = self.held.lock().remove(&key);
        match handle {
            Some(handle) => {
                handle.stop();
            }
            None => debug!(key, "Note off without active voice"),
        }
    }

    /// Starts a voice playing `sample` at the pitch of `key` and returns its stop handle.
    pub fn play_voice(&self, sample: &Arc<Sample>, key: u8) -> StopHandle {
        let start_at = self.mixer.current_frame() + self.settings.schedule_delay_frames;
        let voice = Voice::new(
            sample.clone(),
            key,
            self.mixer.sample_rate(),
            start_at,
            self.release_frames,
        );
        let handle = voice.stop_handle(self.mixer.clock(), self.settings.schedule_delay_frames);

        debug!(
            voice_id = voice.id(),
            key,
            sample = sample.name.get(),
            pitch_ratio = sample.pitch_ratio(key),
            start_at,
            "Playing voice"
        );

        if self.voice_tx.send(voice).is_err() {
            error!(key, "Mixer is gone, voice dropped");
        }
        handle
    }

    /// Processes an incoming MIDI event.
    pub fn process_midi_event(&self, raw_event: &[u8]) {
        let event = match LiveEvent::parse(raw_event) {
            Ok(e) => e,
            Err(e) => {
                debug!(error = ?e, "Failed to parse MIDI event");
                return;
            }
        };

        if let LiveEvent::Midi { message, .. } = event {
            match message {
                // Note On with velocity 0 is equivalent to Note Off
                MidiMessage::NoteOn { key, vel } if u8::from(vel) == 0 => {
                    self.note_off(u8::from(key))
                }
                MidiMessage::NoteOn { key, .. } => self.note_on(u8::from(key)),
                MidiMessage::NoteOff { key, .. } => self.note_off(u8::from(key)),
                _ => {}
            }
        }
    }

    /// Releases every held voice.
    pub fn stop_all(&self) {
        let held: Vec<StopHandle> = self.held.lock().drain().map(|(_, handle)| handle).collect();
        debug!(voices = held.len(), "Stopping all voices");
        for handle in held {
            handle.stop();
        }
    }

    /// Returns the number of voices known to the mixer.
    pub fn active_voice_count(&self) -> usize {
        self.mixer.active_voice_count()
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }
}
