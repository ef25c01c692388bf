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
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use crate::engine::SamplerSettings;

mod error;

pub use error::ConfigError;

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "SFSAMPLER";

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_MASTER_GAIN: f32 = 0.5;
const DEFAULT_RELEASE: Duration = Duration::from_millis(100);
const DEFAULT_SCHEDULE_DELAY_FRAMES: u64 = 256;

/// What to do with a zone that has no key range.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyRangePolicy {
    /// Fail the import.
    Strict,
    /// Warn and treat the zone as starting at key 0.
    #[default]
    DefaultToZero,
}

/// Behavior when a key is struck again while its previous voice is still held.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerBehavior {
    /// Let the previous voice keep sounding. Note off only reaches the newest voice.
    #[default]
    Overlap,
    /// Release the previous voice before the new one starts.
    Release,
}

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// The output device.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Number of output channels (default: 2)
    channels: Option<u16>,

    /// Gain applied to the sum of all voices (default: 0.5)
    master_gain: Option<f32>,

    /// Length of the release ramp (default: 100ms)
    release: Option<String>,

    /// Frames between a note event and the frame it takes effect at (default: 256)
    schedule_delay_frames: Option<u64>,

    key_range_policy: Option<KeyRangePolicy>,

    retrigger: Option<RetriggerBehavior>,
}

impl EngineConfig {
    /// Loads the configuration from an optional YAML file, overridden by
    /// `SFSAMPLER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
        Self::load_with_environment(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_environment(
        path: Option<&Path>,
        environment: Environment,
    ) -> Result<EngineConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(environment)
            .build()?
            .try_deserialize::<EngineConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every configured value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate() == 0 {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.channels() == 0 {
            return Err(ConfigError::Invalid {
                field: "channels",
                reason: "must be greater than zero".to_string(),
            });
        }
        let gain = self.master_gain();
        if !gain.is_finite() || gain < 0.0 {
            return Err(ConfigError::Invalid {
                field: "master_gain",
                reason: format!("{} is not a non-negative number", gain),
            });
        }
        self.release()?;
        Ok(())
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.unwrap_or(DEFAULT_MASTER_GAIN)
    }

    /// Returns the release ramp length from the configuration.
    pub fn release(&self) -> Result<Duration, ConfigError> {
        match &self.release {
            Some(release) => DurationString::from_string(release.clone())
                .map(Into::into)
                .map_err(|e| ConfigError::InvalidDuration {
                    value: release.clone(),
                    reason: e.to_string(),
                }),
            None => Ok(DEFAULT_RELEASE),
        }
    }

    pub fn schedule_delay_frames(&self) -> u64 {
        self.schedule_delay_frames
            .unwrap_or(DEFAULT_SCHEDULE_DELAY_FRAMES)
    }

    pub fn key_range_policy(&self) -> KeyRangePolicy {
        self.key_range_policy.unwrap_or_default()
    }

    pub fn retrigger(&self) -> RetriggerBehavior {
        self.retrigger.unwrap_or_default()
    }

    /// Returns the sampler settings described by this configuration.
    pub fn sampler_settings(&self) -> Result<SamplerSettings, ConfigError> {
        Ok(SamplerSettings {
            release: self.release()?,
            schedule_delay_frames: self.schedule_delay_frames(),
            key_range_policy: self.key_range_policy(),
            retrigger: self.retrigger(),
        })
    }
}
