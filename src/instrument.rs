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

//! Instruments and key to sample resolution.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::builder::{build_samples, BuildError};
use crate::config::KeyRangePolicy;
use crate::sample::Sample;
use crate::zone::InstrumentSource;

/// An ordered set of samples, ascending by lowest key.
pub struct Instrument {
    name: String,
    samples: RwLock<Vec<Arc<Sample>>>,
    /// Set when a lowest key was edited and the order has to be restored.
    order_dirty: Arc<AtomicBool>,
}

impl Instrument {
    /// Creates an instrument from already built samples.
    pub fn new(name: &str, samples: Vec<Sample>) -> Instrument {
        let order_dirty = Arc::new(AtomicBool::new(false));
        let mut samples: Vec<Arc<Sample>> = samples.into_iter().map(Arc::new).collect();
        samples.sort_by_key(|sample| sample.lowest_key.get());

        for sample in samples.iter() {
            let order_dirty = order_dirty.clone();
            sample
                .lowest_key
                .add_observer(move |_| order_dirty.store(true, Ordering::Release));
        }

        Instrument {
            name: name.to_string(),
            samples: RwLock::new(samples),
            order_dirty,
        }
    }

    /// Builds an instrument from the zones of a parsed SoundFont instrument.
    pub fn from_source(
        source: &InstrumentSource,
        policy: KeyRangePolicy,
    ) -> Result<Instrument, BuildError> {
        Ok(Instrument::new(&source.name, build_samples(source, policy)?))
    }

    /// Returns the instrument name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sample selected by `key`: the one with the greatest lowest key
    /// that is not above `key`. Keys below every sample fall back to the lowest
    /// sample. Returns None only if the instrument has no samples.
    pub fn resolve(&self, key: u8) -> Option<Arc<Sample>> {
        self.restore_order();

        let samples = self.samples.read();
        let first = samples.first()?;
        let above = samples.partition_point(|sample| sample.lowest_key.get() <= key);
        match above {
            0 => Some(first.clone()),
            n => Some(samples[n - 1].clone()),
        }
    }

    /// Returns the samples in ascending lowest key order.
    pub fn samples(&self) -> Vec<Arc<Sample>> {
        self.restore_order();
        self.samples.read().clone()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Returns the size of all PCM data in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.read().iter().map(|s| s.memory_size()).sum()
    }

    /// Returns the lowest keys shared by more than one sample, ascending.
    /// Only the last of the samples sharing a key is reachable through `resolve`.
    pub fn duplicate_keys(&self) -> Vec<u8> {
        self.restore_order();
        duplicate_keys(&self.samples.read())
    }

    fn restore_order(&self) {
        if self.order_dirty.swap(false, Ordering::AcqRel) {
            let mut samples = self.samples.write();
            samples.sort_by_key(|sample| sample.lowest_key.get());
            for key in duplicate_keys(&samples) {
                warn!(instrument = self.name, key, "Duplicate lowest key");
            }
        }
    }
}

/// Keys shared by neighbours in a list sorted by lowest key.
fn duplicate_keys(samples: &[Arc<Sample>]) -> Vec<u8> {
    let mut keys: Vec<u8> = samples
        .windows(2)
        .map(|pair| (pair[0].lowest_key.get(), pair[1].lowest_key.get()))
        .filter(|(a, b)| a == b)
        .map(|(key, _)| key)
        .collect();
    keys.dedup();
    keys
}

impl Drop for Instrument {
    fn drop(&mut self) {
        for sample in self.samples.get_mut().iter() {
            sample.dispose();
        }
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("samples", &self.len())
            .finish()
    }
}
