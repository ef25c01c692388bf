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

//! Observable values.
//!
//! A [`Value`] is a mutable cell that notifies its observers whenever its contents
//! change. Every editable field of a sample is held in one of these so that an
//! editor can react to changes without the engine knowing it exists.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Identifies an observer registration so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ParseFn<T> = Arc<dyn Fn(&str) -> Option<T> + Send + Sync>;
type PrintFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Converts a value to and from its textual form.
pub struct PrintMapping<T> {
    parse: ParseFn<T>,
    print: PrintFn<T>,
}

impl<T> Clone for PrintMapping<T> {
    fn clone(&self) -> Self {
        Self {
            parse: self.parse.clone(),
            print: self.print.clone(),
        }
    }
}

impl<T> PrintMapping<T> {
    /// Creates a mapping from a parse and a print function.
    pub fn new(
        parse: impl Fn(&str) -> Option<T> + Send + Sync + 'static,
        print: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            parse: Arc::new(parse),
            print: Arc::new(print),
        }
    }

    /// Parses the string. Returns None if the string is not a valid value.
    pub fn parse(&self, string: &str) -> Option<T> {
        (self.parse)(string)
    }

    /// Prints the value.
    pub fn print(&self, value: &T) -> String {
        (self.print)(value)
    }
}

impl PrintMapping<String> {
    /// Accepts any string as is.
    pub fn any() -> Self {
        Self::new(|string| Some(string.to_string()), |value| value.clone())
    }
}

impl PrintMapping<bool> {
    /// Parses "true", "on", "1" and "yes" (case-insensitive) as true, anything else as false.
    pub fn boolean() -> Self {
        Self::new(
            |string| {
                let lower = string.trim().to_lowercase();
                Some(matches!(lower.as_str(), "true" | "on" | "1" | "yes"))
            },
            |value| if *value { "On" } else { "Off" }.to_string(),
        )
    }
}

impl PrintMapping<u32> {
    /// Any integer that fits into a u32.
    pub fn positive_integer() -> Self {
        Self::linear_int(0, i64::from(u32::MAX))
    }
}

impl<T> PrintMapping<T>
where
    T: Copy + Into<i64> + TryFrom<i64> + 'static,
{
    /// Parses a number, clamps it into `[min, max]` and rounds it to the nearest integer.
    pub fn linear_int(min: i64, max: i64) -> Self {
        Self::new(
            move |string| {
                let parsed = string.trim().parse::<f64>().ok()?;
                if parsed.is_nan() {
                    return None;
                }
                let clamped = parsed.clamp(min as f64, max as f64).round() as i64;
                T::try_from(clamped).ok()
            },
            |value| Into::<i64>::into(*value).to_string(),
        )
    }

    /// A MIDI key in `0..=127`.
    pub fn midi_note() -> Self {
        Self::linear_int(0, 127)
    }
}

/// A mutable cell that notifies observers when its value changes.
///
/// Observers run in reverse registration order after the new value has been
/// stored, outside of any internal lock, so an observer may read the value.
pub struct Value<T> {
    value: RwLock<T>,
    mapping: PrintMapping<T>,
    observers: Mutex<Vec<(ObserverId, Observer<T>)>>,
    next_observer_id: AtomicU64,
}

impl<T> Value<T>
where
    T: Clone + PartialEq,
{
    /// Creates a new value with the given formatting strategy.
    pub fn new(value: T, mapping: PrintMapping<T>) -> Self {
        Self {
            value: RwLock::new(value),
            mapping,
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(1),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Stores a new value. Observers are only notified if the value actually changed.
    /// Returns true if the value changed.
    pub fn set(&self, value: T) -> bool {
        self.update(|_| value)
    }

    /// Atomically replaces the value with `f(current)` and notifies observers on change.
    /// Returns true if the value changed.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let changed = {
            let mut guard = self.value.write();
            let next = f(&*guard);
            if *guard == next {
                None
            } else {
                *guard = next.clone();
                Some(next)
            }
        };

        match changed {
            Some(value) => {
                self.notify(&value);
                true
            }
            None => false,
        }
    }

    /// Parses the string with this value's mapping and stores the result.
    /// Returns false if the string could not be parsed; the value is left untouched.
    pub fn parse(&self, string: &str) -> bool {
        match self.mapping.parse(string) {
            Some(value) => {
                self.set(value);
                true
            }
            None => false,
        }
    }

    /// Prints the current value with this value's mapping.
    pub fn print(&self) -> String {
        self.mapping.print(&*self.value.read())
    }

    /// Registers an observer that is called with the new value after every change.
    pub fn add_observer(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    /// Removes a previously registered observer. Returns false if it was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Returns the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Detaches all observers.
    pub fn dispose(&self) {
        self.observers.lock().clear();
    }

    fn notify(&self, value: &T) {
        // Snapshot so observers may register or remove observers themselves.
        let observers: Vec<Observer<T>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers.iter().rev() {
            observer(value);
        }
    }
}

impl<T> fmt::Debug for Value<T>
where
    T: Clone + PartialEq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Value '{}'}}", self.print())
    }
}
