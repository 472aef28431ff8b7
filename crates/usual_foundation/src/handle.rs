//! Generational handles and the arena that issues them.
//!
//! A [`Handle`] names one registration (a subscription, a listener) so it can
//! be released individually. The generation counter increments when a slot is
//! reused, so a handle kept past its release can never address the new
//! occupant.

// Allow u64 to usize casts - we target 64-bit systems
#![allow(clippy::cast_possible_truncation)]

use std::fmt;

use crate::error::{Error, Result};

/// Handle with generational index for stale reference detection.
///
/// # Layout
/// - `index`: 64-bit index into arena storage
/// - `generation`: 32-bit generation counter
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Handle {
    /// Index into arena storage.
    pub index: u64,
    /// Generation counter for stale reference detection.
    pub generation: u32,
}

impl Handle {
    /// Creates a new handle with the given index and generation.
    #[must_use]
    pub const fn new(index: u64, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns a sentinel value representing "no registration".
    ///
    /// This uses `u64::MAX` as the index, which is never allocated.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            index: u64::MAX,
            generation: 0,
        }
    }

    /// Returns true if this is the null sentinel value.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u64::MAX
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle({}v{})", self.index, self.generation)
        }
    }
}

/// Slot storage addressed by generational [`Handle`]s.
///
/// Slots are allocated from a free list when available, otherwise new indices
/// are allocated. When a value is removed its index goes on the free list and
/// its generation is incremented. Even generations are free, odd generations
/// are occupied.
#[derive(Debug, Clone)]
pub struct HandleArena<T> {
    generations: Vec<u32>,
    slots: Vec<Option<T>>,
    free_list: Vec<u64>,
    live_count: usize,
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleArena<T> {
    /// Creates a new empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            slots: Vec::new(),
            free_list: Vec::new(),
            live_count: 0,
        }
    }

    /// Stores a value and returns its handle.
    pub fn insert(&mut self, value: T) -> Handle {
        self.live_count += 1;

        if let Some(index) = self.free_list.pop() {
            let idx = index as usize;
            // Was even/free, now odd/occupied
            self.generations[idx] += 1;
            self.slots[idx] = Some(value);
            Handle::new(index, self.generations[idx])
        } else {
            let index = self.generations.len() as u64;
            self.generations.push(1);
            self.slots.push(Some(value));
            Handle::new(index, 1)
        }
    }

    /// Removes and returns the value behind a handle.
    ///
    /// Returns `Err` if the handle is stale or was never issued.
    pub fn remove(&mut self, handle: Handle) -> Result<T> {
        self.validate(handle)?;

        let idx = handle.index as usize;
        self.generations[idx] += 1;
        self.free_list.push(handle.index);
        self.live_count -= 1;

        self.slots[idx]
            .take()
            .ok_or_else(|| Error::handle_not_found(handle))
    }

    /// Validates that a handle addresses an occupied slot.
    pub fn validate(&self, handle: Handle) -> Result<()> {
        let idx = handle.index as usize;

        if handle.is_null() || idx >= self.generations.len() {
            return Err(Error::handle_not_found(handle));
        }

        let current_gen = self.generations[idx];

        if current_gen != handle.generation {
            return Err(Error::stale_handle(handle));
        }

        if current_gen % 2 == 0 {
            return Err(Error::handle_not_found(handle));
        }

        Ok(())
    }

    /// Returns true if the handle addresses an occupied slot.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.validate(handle).is_ok()
    }

    /// Returns the value behind a handle.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.validate(handle).ok()?;
        self.slots[handle.index as usize].as_ref()
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Iterates over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.as_ref()
                    .map(|value| (Handle::new(idx as u64, self.generations[idx]), value))
            })
    }

    /// Removes every value for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for idx in 0..self.slots.len() {
            let drop_it = self.slots[idx].as_ref().is_some_and(|value| !keep(value));
            if drop_it {
                self.slots[idx] = None;
                self.generations[idx] += 1;
                self.free_list.push(idx as u64);
                self.live_count -= 1;
            }
        }
    }

    /// Removes and returns every value in index order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.live_count);
        for idx in 0..self.slots.len() {
            if let Some(value) = self.slots[idx].take() {
                self.generations[idx] += 1;
                self.free_list.push(idx as u64);
                drained.push(value);
            }
        }
        self.live_count = 0;
        drained
    }
}
