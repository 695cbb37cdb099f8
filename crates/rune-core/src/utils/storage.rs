// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A dense array with a queue of recycled slots, addressed by opaque handles.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroU32;

/// An opaque, non-zero handle into a [`Storage`].
///
/// The raw value is the slot index plus one, so zero is never a valid handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(NonZeroU32);

impl RawHandle {
    /// Builds a handle from its raw integer form. Returns `None` for zero.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw integer form of the handle. Never zero.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1));
        Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MAX))
    }

    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({})", self.0)
    }
}

/// A growable arena of `T` that reuses freed slots before growing.
///
/// Freed slots are recycled in the order they were freed.
#[derive(Debug)]
pub struct Storage<T> {
    slots: Vec<Option<T>>,
    free: VecDeque<usize>,
    count: usize,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            count: 0,
        }
    }
}

impl<T> Storage<T> {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` and returns its handle.
    pub fn add(&mut self, value: T) -> RawHandle {
        self.count += 1;
        if let Some(index) = self.free.pop_front() {
            self.slots[index] = Some(value);
            return RawHandle::from_index(index);
        }
        self.slots.push(Some(value));
        RawHandle::from_index(self.slots.len() - 1)
    }

    /// Returns the value behind `handle`, or `None` if the slot is empty.
    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        self.slots.get(handle.index()).and_then(Option::as_ref)
    }

    /// Returns a mutable reference to the value behind `handle`.
    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.index()).and_then(Option::as_mut)
    }

    /// Returns `true` if `handle` refers to a live value.
    pub fn contains(&self, handle: RawHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes the value behind `handle` and queues its slot for reuse.
    ///
    /// Removing an empty slot returns `None` and leaves the free queue untouched.
    pub fn remove(&mut self, handle: RawHandle) -> Option<T> {
        let value = self.slots.get_mut(handle.index())?.take()?;
        self.free.push_back(handle.index());
        self.count -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no value is stored.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterates over live values with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (RawHandle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (RawHandle::from_index(i), v)))
    }

    /// Removes every value, returning them. All slots become free, in index order.
    pub fn drain(&mut self) -> Vec<T> {
        let values: Vec<T> = self.slots.drain(..).flatten().collect();
        self.free.clear();
        self.count = 0;
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handles_are_one_based() {
        let mut storage = Storage::new();
        let first = storage.add("a");
        assert_eq!(first.get(), 1);
        assert_eq!(storage.get(first), Some(&"a"));
    }

    #[test]
    fn test_zero_is_not_a_handle() {
        assert!(RawHandle::from_raw(0).is_none());
        assert_eq!(RawHandle::from_raw(3).map(RawHandle::get), Some(3));
    }

    #[test]
    fn test_freed_slots_recycled_fifo() {
        let mut storage = Storage::new();
        let a = storage.add(1);
        let b = storage.add(2);
        let _c = storage.add(3);

        storage.remove(b);
        storage.remove(a);

        assert_eq!(storage.add(4), b);
        assert_eq!(storage.add(5), a);
        assert_eq!(storage.add(6).get(), 4);
    }

    #[test]
    fn test_double_remove_does_not_duplicate_slot() {
        let mut storage = Storage::new();
        let a = storage.add(1);
        assert_eq!(storage.remove(a), Some(1));
        assert_eq!(storage.remove(a), None);

        let x = storage.add(2);
        let y = storage.add(3);
        assert_ne!(x, y);
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_live_handles_are_unique() {
        let mut storage = Storage::new();
        let mut live = Vec::new();
        for i in 0..64 {
            live.push(storage.add(i));
            if i % 3 == 0 {
                let victim = live.remove(live.len() / 2);
                storage.remove(victim);
            }
        }
        let unique: HashSet<_> = live.iter().copied().collect();
        assert_eq!(unique.len(), live.len());
        assert_eq!(storage.len(), live.len());
        assert!(live.iter().all(|h| storage.contains(*h)));
    }

    #[test]
    fn test_get_unknown_handle() {
        let storage: Storage<u8> = Storage::new();
        let handle = RawHandle::from_raw(7).unwrap();
        assert!(storage.get(handle).is_none());
    }

    #[test]
    fn test_drain_empties_storage() {
        let mut storage = Storage::new();
        storage.add('x');
        let y = storage.add('y');
        storage.remove(y);
        storage.add('z');

        let mut drained = storage.drain();
        drained.sort();
        assert_eq!(drained, vec!['x', 'z']);
        assert!(storage.is_empty());
        assert_eq!(storage.add('w').get(), 1);
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut storage = Storage::new();
        let a = storage.add(10);
        let b = storage.add(20);
        storage.remove(a);
        let items: Vec<_> = storage.iter().collect();
        assert_eq!(items, vec![(b, &20)]);
    }
}
