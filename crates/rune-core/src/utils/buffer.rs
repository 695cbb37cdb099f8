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

//! An owned byte region with offset-checked reads and writes.
//!
//! [`Buffer`] is the storage behind every CPU-side uniform block. All accesses are
//! validated against the allocation length; an access that would run past the end is a
//! logic error in the caller and panics.

use bytemuck::Pod;

/// An owned, raw byte allocation.
///
/// Cloning a `Buffer` copies its bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    /// Creates an empty buffer with no allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a zero-initialized buffer of `size` bytes.
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Creates a buffer holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    /// Releases the current allocation and allocates `size` zeroed bytes.
    ///
    /// A size of zero leaves the buffer empty.
    pub fn allocate(&mut self, size: usize) {
        self.release();
        if size > 0 {
            self.data = vec![0; size];
        }
    }

    /// Frees the allocation. The buffer becomes empty.
    pub fn release(&mut self) {
        self.data = Vec::new();
    }

    /// Sets every byte of the allocation to zero.
    pub fn zero(&mut self) {
        self.data.fill(0);
    }

    /// The allocation length in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer holds no allocation.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole allocation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns `size` bytes starting at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + size` exceeds the allocation.
    pub fn read_bytes(&self, offset: usize, size: usize) -> &[u8] {
        self.check_range(offset, size);
        &self.data[offset..offset + size]
    }

    /// Copies `bytes` into the allocation at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + bytes.len()` exceeds the allocation.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.check_range(offset, bytes.len());
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Reads a plain-old-data value at `offset`. The offset needs no particular alignment.
    ///
    /// # Panics
    /// Panics if the value does not fit inside the allocation.
    pub fn read<T: Pod>(&self, offset: usize) -> T {
        bytemuck::pod_read_unaligned(self.read_bytes(offset, std::mem::size_of::<T>()))
    }

    /// Writes a plain-old-data value at `offset`.
    ///
    /// # Panics
    /// Panics if the value does not fit inside the allocation.
    pub fn write<T: Pod>(&mut self, offset: usize, value: &T) {
        self.write_bytes(offset, bytemuck::bytes_of(value));
    }

    /// Returns `true` if `size` bytes at `offset` lie inside the allocation.
    pub fn contains_range(&self, offset: usize, size: usize) -> bool {
        offset
            .checked_add(size)
            .is_some_and(|end| end <= self.data.len())
    }

    fn check_range(&self, offset: usize, size: usize) {
        assert!(
            self.contains_range(offset, size),
            "Buffer overflow! offset {offset} + size {size} exceeds {} bytes",
            self.data.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_zeroed() {
        let mut buffer = Buffer::new();
        assert!(buffer.is_empty());

        buffer.allocate(16);
        assert_eq!(buffer.size(), 16);
        assert!(buffer.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_allocate_zero_leaves_empty() {
        let mut buffer = Buffer::with_size(8);
        buffer.allocate(0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn test_reallocate_discards_previous_contents() {
        let mut buffer = Buffer::with_size(4);
        buffer.write(0, &7u32);
        buffer.allocate(8);
        assert_eq!(buffer.read::<u32>(0), 0);
    }

    #[test]
    fn test_typed_write_read_at_unaligned_offset() {
        let mut buffer = Buffer::with_size(12);
        buffer.write(3, &1.5f32);
        assert_eq!(buffer.read::<f32>(3), 1.5);
        assert_eq!(buffer.read_bytes(0, 3), &[0, 0, 0]);
    }

    #[test]
    fn test_write_at_exact_end_is_allowed() {
        let mut buffer = Buffer::with_size(8);
        buffer.write_bytes(4, &[1, 2, 3, 4]);
        assert_eq!(buffer.read_bytes(4, 4), &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "Buffer overflow!")]
    fn test_write_past_end_panics() {
        let mut buffer = Buffer::with_size(8);
        buffer.write_bytes(6, &[0; 4]);
    }

    #[test]
    #[should_panic(expected = "Buffer overflow!")]
    fn test_read_past_end_panics() {
        let buffer = Buffer::with_size(4);
        let _ = buffer.read::<u64>(0);
    }

    #[test]
    fn test_contains_range_handles_overflowing_offsets() {
        let buffer = Buffer::with_size(4);
        assert!(buffer.contains_range(0, 4));
        assert!(!buffer.contains_range(usize::MAX, 2));
    }

    #[test]
    fn test_clone_is_deep() {
        let mut original = Buffer::with_size(4);
        let copy = original.clone();
        original.write(0, &9u32);
        assert_eq!(copy.read::<u32>(0), 0);
    }

    #[test]
    fn test_zero_clears_contents() {
        let mut buffer = Buffer::from_bytes(&[1, 2, 3]);
        buffer.zero();
        assert_eq!(buffer.as_bytes(), &[0, 0, 0]);
    }
}
