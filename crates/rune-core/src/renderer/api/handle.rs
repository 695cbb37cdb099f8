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

//! Opaque handles to backend resources.
//!
//! Each resource kind gets its own handle type so a mesh handle can never be passed where a
//! buffer handle is expected. Handles wrap a [`RawHandle`] and are therefore never zero.

use crate::utils::RawHandle;

/// Declares a typed, non-zero resource handle.
#[macro_export]
macro_rules! rune_handle {
    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident;
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name($crate::utils::RawHandle);

        impl $name {
            /// Wraps a raw storage handle.
            pub const fn from_handle(raw: $crate::utils::RawHandle) -> Self {
                Self(raw)
            }

            /// Builds a handle from its integer form. Returns `None` for the reserved zero.
            pub fn from_raw(raw: u32) -> Option<Self> {
                $crate::utils::RawHandle::from_raw(raw).map(Self)
            }

            /// The storage handle behind this id.
            pub const fn raw(self) -> $crate::utils::RawHandle {
                self.0
            }

            /// The integer form of the handle. Never zero.
            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl From<$crate::utils::RawHandle> for $name {
            fn from(raw: $crate::utils::RawHandle) -> Self {
                Self(raw)
            }
        }
    };
}

rune_handle! {
    /// An opaque handle to a GPU buffer, returned by `GpuResources::create_buffer`.
    pub struct BufferHandle;
}

rune_handle! {
    /// An opaque handle to a realized mesh (vertex + index buffers).
    pub struct MeshHandle;
}

rune_handle! {
    /// An opaque handle to a compiled material program.
    pub struct MaterialHandle;
}

rune_handle! {
    /// An opaque handle to a GPU texture together with the view used to sample it.
    pub struct TextureHandle;
}

/// A `(set, binding)` address of a shader resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BindingSlot {
    /// The descriptor set (bind group) index.
    pub set: u32,
    /// The binding index inside the set.
    pub binding: u32,
}

impl BindingSlot {
    /// Creates a slot address.
    pub const fn new(set: u32, binding: u32) -> Self {
        Self { set, binding }
    }
}

/// A byte range inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    /// Start of the range in bytes.
    pub offset: usize,
    /// Length of the range in bytes.
    pub size: usize,
}

impl BufferRange {
    /// Creates a byte range.
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// One past the last byte.
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

impl From<RawHandle> for u32 {
    fn from(handle: RawHandle) -> Self {
        handle.get()
    }
}
