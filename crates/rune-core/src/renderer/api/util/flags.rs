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

//! Flags describing the fixed-function state a material needs.

/// Fixed-function state of a material.
///
/// Backends turn these into pipeline state. The draw buckets also read
/// [`MaterialFlags::TRANSPARENT`] to order transparent draws after opaque ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialFlags {
    bits: u32,
}

impl MaterialFlags {
    /// No flags.
    pub const NONE: Self = Self { bits: 0 };
    /// Disables back-face culling.
    pub const DOUBLE_SIDED: Self = Self { bits: 1 << 0 };
    /// Tests and writes the depth buffer.
    pub const DEPTH_TEST: Self = Self { bits: 1 << 1 };
    /// Fragments are discarded by the shader below an alpha threshold.
    pub const ALPHA_TEST: Self = Self { bits: 1 << 2 };
    /// Alpha blended. Depth writes are disabled.
    pub const TRANSPARENT: Self = Self { bits: 1 << 3 };

    /// Creates flags from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Removes `other` from these flags.
    pub const fn difference(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    /// Checks if every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Checks if no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Sets or clears `other`.
    pub fn set(&mut self, other: Self, enabled: bool) {
        *self = if enabled {
            self.union(other)
        } else {
            self.difference(other)
        };
    }
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self::DEPTH_TEST
    }
}

impl std::ops::BitOr for MaterialFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for MaterialFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}
