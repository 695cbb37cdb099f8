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

//! Identity primitives for CPU-side assets.
//!
//! Every asset that a backend may mirror on the GPU carries an [`AssetId`]. Backends key
//! their mirrors by this id instead of by pointer, so an asset can be moved, cloned behind
//! an `Rc` or swapped between backends without confusing the mirror caches.

mod uuid;

pub use self::uuid::AssetId;

/// A CPU-side asset that can be realized by a rendering backend.
pub trait Asset {
    /// The unique identity of this asset instance.
    fn id(&self) -> AssetId;
}
