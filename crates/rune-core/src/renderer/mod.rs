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

//! Rendering: assets, backend contracts and the frame orchestrator.

pub mod api;
pub mod draw_bucket;
pub mod error;
pub mod graphics_system;
pub mod mirror;
pub mod observer;
pub mod traits;

pub use self::api::*;
pub use self::draw_bucket::{BucketKind, DrawBucket, DrawEntry};
pub use self::error::{RenderError, ResourceError, ShaderError};
pub use self::graphics_system::{GraphicsSystem, RendererFactory};
pub use self::mirror::{GpuMirrors, MeshMirror, MirrorSink, ObserverBridge, PreparedMaterial};
pub use self::observer::{
    MaterialInstObserver, MeshObserver, ObserverList, ShaderObserver, TextureObserver,
};
pub use self::traits::{GpuResources, MaterialDescriptor, RendererBackend};
