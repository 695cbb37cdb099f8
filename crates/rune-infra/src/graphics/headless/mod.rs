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

//! A backend without a device.
//!
//! Every resource lives in CPU memory and every draw is recorded as a [`DrawCall`](super::DrawCall),
//! which makes the material binding path observable without a GPU.

mod renderer;
mod resources;

pub use self::renderer::{HeadlessRenderer, MirrorCounts};
pub use self::resources::{CpuResources, LiveResources, ResourceCounters};
