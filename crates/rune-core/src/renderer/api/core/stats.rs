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

//! Performance statistics for the rendering system.

/// A collection of statistics for a single rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// The number of draw calls issued for the frame.
    pub draw_calls: u32,
    /// The total number of triangles submitted for the frame.
    pub triangles: u32,
    /// Renderables rejected by frustum culling.
    pub culled: u32,
    /// Renderables dropped because their material or mesh could not be realized.
    pub skipped: u32,
    /// CPU time spent between the start of `render` and the end of submission.
    pub cpu_frame_time_ms: f32,
}
