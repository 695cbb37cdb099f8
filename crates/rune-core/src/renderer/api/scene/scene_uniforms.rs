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

//! Per-draw camera and transform uniforms.

use glam::Mat4;

use crate::renderer::api::handle::BindingSlot;

/// Where every shader expects the per-draw [`SceneUniforms`].
pub const SCENE_UNIFORM_SLOT: BindingSlot = BindingSlot::new(0, 0);

/// Where every shader expects the per-frame lighting block.
pub const LIGHTING_UNIFORM_SLOT: BindingSlot = BindingSlot::new(0, 1);

/// Camera matrices and the world transform of one draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    /// Projection matrix.
    pub projection: Mat4,
    /// View matrix.
    pub view: Mat4,
    /// Object-to-world matrix.
    pub world: Mat4,
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
        }
    }
}
