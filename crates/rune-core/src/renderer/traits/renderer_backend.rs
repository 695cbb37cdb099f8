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

use std::rc::Rc;
use std::sync::Arc;

use crate::platform::window::RenderWindow;
use crate::renderer::api::core::{BackendSettings, RenderStats};
use crate::renderer::api::handle::{BindingSlot, BufferHandle, BufferRange};
use crate::renderer::api::material_inst::MaterialInst;
use crate::renderer::api::scene::{Mesh, Submesh};
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::GpuResources;

/// A rendering API implementation driven by the graphics system.
///
/// Backends realize CPU assets lazily: the first `bind_*` call that needs an asset creates its
/// GPU mirror and subscribes to the asset, and the asset's notifications keep the mirror up
/// to date until it is destroyed or the backend is cleaned up.
pub trait RendererBackend: GpuResources {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// The settings the backend was configured with.
    fn settings(&self) -> &BackendSettings;

    /// Replaces the settings. Takes effect at the next `init` or surface configuration.
    fn set_settings(&mut self, settings: BackendSettings);

    /// Creates the device and every backend-wide resource.
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If no usable device exists.
    fn init(&mut self) -> Result<(), RenderError>;

    /// Releases every resource, including the mirrors of still-alive assets.
    fn cleanup(&mut self);

    /// Presents to `window` from now on, or renders offscreen when `None`.
    fn set_window(&mut self, window: Option<Arc<dyn RenderWindow>>) -> Result<(), RenderError>;

    /// The window's framebuffer changed size.
    fn on_framebuffer_size(&mut self, width: u32, height: u32);

    /// Clears the target and forgets every binding.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    /// Submits the frame.
    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// Binds a whole uniform buffer for the following draws.
    fn bind_uniform_buffer(&mut self, handle: BufferHandle, slot: BindingSlot) {
        self.bind_uniform_buffer_range(handle, slot, None);
    }

    /// Binds a byte range of a uniform buffer, or all of it when `range` is `None`.
    fn bind_uniform_buffer_range(
        &mut self,
        handle: BufferHandle,
        slot: BindingSlot,
        range: Option<BufferRange>,
    );

    /// Binds a material instance, realizing its program, buffers and textures if needed.
    /// Binding the instance that is already bound does nothing.
    fn bind_material(&mut self, instance: &Rc<MaterialInst>) -> Result<(), ResourceError>;

    /// Binds a mesh, realizing it if needed. Binding the mesh that is already bound does
    /// nothing.
    fn bind_mesh(&mut self, mesh: &Rc<Mesh>) -> Result<(), ResourceError>;

    /// Draws every index of the bound mesh with the bound material.
    ///
    /// # Panics
    ///
    /// Panics if no material or no mesh is bound.
    fn draw(&mut self);

    /// Draws one index range of the bound mesh.
    ///
    /// # Panics
    ///
    /// Panics if no material or no mesh is bound.
    fn draw_submesh(&mut self, submesh: Submesh);

    /// Counters of the current, or last finished, frame.
    fn frame_stats(&self) -> RenderStats;

    /// Downcast to Any for type-specific access
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to Any for type-specific mutable access
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
