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

use crate::renderer::api::handle::{BufferHandle, MaterialHandle, MeshHandle, TextureHandle};
use crate::renderer::api::reflection::ReflectionData;
use crate::renderer::api::scene::Vertex;
use crate::renderer::api::shader::ShaderCode;
use crate::renderer::api::texture::TextureDescriptor;
use crate::renderer::api::util::{MaterialFlags, MeshTopology};
use crate::renderer::error::ResourceError;

/// Everything a backend needs to build a material program.
#[derive(Debug, Clone, Copy)]
pub struct MaterialDescriptor<'a> {
    /// A debug label, usually the shader name.
    pub label: &'a str,
    /// Code of both stages.
    pub code: &'a ShaderCode,
    /// The bindings the program exposes.
    pub reflection: &'a ReflectionData,
    /// Fixed-function state.
    pub flags: MaterialFlags,
}

/// Creation, update and destruction of backend resources.
///
/// Every handle returned stays valid until the matching `destroy_*` call. Destroying a handle
/// twice is a caller bug; backends report it as [`ResourceError::InvalidHandle`].
pub trait GpuResources {
    /// Creates a uniform buffer.
    /// ## Arguments
    /// * `size` - Byte size of the buffer.
    /// * `data` - Initial contents. The buffer is zeroed when `None`.
    /// ## Returns
    /// The handle of the new buffer.
    /// ## Errors
    /// * `ResourceError` - If `data` is larger than `size` or the backend fails.
    fn create_buffer(
        &mut self,
        size: usize,
        data: Option<&[u8]>,
    ) -> Result<BufferHandle, ResourceError>;

    /// Destroys a buffer.
    fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), ResourceError>;

    /// Overwrites `data.len()` bytes of a buffer starting at `offset`.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the range does not fit inside the buffer.
    fn update_buffer(
        &mut self,
        handle: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Creates vertex and index buffers for a mesh. Empty geometry is valid.
    fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u16],
        topology: MeshTopology,
    ) -> Result<MeshHandle, ResourceError>;

    /// Destroys a mesh.
    fn destroy_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError>;

    /// Replaces the vertices of a mesh. The handle does not change.
    fn update_mesh_vertices(
        &mut self,
        handle: MeshHandle,
        vertices: &[Vertex],
    ) -> Result<(), ResourceError>;

    /// Replaces the indices of a mesh. The handle does not change.
    fn update_mesh_indices(
        &mut self,
        handle: MeshHandle,
        indices: &[u16],
    ) -> Result<(), ResourceError>;

    /// Compiles a material program.
    /// ## Errors
    /// * `ResourceError::Shader` - If a stage fails to compile or lacks an entry point.
    fn create_material(
        &mut self,
        descriptor: &MaterialDescriptor<'_>,
    ) -> Result<MaterialHandle, ResourceError>;

    /// Destroys a material program.
    fn destroy_material(&mut self, handle: MaterialHandle) -> Result<(), ResourceError>;

    /// Creates a sampled texture.
    /// ## Errors
    /// * `ResourceError::InvalidDescriptor` - If the pixels do not match the dimensions.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor<'_>,
    ) -> Result<TextureHandle, ResourceError>;

    /// Destroys a texture.
    fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), ResourceError>;
}
