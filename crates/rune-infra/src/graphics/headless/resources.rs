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

use rune_core::renderer::{
    BufferHandle, GpuResources, MaterialDescriptor, MaterialFlags, MaterialHandle, MeshHandle,
    MeshTopology, ReflectionData, ResourceError, TextureDescriptor, TextureFormat, TextureHandle,
    Vertex,
};
use rune_core::utils::{Buffer, Storage};

use crate::graphics::check_program;

/// Totals of the operations a [`CpuResources`] has performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounters {
    /// Buffers created.
    pub buffers_created: usize,
    /// Calls to `update_buffer`.
    pub buffer_writes: usize,
    /// Bytes written by `update_buffer`.
    pub bytes_written: usize,
    /// Meshes created.
    pub meshes_created: usize,
    /// Calls to `update_mesh_vertices` and `update_mesh_indices`.
    pub mesh_updates: usize,
    /// Programs compiled.
    pub programs_compiled: usize,
    /// Textures created.
    pub textures_created: usize,
    /// Resources of every kind destroyed.
    pub destroyed: usize,
}

/// Number of resources of each kind currently alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveResources {
    /// Live buffers.
    pub buffers: usize,
    /// Live meshes.
    pub meshes: usize,
    /// Live programs.
    pub programs: usize,
    /// Live textures.
    pub textures: usize,
}

impl LiveResources {
    /// Sum over every kind.
    pub fn total(&self) -> usize {
        self.buffers + self.meshes + self.programs + self.textures
    }
}

#[derive(Debug)]
pub(crate) struct CpuMesh {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) indices: Vec<u16>,
    pub(crate) topology: MeshTopology,
}

#[derive(Debug)]
pub(crate) struct CpuProgram {
    pub(crate) label: String,
    pub(crate) flags: MaterialFlags,
    pub(crate) reflection: ReflectionData,
}

#[derive(Debug)]
pub(crate) struct CpuTexture {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: TextureFormat,
    pub(crate) pixels: Vec<u8>,
}

/// [`GpuResources`] backed by plain memory.
#[derive(Debug, Default)]
pub struct CpuResources {
    pub(crate) buffers: Storage<Buffer>,
    pub(crate) meshes: Storage<CpuMesh>,
    pub(crate) programs: Storage<CpuProgram>,
    pub(crate) textures: Storage<CpuTexture>,
    pub(crate) counters: ResourceCounters,
}

impl CpuResources {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation totals since creation.
    pub fn counters(&self) -> ResourceCounters {
        self.counters
    }

    /// Resources currently alive.
    pub fn live(&self) -> LiveResources {
        LiveResources {
            buffers: self.buffers.len(),
            meshes: self.meshes.len(),
            programs: self.programs.len(),
            textures: self.textures.len(),
        }
    }

    /// The contents of a buffer.
    pub fn buffer_bytes(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(handle.raw()).map(Buffer::as_bytes)
    }

    /// Drops every resource still alive and returns how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let leaked = self.live().total();
        self.buffers.drain();
        self.meshes.drain();
        self.programs.drain();
        self.textures.drain();
        leaked
    }

    fn destroyed<T>(&mut self, removed: Option<T>) -> Result<(), ResourceError> {
        removed.ok_or(ResourceError::InvalidHandle)?;
        self.counters.destroyed += 1;
        Ok(())
    }

    fn mesh_mut(&mut self, handle: MeshHandle) -> Result<&mut CpuMesh, ResourceError> {
        self.counters.mesh_updates += 1;
        self.meshes
            .get_mut(handle.raw())
            .ok_or(ResourceError::InvalidHandle)
    }
}

impl GpuResources for CpuResources {
    fn create_buffer(
        &mut self,
        size: usize,
        data: Option<&[u8]>,
    ) -> Result<BufferHandle, ResourceError> {
        let mut buffer = Buffer::with_size(size);
        if let Some(data) = data {
            if data.len() > size {
                return Err(ResourceError::OutOfBounds);
            }
            buffer.write_bytes(0, data);
        }
        self.counters.buffers_created += 1;
        Ok(BufferHandle::from(self.buffers.add(buffer)))
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), ResourceError> {
        let removed = self.buffers.remove(handle.raw());
        self.destroyed(removed)
    }

    fn update_buffer(
        &mut self,
        handle: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let buffer = self
            .buffers
            .get_mut(handle.raw())
            .ok_or(ResourceError::InvalidHandle)?;
        if !buffer.contains_range(offset, data.len()) {
            return Err(ResourceError::OutOfBounds);
        }
        buffer.write_bytes(offset, data);
        self.counters.buffer_writes += 1;
        self.counters.bytes_written += data.len();
        Ok(())
    }

    fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u16],
        topology: MeshTopology,
    ) -> Result<MeshHandle, ResourceError> {
        self.counters.meshes_created += 1;
        Ok(MeshHandle::from(self.meshes.add(CpuMesh {
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
            topology,
        })))
    }

    fn destroy_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError> {
        let removed = self.meshes.remove(handle.raw());
        self.destroyed(removed)
    }

    fn update_mesh_vertices(
        &mut self,
        handle: MeshHandle,
        vertices: &[Vertex],
    ) -> Result<(), ResourceError> {
        self.mesh_mut(handle)?.vertices = vertices.to_vec();
        Ok(())
    }

    fn update_mesh_indices(
        &mut self,
        handle: MeshHandle,
        indices: &[u16],
    ) -> Result<(), ResourceError> {
        self.mesh_mut(handle)?.indices = indices.to_vec();
        Ok(())
    }

    fn create_material(
        &mut self,
        descriptor: &MaterialDescriptor<'_>,
    ) -> Result<MaterialHandle, ResourceError> {
        check_program(descriptor)?;
        self.counters.programs_compiled += 1;
        log::debug!(
            "CpuResources: compiled '{}' with {:?}",
            descriptor.label,
            descriptor.flags
        );
        Ok(MaterialHandle::from(self.programs.add(CpuProgram {
            label: descriptor.label.to_string(),
            flags: descriptor.flags,
            reflection: descriptor.reflection.clone(),
        })))
    }

    fn destroy_material(&mut self, handle: MaterialHandle) -> Result<(), ResourceError> {
        let removed = self.programs.remove(handle.raw());
        self.destroyed(removed)
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor<'_>,
    ) -> Result<TextureHandle, ResourceError> {
        descriptor.validate()?;
        self.counters.textures_created += 1;
        Ok(TextureHandle::from(self.textures.add(CpuTexture {
            width: descriptor.width,
            height: descriptor.height,
            format: descriptor.format,
            pixels: descriptor.pixels.to_vec(),
        })))
    }

    fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), ResourceError> {
        let removed = self.textures.remove(handle.raw());
        self.destroyed(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rune_core::renderer::ShaderCode;

    const FLAT: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    #[test]
    fn test_buffer_bounds_are_checked() {
        let mut gpu = CpuResources::new();
        let handle = gpu.create_buffer(8, Some(&[1, 2, 3])).unwrap();
        assert_eq!(gpu.buffer_bytes(handle).unwrap(), &[1, 2, 3, 0, 0, 0, 0, 0]);

        assert!(matches!(
            gpu.update_buffer(handle, 6, &[9; 4]),
            Err(ResourceError::OutOfBounds)
        ));
        gpu.update_buffer(handle, 4, &[9; 4]).unwrap();
        assert_eq!(gpu.counters().bytes_written, 4);
        assert!(matches!(
            gpu.create_buffer(2, Some(&[0; 3])),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn test_double_destroy_is_invalid_handle() {
        let mut gpu = CpuResources::new();
        let handle = gpu.create_buffer(4, None).unwrap();
        gpu.destroy_buffer(handle).unwrap();
        assert!(matches!(
            gpu.destroy_buffer(handle),
            Err(ResourceError::InvalidHandle)
        ));
        assert_eq!(gpu.counters().destroyed, 1);
    }

    #[test]
    fn test_program_needs_valid_code() {
        let mut gpu = CpuResources::new();
        let code = ShaderCode::wgsl(FLAT);
        let reflection = rune_core::renderer::reflect_shader(&code.vertex, &code.fragment);
        let descriptor = MaterialDescriptor {
            label: "flat",
            code: &code,
            reflection: &reflection,
            flags: MaterialFlags::DEPTH_TEST,
        };
        assert!(gpu.create_material(&descriptor).is_ok());

        let broken = ShaderCode::wgsl("fn nope( {");
        let descriptor = MaterialDescriptor {
            code: &broken,
            reflection: &ReflectionData::default(),
            ..descriptor
        };
        assert!(matches!(
            gpu.create_material(&descriptor),
            Err(ResourceError::Shader(_))
        ));
        assert_eq!(gpu.live().programs, 1);
    }

    #[test]
    fn test_texture_pixels_must_match() {
        let mut gpu = CpuResources::new();
        let pixels = [255u8; 12];
        let ok = TextureDescriptor {
            width: 2,
            height: 2,
            format: TextureFormat::Rgb,
            pixels: &pixels,
        };
        assert!(gpu.create_texture(&ok).is_ok());
        let wrong = TextureDescriptor {
            format: TextureFormat::Rgba,
            ..ok
        };
        assert!(matches!(
            gpu.create_texture(&wrong),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }
}
