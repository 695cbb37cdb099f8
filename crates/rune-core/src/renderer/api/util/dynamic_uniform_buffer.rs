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

//! Growable uniform buffer handing out one aligned slot per draw.

use crate::renderer::{
    api::handle::{BufferHandle, BufferRange},
    error::ResourceError,
    traits::GpuResources,
};

/// Default minimum uniform alignment required by most APIs
pub const MIN_UNIFORM_ALIGNMENT: usize = 256;

/// A single buffer allocation.
#[derive(Debug)]
struct BufferChunk {
    buffer: BufferHandle,
    capacity: usize,
    current_offset: usize,
}

/// A uniform buffer for data that is written many times per frame.
///
/// Every [`push`](Self::push) lands in its own aligned slot, so a write never overwrites data
/// an earlier draw of the same frame still reads. Chunks are added when capacity runs out and
/// are all reused after [`reset`](Self::reset).
#[derive(Debug)]
pub struct DynamicUniformBuffer {
    chunks: Vec<BufferChunk>,
    active_chunk_index: usize,
    alignment: usize,
    label: &'static str,
}

impl DynamicUniformBuffer {
    /// Creates a new dynamic uniform buffer.
    ///
    /// # Arguments
    ///
    /// * `resources` - The backend to allocate from.
    /// * `element_size` - The size of each element.
    /// * `max_elements` - The number of elements the first chunk holds.
    /// * `alignment` - The alignment of each element. Must be a power of two.
    /// * `label` - The label used in logs.
    ///
    /// # Returns
    ///
    /// A `Result` containing the dynamic uniform buffer or a `ResourceError`.
    pub fn new<R: GpuResources + ?Sized>(
        resources: &mut R,
        element_size: usize,
        max_elements: usize,
        alignment: usize,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        debug_assert!(alignment.is_power_of_two());
        let initial_capacity = align_up(element_size, alignment) * max_elements.max(1);
        let buffer = resources.create_buffer(initial_capacity, None)?;
        log::debug!(
            "DynamicUniformBuffer({label}): created with {initial_capacity} bytes ({max_elements} slots)"
        );

        Ok(Self {
            chunks: vec![BufferChunk {
                buffer,
                capacity: initial_capacity,
                current_offset: 0,
            }],
            active_chunk_index: 0,
            alignment,
            label,
        })
    }

    /// Makes every slot available again. Call once per frame.
    pub fn reset(&mut self) {
        for chunk in &mut self.chunks {
            chunk.current_offset = 0;
        }
        self.active_chunk_index = 0;
    }

    /// Writes `data` into a fresh slot.
    ///
    /// # Returns
    ///
    /// The buffer and the byte range of the slot, ready to bind.
    pub fn push<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        data: &[u8],
    ) -> Result<(BufferHandle, BufferRange), ResourceError> {
        let aligned_size = align_up(data.len(), self.alignment);

        let active = &self.chunks[self.active_chunk_index];
        if active.current_offset + aligned_size > active.capacity {
            let next = self.active_chunk_index + 1;
            if next < self.chunks.len() && self.chunks[next].capacity >= aligned_size {
                self.active_chunk_index = next;
            } else {
                let new_capacity = (active.capacity * 2).max(aligned_size * 16);
                let buffer = resources.create_buffer(new_capacity, None)?;
                log::debug!(
                    "DynamicUniformBuffer({}): grew by a {new_capacity} byte chunk",
                    self.label
                );
                self.chunks.insert(
                    next,
                    BufferChunk {
                        buffer,
                        capacity: new_capacity,
                        current_offset: 0,
                    },
                );
                self.active_chunk_index = next;
            }
        }

        let chunk = &mut self.chunks[self.active_chunk_index];
        let offset = chunk.current_offset;
        resources.update_buffer(chunk.buffer, offset, data)?;
        chunk.current_offset += aligned_size;

        Ok((chunk.buffer, BufferRange::new(offset, data.len())))
    }

    /// Number of buffers allocated so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Destroys every chunk.
    pub fn destroy<R: GpuResources + ?Sized>(&mut self, resources: &mut R) {
        for chunk in self.chunks.drain(..) {
            if let Err(e) = resources.destroy_buffer(chunk.buffer) {
                log::warn!(
                    "DynamicUniformBuffer({}): Failed to destroy buffer: {:?}",
                    self.label,
                    e
                );
            }
        }
        self.active_chunk_index = 0;
    }
}

/// Rounds `size` up to a multiple of `alignment` (a power of two).
pub const fn align_up(size: usize, alignment: usize) -> usize {
    (size + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{
        handle::{MaterialHandle, MeshHandle, TextureHandle},
        scene::Vertex,
        texture::TextureDescriptor,
        util::MeshTopology,
    };
    use crate::renderer::traits::MaterialDescriptor;
    use crate::utils::{Buffer, Storage};

    #[derive(Default)]
    struct CpuBuffers {
        buffers: Storage<Buffer>,
        writes: Vec<(BufferHandle, usize, usize)>,
    }

    impl GpuResources for CpuBuffers {
        fn create_buffer(
            &mut self,
            size: usize,
            _data: Option<&[u8]>,
        ) -> Result<BufferHandle, ResourceError> {
            Ok(BufferHandle::from(self.buffers.add(Buffer::with_size(size))))
        }
        fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), ResourceError> {
            self.buffers
                .remove(handle.raw())
                .map(|_| ())
                .ok_or(ResourceError::InvalidHandle)
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
            buffer.write_bytes(offset, data);
            self.writes.push((handle, offset, data.len()));
            Ok(())
        }
        fn create_mesh(
            &mut self,
            _vertices: &[Vertex],
            _indices: &[u16],
            _topology: MeshTopology,
        ) -> Result<MeshHandle, ResourceError> {
            Err(ResourceError::NotFound)
        }
        fn destroy_mesh(&mut self, _handle: MeshHandle) -> Result<(), ResourceError> {
            Ok(())
        }
        fn update_mesh_vertices(
            &mut self,
            _handle: MeshHandle,
            _vertices: &[Vertex],
        ) -> Result<(), ResourceError> {
            Ok(())
        }
        fn update_mesh_indices(
            &mut self,
            _handle: MeshHandle,
            _indices: &[u16],
        ) -> Result<(), ResourceError> {
            Ok(())
        }
        fn create_material(
            &mut self,
            _descriptor: &MaterialDescriptor<'_>,
        ) -> Result<MaterialHandle, ResourceError> {
            Err(ResourceError::NotFound)
        }
        fn destroy_material(&mut self, _handle: MaterialHandle) -> Result<(), ResourceError> {
            Ok(())
        }
        fn create_texture(
            &mut self,
            _descriptor: &TextureDescriptor<'_>,
        ) -> Result<TextureHandle, ResourceError> {
            Err(ResourceError::NotFound)
        }
        fn destroy_texture(&mut self, _handle: TextureHandle) -> Result<(), ResourceError> {
            Ok(())
        }
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(192, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_each_push_gets_its_own_slot() {
        let mut gpu = CpuBuffers::default();
        let mut ring = DynamicUniformBuffer::new(&mut gpu, 192, 4, 256, "scene").unwrap();

        let (a, ra) = ring.push(&mut gpu, &[1; 192]).unwrap();
        let (b, rb) = ring.push(&mut gpu, &[2; 192]).unwrap();

        assert_eq!(a, b);
        assert_eq!(ra, BufferRange::new(0, 192));
        assert_eq!(rb, BufferRange::new(256, 192));
        let buffer = gpu.buffers.get(a.raw()).unwrap();
        assert_eq!(buffer.read_bytes(0, 1), &[1]);
        assert_eq!(buffer.read_bytes(256, 1), &[2]);
    }

    #[test]
    fn test_grows_and_reuses_after_reset() {
        let mut gpu = CpuBuffers::default();
        let mut ring = DynamicUniformBuffer::new(&mut gpu, 64, 2, 256, "scene").unwrap();

        let handles: Vec<BufferHandle> = (0..5)
            .map(|_| ring.push(&mut gpu, &[0; 64]).unwrap().0)
            .collect();
        assert_eq!(ring.chunk_count(), 2);
        assert_eq!(handles[0], handles[1]);
        assert_ne!(handles[1], handles[2]);

        ring.reset();
        let (again, range) = ring.push(&mut gpu, &[0; 64]).unwrap();
        assert_eq!(again, handles[0]);
        assert_eq!(range.offset, 0);
        assert_eq!(ring.chunk_count(), 2);

        ring.destroy(&mut gpu);
        assert!(gpu.buffers.is_empty());
    }
}
