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

//! `wgpu` objects behind the engine's resource handles.

use std::borrow::Cow;
use std::collections::HashMap;

use wgpu::util::DeviceExt;

use rune_core::renderer::{
    align_up, BindingKind, BufferHandle, GpuResources, MaterialDescriptor, MaterialFlags,
    MaterialHandle, MeshHandle, MeshTopology, ResourceError, ShaderError, ShaderStage,
    ShaderStageCode, TextureDescriptor, TextureHandle, Vertex,
};
use rune_core::utils::Storage;

use super::conversions::{
    blend_state, depth_stencil_state, primitive_state, texel_data, uploaded_bytes_per_pixel,
    vertex_buffer_layout, IntoWgpu,
};
use crate::graphics::check_program;

pub(crate) struct GpuBuffer {
    pub(crate) buffer: wgpu::Buffer,
    shadow: Vec<u8>,
}

pub(crate) struct GpuMesh {
    pub(crate) vertices: Option<wgpu::Buffer>,
    pub(crate) indices: Option<wgpu::Buffer>,
    topology: MeshTopology,
}

/// The bindings of one bind group, as `(binding, kind)` pairs.
pub(crate) type GroupBindings = Vec<(u32, BindingKind)>;

pub(crate) struct GpuProgram {
    pub(crate) label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    flags: MaterialFlags,
    layout: wgpu::PipelineLayout,
    pub(crate) groups: Vec<(wgpu::BindGroupLayout, GroupBindings)>,
    pipelines: HashMap<MeshTopology, wgpu::RenderPipeline>,
}

impl GpuProgram {
    /// The pipeline for `topology`, built on first use.
    pub(crate) fn pipeline(
        &mut self,
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        topology: MeshTopology,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&topology) {
            return pipeline.clone();
        }
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&self.label),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.vertex,
                entry_point: Some(&self.vertex_entry),
                compilation_options: Default::default(),
                buffers: &[vertex_buffer_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.fragment,
                entry_point: Some(&self.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: blend_state(self.flags),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: primitive_state(self.flags, topology),
            depth_stencil: Some(depth_stencil_state(self.flags)),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        log::debug!(
            "WgpuResources: built {topology:?} pipeline for '{}'",
            self.label
        );
        self.pipelines.insert(topology, pipeline.clone());
        pipeline
    }
}

pub(crate) struct GpuTexture {
    pub(crate) view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

/// [`GpuResources`] backed by a `wgpu` device.
///
/// Creation fails with [`ResourceError::BackendError`] until a device is attached.
pub struct WgpuResources {
    device: Option<(wgpu::Device, wgpu::Queue)>,
    pub(crate) color_format: wgpu::TextureFormat,
    pub(crate) buffers: Storage<GpuBuffer>,
    pub(crate) meshes: Storage<GpuMesh>,
    pub(crate) programs: Storage<GpuProgram>,
    pub(crate) textures: Storage<GpuTexture>,
}

impl WgpuResources {
    pub(crate) fn new(color_format: wgpu::TextureFormat) -> Self {
        Self {
            device: None,
            color_format,
            buffers: Storage::new(),
            meshes: Storage::new(),
            programs: Storage::new(),
            textures: Storage::new(),
        }
    }

    pub(crate) fn attach(&mut self, device: wgpu::Device, queue: wgpu::Queue) {
        self.device = Some((device, queue));
    }

    /// Drops every resource and the device. Returns how many resources were still alive.
    pub(crate) fn detach(&mut self) -> usize {
        let leaked =
            self.buffers.len() + self.meshes.len() + self.programs.len() + self.textures.len();
        self.buffers.drain();
        self.meshes.drain();
        self.programs.drain();
        self.textures.drain();
        self.device = None;
        leaked
    }

    pub(crate) fn device(&self) -> Result<&wgpu::Device, ResourceError> {
        self.device
            .as_ref()
            .map(|(device, _)| device)
            .ok_or_else(|| ResourceError::BackendError("no device attached".to_string()))
    }

    fn queue(&self) -> Result<&wgpu::Queue, ResourceError> {
        self.device
            .as_ref()
            .map(|(_, queue)| queue)
            .ok_or_else(|| ResourceError::BackendError("no device attached".to_string()))
    }

    fn create_module(
        &self,
        label: &str,
        stage: ShaderStage,
        code: &ShaderStageCode,
    ) -> Result<wgpu::ShaderModule, ResourceError> {
        let source = match code {
            ShaderStageCode::Wgsl(source) => wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.as_str())),
            ShaderStageCode::SpirV(bytes) => {
                if bytes.len() % 4 != 0 {
                    return Err(ResourceError::InvalidDescriptor(format!(
                        "{} SPIR-V of '{label}' is not a whole number of words",
                        stage.name()
                    )));
                }
                wgpu::util::make_spirv(bytes)
            }
        };
        let label = format!("{label} ({})", stage.name());
        Ok(self
            .device()?
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source,
            }))
    }

    fn index_buffer(&self, indices: &[u16]) -> Result<Option<wgpu::Buffer>, ResourceError> {
        if indices.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.device()?.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("rune mesh indices"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            },
        )))
    }

    fn vertex_buffer(&self, vertices: &[Vertex]) -> Result<Option<wgpu::Buffer>, ResourceError> {
        if vertices.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.device()?.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("rune mesh vertices"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            },
        )))
    }
}

impl GpuResources for WgpuResources {
    fn create_buffer(
        &mut self,
        size: usize,
        data: Option<&[u8]>,
    ) -> Result<BufferHandle, ResourceError> {
        let mut shadow = vec![0; align_up(size.max(1), 16)];
        if let Some(data) = data {
            if data.len() > size {
                return Err(ResourceError::OutOfBounds);
            }
            shadow[..data.len()].copy_from_slice(data);
        }
        let buffer = self
            .device()?
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("rune uniform buffer"),
                contents: &shadow,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        Ok(BufferHandle::from(
            self.buffers.add(GpuBuffer { buffer, shadow }),
        ))
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), ResourceError> {
        let buffer = self
            .buffers
            .remove(handle.raw())
            .ok_or(ResourceError::InvalidHandle)?;
        buffer.buffer.destroy();
        Ok(())
    }

    fn update_buffer(
        &mut self,
        handle: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let (_, queue) = self
            .device
            .as_ref()
            .ok_or_else(|| ResourceError::BackendError("no device attached".to_string()))?;
        let entry = self
            .buffers
            .get_mut(handle.raw())
            .ok_or(ResourceError::InvalidHandle)?;
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= entry.shadow.len())
            .ok_or(ResourceError::OutOfBounds)?;
        entry.shadow[offset..end].copy_from_slice(data);

        // Copies must start and end on 4-byte boundaries. The shadow is a multiple of 16 long.
        let start = offset & !3;
        let end = align_up(end, 4);
        queue.write_buffer(&entry.buffer, start as u64, &entry.shadow[start..end]);
        Ok(())
    }

    fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u16],
        topology: MeshTopology,
    ) -> Result<MeshHandle, ResourceError> {
        let mesh = GpuMesh {
            vertices: self.vertex_buffer(vertices)?,
            indices: self.index_buffer(indices)?,
            topology,
        };
        Ok(MeshHandle::from(self.meshes.add(mesh)))
    }

    fn destroy_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError> {
        let mesh = self
            .meshes
            .remove(handle.raw())
            .ok_or(ResourceError::InvalidHandle)?;
        for buffer in [mesh.vertices, mesh.indices].into_iter().flatten() {
            buffer.destroy();
        }
        Ok(())
    }

    fn update_mesh_vertices(
        &mut self,
        handle: MeshHandle,
        vertices: &[Vertex],
    ) -> Result<(), ResourceError> {
        let buffer = self.vertex_buffer(vertices)?;
        let mesh = self
            .meshes
            .get_mut(handle.raw())
            .ok_or(ResourceError::InvalidHandle)?;
        if let Some(old) = std::mem::replace(&mut mesh.vertices, buffer) {
            old.destroy();
        }
        Ok(())
    }

    fn update_mesh_indices(
        &mut self,
        handle: MeshHandle,
        indices: &[u16],
    ) -> Result<(), ResourceError> {
        let buffer = self.index_buffer(indices)?;
        let mesh = self
            .meshes
            .get_mut(handle.raw())
            .ok_or(ResourceError::InvalidHandle)?;
        if let Some(old) = std::mem::replace(&mut mesh.indices, buffer) {
            old.destroy();
        }
        log::trace!("WgpuResources: mesh {handle:?} indices replaced ({:?})", mesh.topology);
        Ok(())
    }

    fn create_material(
        &mut self,
        descriptor: &MaterialDescriptor<'_>,
    ) -> Result<MaterialHandle, ResourceError> {
        check_program(descriptor)?;
        let reflection = descriptor.reflection;
        let missing = |stage: ShaderStage| {
            ResourceError::from(ShaderError::MissingEntryPoint {
                stage: stage.name(),
            })
        };
        let vertex_entry = reflection
            .entry_point(ShaderStage::Vertex)
            .ok_or_else(|| missing(ShaderStage::Vertex))?
            .to_string();
        let fragment_entry = reflection
            .entry_point(ShaderStage::Fragment)
            .ok_or_else(|| missing(ShaderStage::Fragment))?
            .to_string();

        let vertex =
            self.create_module(descriptor.label, ShaderStage::Vertex, &descriptor.code.vertex)?;
        let fragment = self.create_module(
            descriptor.label,
            ShaderStage::Fragment,
            &descriptor.code.fragment,
        )?;

        let device = self.device()?;
        let groups: Vec<(wgpu::BindGroupLayout, GroupBindings)> = reflection
            .sets
            .iter()
            .map(|set| {
                let bindings: GroupBindings = set
                    .bindings
                    .iter()
                    .filter(|b| b.kind != BindingKind::None)
                    .map(|b| (b.binding, b.kind))
                    .collect();
                let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
                    .iter()
                    .filter_map(|&(binding, kind)| {
                        let ty: Option<wgpu::BindingType> = kind.into_wgpu();
                        Some(wgpu::BindGroupLayoutEntry {
                            binding,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: ty?,
                            count: None,
                        })
                    })
                    .collect();
                let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(descriptor.label),
                    entries: &entries,
                });
                (layout, bindings)
            })
            .collect();

        let group_layouts: Vec<&wgpu::BindGroupLayout> =
            groups.iter().map(|(layout, _)| layout).collect();
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(descriptor.label),
            bind_group_layouts: &group_layouts,
            immediate_size: 0,
        });

        let mut program = GpuProgram {
            label: descriptor.label.to_string(),
            vertex,
            fragment,
            vertex_entry,
            fragment_entry,
            flags: descriptor.flags,
            layout,
            groups,
            pipelines: HashMap::new(),
        };
        // Triangles are built up front so a broken program fails here and not mid-frame.
        program.pipeline(device, self.color_format, MeshTopology::Triangles);
        log::debug!(
            "WgpuResources: compiled '{}' with {:?}",
            descriptor.label,
            descriptor.flags
        );
        Ok(MaterialHandle::from(self.programs.add(program)))
    }

    fn destroy_material(&mut self, handle: MaterialHandle) -> Result<(), ResourceError> {
        self.programs
            .remove(handle.raw())
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor<'_>,
    ) -> Result<TextureHandle, ResourceError> {
        descriptor.validate()?;
        let format: wgpu::TextureFormat = descriptor.format.into_wgpu().ok_or_else(|| {
            ResourceError::InvalidDescriptor("texture format is unknown".to_string())
        })?;
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{}x{} texture has no pixels",
                descriptor.width, descriptor.height
            )));
        }

        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device()?.create_texture(&wgpu::TextureDescriptor {
            label: Some("rune texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let data = texel_data(descriptor.format, descriptor.pixels);
        self.queue()?.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(descriptor.width * uploaded_bytes_per_pixel(descriptor.format)),
                rows_per_image: Some(descriptor.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(TextureHandle::from(self.textures.add(GpuTexture {
            view,
            _texture: texture,
        })))
    }

    fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), ResourceError> {
        self.textures
            .remove(handle.raw())
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }
}
