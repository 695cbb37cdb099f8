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

use std::any::Any;
use std::cell::RefCell;
use std::num::NonZeroU64;
use std::rc::Rc;
use std::sync::Arc;

use rune_core::platform::RenderWindow;
use rune_core::renderer::{
    BackendSettings, BindingKind, BindingSlot, BufferHandle, BufferRange, GpuMirrors,
    GpuResources, MaterialDescriptor, MaterialHandle, MaterialInst, Mesh, MeshHandle,
    MeshTopology, MirrorSink, ObserverBridge, RenderError, RenderStats, RendererBackend,
    RendererDeviceType, ResourceError, Submesh, TextureDescriptor, TextureHandle, Vertex,
};

use super::backend::device_type;
use super::context::{AcquireError, PresentTarget, WgpuGraphicsContext, OFFSCREEN_FORMAT};
use super::conversions::IntoWgpu;
use super::resources::WgpuResources;
use crate::graphics::binding::{DrawCall, FrameBindings};

/// Bindings used when a material leaves a slot empty.
struct Fallbacks {
    texture: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl Fallbacks {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let size = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rune white texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[u8::MAX; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            size,
        );
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("rune sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        Self {
            texture: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            sampler,
        }
    }
}

/// A draw whose every `wgpu` object has been resolved.
struct RecordedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    first_index: u32,
    index_count: u32,
}

struct WgpuState {
    mirrors: GpuMirrors,
    gpu: WgpuResources,
    bindings: FrameBindings,
    context: Option<WgpuGraphicsContext>,
    target: Option<PresentTarget>,
    fallbacks: Option<Fallbacks>,
    window: Option<Arc<dyn RenderWindow>>,
    recorded: Vec<RecordedDraw>,
    clear_color: [f32; 4],
    vsync: bool,
    in_frame: bool,
    frames: u64,
}

impl MirrorSink for WgpuState {
    fn mirror_parts(&mut self) -> (&mut GpuMirrors, &mut dyn GpuResources) {
        (&mut self.mirrors, &mut self.gpu)
    }
}

impl WgpuState {
    /// Makes `target` current. Programs built for another color format are released and
    /// rebuilt on their next bind.
    fn install_target(&mut self, target: PresentTarget) {
        let format = target.format();
        if format != self.gpu.color_format {
            log::info!(
                "WgpuRenderer: color format changed from {:?} to {format:?}, releasing mirrors",
                self.gpu.color_format
            );
            self.mirrors.release_all(&mut self.gpu);
            self.bindings.forget();
            self.gpu.color_format = format;
        }
        self.target = Some(target);
    }

    fn create_target(
        &self,
        window: Option<&Arc<dyn RenderWindow>>,
    ) -> Result<PresentTarget, RenderError> {
        let context = self.context.as_ref().ok_or(RenderError::NotInitialized)?;
        match window {
            Some(window) => PresentTarget::for_window(
                context,
                window.clone_handle_arc(),
                window.inner_size(),
                self.vsync,
            )
            .map_err(|e| RenderError::InitializationFailed(format!("{e:#}"))),
            None => Ok(PresentTarget::offscreen(&context.device, (1, 1))),
        }
    }

    /// Resolves the bind groups of `call` and queues it for the frame.
    ///
    /// Returns `false`, queueing nothing, if a slot the program declares has nothing bound.
    fn record(&mut self, call: &DrawCall) -> bool {
        let (Some(context), Some(fallbacks)) = (&self.context, &self.fallbacks) else {
            return false;
        };
        let device = &context.device;
        let color_format = self.gpu.color_format;
        let Some(program) = self.gpu.programs.get_mut(call.material.raw()) else {
            log::error!("WgpuRenderer: material {:?} has no program", call.material);
            return false;
        };
        let pipeline = program.pipeline(device, color_format, call.topology);
        let Some(program) = self.gpu.programs.get(call.material.raw()) else {
            return false;
        };

        let Some(mesh) = self.gpu.meshes.get(call.mesh.raw()) else {
            log::error!("WgpuRenderer: mesh {:?} was destroyed while bound", call.mesh);
            return false;
        };
        let (Some(vertices), Some(indices)) = (&mesh.vertices, &mesh.indices) else {
            return false;
        };

        let mut bind_groups = Vec::with_capacity(program.groups.len());
        for (set, (layout, bindings)) in program.groups.iter().enumerate() {
            let mut entries = Vec::with_capacity(bindings.len());
            for &(binding, kind) in bindings {
                let slot = BindingSlot::new(set as u32, binding);
                let resource = match kind {
                    BindingKind::UniformBuffer => {
                        let Some((handle, range)) = call.uniform(slot) else {
                            log::warn!(
                                "WgpuRenderer: uniform slot {slot:?} of '{}' is not bound, skipping draw",
                                program.label
                            );
                            return false;
                        };
                        let Some(buffer) = self.gpu.buffers.get(handle.raw()) else {
                            log::warn!(
                                "WgpuRenderer: uniform buffer {handle:?} is gone, skipping draw"
                            );
                            return false;
                        };
                        match range.and_then(|r| Some((r.offset, NonZeroU64::new(r.size as u64)?))) {
                            Some((offset, size)) => {
                                wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                    buffer: &buffer.buffer,
                                    offset: offset as u64,
                                    size: Some(size),
                                })
                            }
                            None => buffer.buffer.as_entire_binding(),
                        }
                    }
                    BindingKind::Texture => {
                        let view = call
                            .textures
                            .iter()
                            .find(|(s, _)| *s == slot)
                            .and_then(|(_, handle)| *handle)
                            .and_then(|handle| self.gpu.textures.get(handle.raw()))
                            .map_or(&fallbacks.texture, |texture| &texture.view);
                        wgpu::BindingResource::TextureView(view)
                    }
                    BindingKind::Sampler => wgpu::BindingResource::Sampler(&fallbacks.sampler),
                    BindingKind::None => continue,
                };
                entries.push(wgpu::BindGroupEntry { binding, resource });
            }
            bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&program.label),
                layout,
                entries: &entries,
            }));
        }

        self.recorded.push(RecordedDraw {
            pipeline,
            bind_groups,
            vertices: vertices.clone(),
            indices: indices.clone(),
            first_index: call.first_index,
            index_count: call.index_count,
        });
        true
    }

    fn draw(&mut self, submesh: Option<Submesh>) {
        let Some(call) = self.bindings.draw(submesh) else {
            return;
        };
        if self.record(&call) {
            self.bindings.count_draw(&call);
        } else {
            self.bindings.count_skipped();
        }
    }

    fn submit(&mut self) -> Result<(), RenderError> {
        let recorded = std::mem::take(&mut self.recorded);
        let (Some(context), Some(target)) = (&self.context, &mut self.target) else {
            return Err(RenderError::NotInitialized);
        };
        let frame = match target.acquire(&context.device) {
            Ok(frame) => frame,
            Err(AcquireError::Skip) => return Ok(()),
            Err(AcquireError::Fatal(reason)) => {
                return Err(RenderError::SurfaceAcquisitionFailed(reason))
            }
        };

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rune frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rune forward pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color.into_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: target.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            for draw in &recorded {
                pass.set_pipeline(&draw.pipeline);
                for (index, group) in draw.bind_groups.iter().enumerate() {
                    pass.set_bind_group(index as u32, group, &[]);
                }
                pass.set_vertex_buffer(0, draw.vertices.slice(..));
                pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(
                    draw.first_index..draw.first_index + draw.index_count,
                    0,
                    0..1,
                );
            }
        }
        context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

/// A [`RendererBackend`] rendering through `wgpu`.
///
/// Draws are recorded during the frame and replayed into a single forward pass with a depth
/// buffer at `end_frame`. Without a window the pass targets an offscreen texture.
pub struct WgpuRenderer {
    settings: BackendSettings,
    state: Rc<RefCell<WgpuState>>,
    bridge: Rc<ObserverBridge<WgpuState>>,
}

impl WgpuRenderer {
    /// Creates an uninitialized renderer.
    pub fn new() -> Self {
        let settings = BackendSettings::default();
        let state = Rc::new(RefCell::new(WgpuState {
            mirrors: GpuMirrors::new(),
            gpu: WgpuResources::new(OFFSCREEN_FORMAT),
            bindings: FrameBindings::default(),
            context: None,
            target: None,
            fallbacks: None,
            window: None,
            recorded: Vec::new(),
            clear_color: settings.clear_color,
            vsync: settings.vsync,
            in_frame: false,
            frames: 0,
        }));
        let bridge = ObserverBridge::install(&state, "WgpuRenderer");
        Self {
            settings,
            state,
            bridge,
        }
    }

    /// Name and type of the adapter in use.
    pub fn adapter_info(&self) -> Option<(String, RendererDeviceType)> {
        let state = self.state.borrow();
        let context = state.context.as_ref()?;
        Some((
            context.adapter_name.clone(),
            device_type(context.adapter_device_type),
        ))
    }

    /// Size of the current color target.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.state.borrow().target.as_ref().map(PresentTarget::size)
    }

    fn with_gpu<T>(&self, f: impl FnOnce(&mut WgpuResources) -> T) -> T {
        f(&mut self.state.borrow_mut().gpu)
    }
}

impl Default for WgpuRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WgpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuRenderer")
            .field("settings", &self.settings)
            .field("adapter", &self.adapter_info())
            .finish()
    }
}

impl GpuResources for WgpuRenderer {
    fn create_buffer(
        &mut self,
        size: usize,
        data: Option<&[u8]>,
    ) -> Result<BufferHandle, ResourceError> {
        self.with_gpu(|gpu| gpu.create_buffer(size, data))
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), ResourceError> {
        self.with_gpu(|gpu| gpu.destroy_buffer(handle))
    }

    fn update_buffer(
        &mut self,
        handle: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        self.with_gpu(|gpu| gpu.update_buffer(handle, offset, data))
    }

    fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u16],
        topology: MeshTopology,
    ) -> Result<MeshHandle, ResourceError> {
        self.with_gpu(|gpu| gpu.create_mesh(vertices, indices, topology))
    }

    fn destroy_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError> {
        self.with_gpu(|gpu| gpu.destroy_mesh(handle))
    }

    fn update_mesh_vertices(
        &mut self,
        handle: MeshHandle,
        vertices: &[Vertex],
    ) -> Result<(), ResourceError> {
        self.with_gpu(|gpu| gpu.update_mesh_vertices(handle, vertices))
    }

    fn update_mesh_indices(
        &mut self,
        handle: MeshHandle,
        indices: &[u16],
    ) -> Result<(), ResourceError> {
        self.with_gpu(|gpu| gpu.update_mesh_indices(handle, indices))
    }

    fn create_material(
        &mut self,
        descriptor: &MaterialDescriptor<'_>,
    ) -> Result<MaterialHandle, ResourceError> {
        self.with_gpu(|gpu| gpu.create_material(descriptor))
    }

    fn destroy_material(&mut self, handle: MaterialHandle) -> Result<(), ResourceError> {
        self.with_gpu(|gpu| gpu.destroy_material(handle))
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor<'_>,
    ) -> Result<TextureHandle, ResourceError> {
        self.with_gpu(|gpu| gpu.create_texture(descriptor))
    }

    fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), ResourceError> {
        self.with_gpu(|gpu| gpu.destroy_texture(handle))
    }
}

impl RendererBackend for WgpuRenderer {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    fn set_settings(&mut self, settings: BackendSettings) {
        let mut state = self.state.borrow_mut();
        state.clear_color = settings.clear_color;
        state.vsync = settings.vsync;
        self.settings = settings;
    }

    fn init(&mut self) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        if state.context.is_some() {
            log::warn!("WgpuRenderer: init called twice");
            return Ok(());
        }
        let context = pollster::block_on(WgpuGraphicsContext::new())
            .map_err(|e| RenderError::InitializationFailed(format!("{e:#}")))?;
        state.gpu.attach(context.device.clone(), context.queue.clone());
        state.fallbacks = Some(Fallbacks::new(&context.device, &context.queue));
        state.context = Some(context);

        let window = state.window.clone();
        let target = state.create_target(window.as_ref())?;
        state.install_target(target);
        log::info!("WgpuRenderer: initialized");
        Ok(())
    }

    fn cleanup(&mut self) {
        self.bridge.flush();
        let mut state = self.state.borrow_mut();
        let WgpuState {
            mirrors,
            gpu,
            bindings,
            ..
        } = &mut *state;
        mirrors.release_all(gpu);
        bindings.forget();
        let leaked = gpu.detach();
        if leaked > 0 {
            log::warn!("WgpuRenderer: {leaked} resources were still alive at cleanup");
        }
        state.recorded.clear();
        state.fallbacks = None;
        state.target = None;
        state.context = None;
        state.in_frame = false;
        log::info!("WgpuRenderer: cleaned up");
    }

    fn set_window(&mut self, window: Option<Arc<dyn RenderWindow>>) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        state.window = window.clone();
        if state.context.is_none() {
            return Ok(());
        }
        let target = state.create_target(window.as_ref())?;
        state.install_target(target);
        Ok(())
    }

    fn on_framebuffer_size(&mut self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        let WgpuState {
            context, target, ..
        } = &mut *state;
        if let (Some(context), Some(target)) = (context.as_ref(), target.as_mut()) {
            target.resize(&context.device, width, height);
        }
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.bridge.flush();
        let mut state = self.state.borrow_mut();
        if state.context.is_none() {
            return Err(RenderError::NotInitialized);
        }
        let frame = state.frames + 1;
        state.bindings.begin(frame);
        state.recorded.clear();
        state.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        if !state.in_frame {
            return Err(RenderError::RenderingFailed(
                "end_frame without begin_frame".to_string(),
            ));
        }
        state.in_frame = false;
        state.frames += 1;
        state.submit()
    }

    fn bind_uniform_buffer_range(
        &mut self,
        handle: BufferHandle,
        slot: BindingSlot,
        range: Option<BufferRange>,
    ) {
        self.state
            .borrow_mut()
            .bindings
            .bind_uniform(handle, slot, range);
    }

    fn bind_material(&mut self, instance: &Rc<MaterialInst>) -> Result<(), ResourceError> {
        let mut state = self.state.borrow_mut();
        let WgpuState {
            mirrors,
            gpu,
            bindings,
            ..
        } = &mut *state;
        bindings.bind_material(mirrors, gpu, instance).map(|_| ())
    }

    fn bind_mesh(&mut self, mesh: &Rc<Mesh>) -> Result<(), ResourceError> {
        let mut state = self.state.borrow_mut();
        let WgpuState {
            mirrors,
            gpu,
            bindings,
            ..
        } = &mut *state;
        bindings.bind_mesh(mirrors, gpu, mesh).map(|_| ())
    }

    fn draw(&mut self) {
        self.state.borrow_mut().draw(None);
    }

    fn draw_submesh(&mut self, submesh: Submesh) {
        self.state.borrow_mut().draw(Some(submesh));
    }

    fn frame_stats(&self) -> RenderStats {
        self.state.borrow().bindings.stats()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
