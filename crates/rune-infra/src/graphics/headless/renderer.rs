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
use std::rc::Rc;
use std::sync::Arc;

use rune_core::platform::RenderWindow;
use rune_core::renderer::{
    BackendSettings, BindingSlot, BufferHandle, BufferRange, GpuMirrors, GpuResources,
    MaterialDescriptor, MaterialFlags, MaterialHandle, MaterialInst, Mesh, MeshHandle,
    MeshTopology, MirrorSink, ObserverBridge, RenderError, RenderStats, RendererBackend,
    ResourceError, Submesh, TextureDescriptor, TextureFormat, TextureHandle, Vertex,
};

use super::resources::{CpuResources, LiveResources, ResourceCounters};
use crate::graphics::binding::{DrawCall, FrameBindings};

/// Counts of the mirrors a backend holds, by asset kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorCounts {
    /// Realized meshes.
    pub meshes: usize,
    /// Realized textures.
    pub textures: usize,
    /// Compiled programs across every shader.
    pub pipelines: usize,
    /// Material instances with uniform buffers.
    pub instances: usize,
}

struct HeadlessState {
    mirrors: GpuMirrors,
    gpu: CpuResources,
    bindings: FrameBindings,
    draws: Vec<DrawCall>,
    initialized: bool,
    in_frame: bool,
    frames: u64,
    target_size: (u32, u32),
}

impl MirrorSink for HeadlessState {
    fn mirror_parts(&mut self) -> (&mut GpuMirrors, &mut dyn GpuResources) {
        (&mut self.mirrors, &mut self.gpu)
    }
}

/// A [`RendererBackend`] that needs no device.
///
/// Resources are kept in CPU memory and draws are recorded instead of rasterized. Everything
/// the backend holds can be inspected, which is what tests and tools use it for.
pub struct HeadlessRenderer {
    settings: BackendSettings,
    state: Rc<RefCell<HeadlessState>>,
    bridge: Rc<ObserverBridge<HeadlessState>>,
}

impl HeadlessRenderer {
    /// Creates an uninitialized renderer.
    pub fn new() -> Self {
        let state = Rc::new(RefCell::new(HeadlessState {
            mirrors: GpuMirrors::new(),
            gpu: CpuResources::new(),
            bindings: FrameBindings::default(),
            draws: Vec::new(),
            initialized: false,
            in_frame: false,
            frames: 0,
            target_size: (1, 1),
        }));
        let bridge = ObserverBridge::install(&state, "HeadlessRenderer");
        Self {
            settings: BackendSettings::default(),
            state,
            bridge,
        }
    }

    /// Draws recorded in the current frame, or in the last finished one.
    pub fn draws(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }

    /// Number of frames ended so far.
    pub fn frames_presented(&self) -> u64 {
        self.state.borrow().frames
    }

    /// Size of the target draws are recorded for.
    pub fn target_size(&self) -> (u32, u32) {
        self.state.borrow().target_size
    }

    /// Resources currently alive.
    pub fn live_resources(&self) -> LiveResources {
        self.state.borrow().gpu.live()
    }

    /// Operation totals since creation.
    pub fn counters(&self) -> ResourceCounters {
        self.state.borrow().gpu.counters()
    }

    /// Mirrors currently held.
    pub fn mirror_counts(&self) -> MirrorCounts {
        let state = self.state.borrow();
        MirrorCounts {
            meshes: state.mirrors.mesh_count(),
            textures: state.mirrors.texture_count(),
            pipelines: state.mirrors.pipeline_count(),
            instances: state.mirrors.instance_count(),
        }
    }

    /// The mirror cache generation.
    pub fn generation(&self) -> u64 {
        self.state.borrow().mirrors.generation()
    }

    /// A copy of a buffer's contents.
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        self.state.borrow().gpu.buffer_bytes(handle).map(<[u8]>::to_vec)
    }

    /// A copy of a mesh's vertices and indices, with its topology.
    pub fn mesh_contents(
        &self,
        handle: MeshHandle,
    ) -> Option<(Vec<Vertex>, Vec<u16>, MeshTopology)> {
        let state = self.state.borrow();
        let mesh = state.gpu.meshes.get(handle.raw())?;
        Some((mesh.vertices.clone(), mesh.indices.clone(), mesh.topology))
    }

    /// Dimensions, format and pixels of a texture.
    pub fn texture_contents(
        &self,
        handle: TextureHandle,
    ) -> Option<(u32, u32, TextureFormat, Vec<u8>)> {
        let state = self.state.borrow();
        let texture = state.gpu.textures.get(handle.raw())?;
        Some((
            texture.width,
            texture.height,
            texture.format,
            texture.pixels.clone(),
        ))
    }

    /// Label and fixed-function state of a program, and how many bindings it declares.
    pub fn program_info(&self, handle: MaterialHandle) -> Option<(String, MaterialFlags, usize)> {
        let state = self.state.borrow();
        let program = state.gpu.programs.get(handle.raw())?;
        Some((
            program.label.clone(),
            program.flags,
            program.reflection.bindings().count(),
        ))
    }

    fn with_gpu<T>(&self, f: impl FnOnce(&mut CpuResources) -> T) -> T {
        f(&mut self.state.borrow_mut().gpu)
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeadlessRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessRenderer")
            .field("settings", &self.settings)
            .field("mirrors", &self.mirror_counts())
            .field("live", &self.live_resources())
            .finish()
    }
}

impl GpuResources for HeadlessRenderer {
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

impl RendererBackend for HeadlessRenderer {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    fn set_settings(&mut self, settings: BackendSettings) {
        self.settings = settings;
    }

    fn init(&mut self) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        if state.initialized {
            log::warn!("HeadlessRenderer: init called twice");
            return Ok(());
        }
        state.initialized = true;
        log::info!("HeadlessRenderer: initialized");
        Ok(())
    }

    fn cleanup(&mut self) {
        self.bridge.flush();
        let mut state = self.state.borrow_mut();
        let HeadlessState {
            mirrors,
            gpu,
            bindings,
            ..
        } = &mut *state;
        mirrors.release_all(gpu);
        bindings.forget();
        let leaked = gpu.clear();
        if leaked > 0 {
            log::warn!("HeadlessRenderer: {leaked} resources were still alive at cleanup");
        }
        state.draws.clear();
        state.in_frame = false;
        state.initialized = false;
        log::info!("HeadlessRenderer: cleaned up");
    }

    fn set_window(&mut self, window: Option<Arc<dyn RenderWindow>>) -> Result<(), RenderError> {
        let mut state = self.state.borrow_mut();
        match window {
            Some(window) => {
                let (width, height) = window.inner_size();
                state.target_size = (width.max(1), height.max(1));
                log::info!(
                    "HeadlessRenderer: recording for window {} ({width}x{height})",
                    window.id()
                );
            }
            None => {
                state.target_size = (1, 1);
                log::info!("HeadlessRenderer: recording offscreen");
            }
        }
        Ok(())
    }

    fn on_framebuffer_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("HeadlessRenderer: ignoring resize to zero dimensions {width}x{height}");
            return;
        }
        self.state.borrow_mut().target_size = (width, height);
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.bridge.flush();
        let mut state = self.state.borrow_mut();
        if !state.initialized {
            return Err(RenderError::NotInitialized);
        }
        let frame = state.frames + 1;
        state.bindings.begin(frame);
        state.draws.clear();
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
        log::trace!(
            "HeadlessRenderer: frame {} recorded {} draws",
            state.frames,
            state.draws.len()
        );
        Ok(())
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
        let HeadlessState {
            mirrors,
            gpu,
            bindings,
            ..
        } = &mut *state;
        bindings.bind_material(mirrors, gpu, instance).map(|_| ())
    }

    fn bind_mesh(&mut self, mesh: &Rc<Mesh>) -> Result<(), ResourceError> {
        let mut state = self.state.borrow_mut();
        let HeadlessState {
            mirrors,
            gpu,
            bindings,
            ..
        } = &mut *state;
        bindings.bind_mesh(mirrors, gpu, mesh).map(|_| ())
    }

    fn draw(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(call) = state.bindings.draw(None) {
            state.bindings.count_draw(&call);
            state.draws.push(call);
        }
    }

    fn draw_submesh(&mut self, submesh: Submesh) {
        let mut state = self.state.borrow_mut();
        if let Some(call) = state.bindings.draw(Some(submesh)) {
            state.bindings.count_draw(&call);
            state.draws.push(call);
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use rune_core::renderer::{Material, Shader, Texture};

    const LIT: &str = r#"
struct MaterialBlock {
    tint: vec4<f32>,
    shininess: f32,
}

@group(0) @binding(2) var<uniform> u_material: MaterialBlock;
@group(0) @binding(3) var t_diffuse: texture_2d<f32>;
@group(0) @binding(4) var s_diffuse: sampler;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(t_diffuse, s_diffuse, vec2<f32>(0.5)) * u_material.tint;
}
"#;

    fn started() -> HeadlessRenderer {
        let mut renderer = HeadlessRenderer::new();
        renderer.init().unwrap();
        renderer
    }

    fn triangle() -> Rc<Mesh> {
        Mesh::with_geometry(
            vec![Vertex::default(); 3],
            vec![0, 1, 2],
            MeshTopology::Triangles,
        )
    }

    #[test]
    fn test_frame_requires_init() {
        let mut renderer = HeadlessRenderer::new();
        assert!(matches!(
            renderer.begin_frame(),
            Err(RenderError::NotInitialized)
        ));
        renderer.init().unwrap();
        renderer.begin_frame().unwrap();
        renderer.end_frame().unwrap();
        assert_eq!(renderer.frames_presented(), 1);
    }

    #[test]
    fn test_draw_records_resolved_bindings() {
        let mut renderer = started();
        let shader = Shader::from_wgsl("lit", LIT);
        let material = Material::with_shader("lit", &shader);
        material.set_flags(MaterialFlags::DEPTH_TEST);
        let instance = material.create_instance();
        let pixels = [255u8; 4];
        let texture = Texture::new(1, 1, TextureFormat::Rgba, pixels.to_vec()).unwrap();
        assert!(instance.set_texture("t_diffuse", &texture));
        let mesh = triangle();

        renderer.begin_frame().unwrap();
        renderer.bind_material(&instance).unwrap();
        renderer.bind_mesh(&mesh).unwrap();
        renderer.draw();
        renderer.end_frame().unwrap();

        let draws = renderer.draws();
        assert_eq!(draws.len(), 1);
        let call = &draws[0];
        assert_eq!(call.index_count, 3);
        assert_eq!(call.flags, MaterialFlags::DEPTH_TEST);
        assert!(call.uniform(BindingSlot::new(0, 2)).is_some());
        assert!(matches!(
            call.textures.as_slice(),
            [(slot, Some(_))] if *slot == BindingSlot::new(0, 3)
        ));
        assert_eq!(call.samplers, vec![BindingSlot::new(0, 4)]);
        assert_eq!(renderer.frame_stats().triangles, 1);
        assert_eq!(
            renderer.mirror_counts(),
            MirrorCounts {
                meshes: 1,
                textures: 1,
                pipelines: 1,
                instances: 1,
            }
        );
    }

    #[test]
    fn test_empty_geometry_is_not_counted() {
        let mut renderer = started();
        let shader = Shader::from_wgsl("lit", LIT);
        let material = Material::with_shader("lit", &shader);
        let empty = Mesh::new();

        renderer.begin_frame().unwrap();
        renderer.bind_material(&material.default_instance()).unwrap();
        renderer.bind_mesh(&empty).unwrap();
        renderer.draw();
        renderer.draw_submesh(Submesh::new(10, 3));
        renderer.end_frame().unwrap();

        assert!(renderer.draws().is_empty());
        assert_eq!(renderer.frame_stats().draw_calls, 0);
        assert_eq!(renderer.mirror_counts().meshes, 1);
    }

    #[test]
    fn test_submesh_range_is_clamped() {
        let mut renderer = started();
        let shader = Shader::from_wgsl("lit", LIT);
        let material = Material::with_shader("lit", &shader);
        let quad = Mesh::with_geometry(
            vec![Vertex::default(); 4],
            vec![0, 1, 2, 2, 1, 3],
            MeshTopology::Triangles,
        );

        renderer.begin_frame().unwrap();
        renderer.bind_material(&material.default_instance()).unwrap();
        renderer.bind_mesh(&quad).unwrap();
        renderer.draw_submesh(Submesh::new(3, 30));
        renderer.end_frame().unwrap();

        let draws = renderer.draws();
        assert_eq!((draws[0].first_index, draws[0].index_count), (3, 3));
    }

    #[test]
    #[should_panic(expected = "without a bound material")]
    fn test_draw_without_material_panics() {
        let mut renderer = started();
        renderer.begin_frame().unwrap();
        renderer.bind_mesh(&triangle()).unwrap();
        renderer.draw();
    }

    #[test]
    fn test_explicit_uniform_binding_overrides_material_block() {
        let mut renderer = started();
        let shader = Shader::from_wgsl("lit", LIT);
        let material = Material::with_shader("lit", &shader);
        let mesh = triangle();
        let scene = renderer.create_buffer(256, None).unwrap();

        renderer.begin_frame().unwrap();
        renderer.bind_material(&material.default_instance()).unwrap();
        renderer.bind_uniform_buffer_range(
            scene,
            BindingSlot::new(0, 0),
            Some(BufferRange::new(0, 192)),
        );
        renderer.bind_mesh(&mesh).unwrap();
        renderer.draw();
        renderer.end_frame().unwrap();

        let call = &renderer.draws()[0];
        assert_eq!(
            call.uniform(BindingSlot::new(0, 0)),
            Some((scene, Some(BufferRange::new(0, 192))))
        );
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let mut renderer = started();
        let shader = Shader::from_wgsl("lit", LIT);
        let material = Material::with_shader("lit", &shader);
        let instance = material.create_instance();
        let mesh = triangle();

        renderer.begin_frame().unwrap();
        renderer.bind_material(&instance).unwrap();
        renderer.bind_mesh(&mesh).unwrap();
        renderer.draw();
        renderer.end_frame().unwrap();
        assert!(renderer.live_resources().total() > 0);

        renderer.cleanup();
        assert_eq!(renderer.live_resources(), LiveResources::default());
        assert_eq!(mesh.observer_count(), 0);
        assert_eq!(instance.observer_count(), 0);
        assert_eq!(shader.observer_count(), 0);
    }
}
