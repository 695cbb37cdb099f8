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

//! The frame orchestrator.
//!
//! [`GraphicsSystem`] owns the active [`RendererBackend`], collects the renderables of a frame
//! into draw buckets and replays them in sorted order. Every renderable gets its own slot in a
//! dynamic scene uniform buffer, so upload order never has to match draw order.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Vec3};

use crate::asset::Asset;
use crate::platform::window::RenderWindow;
use crate::renderer::api::core::{GraphicsConfig, RenderStats};
use crate::renderer::api::handle::BufferHandle;
use crate::renderer::api::material_inst::MaterialInst;
use crate::renderer::api::scene::{
    Light, LightingUniforms, Mesh, SceneLighting, SceneUniforms, Submesh, LIGHTING_UNIFORM_SLOT,
    SCENE_UNIFORM_SLOT,
};
use crate::renderer::api::util::{
    DynamicUniformBuffer, MaterialFlags, RenderingApi, MIN_UNIFORM_ALIGNMENT,
};
use crate::renderer::draw_bucket::{make_entry, BucketKind, DrawBucket, Ordinals};
use crate::renderer::error::RenderError;
use crate::renderer::traits::RendererBackend;

/// Builds a fresh, uninitialized backend.
pub type RendererFactory = Box<dyn Fn() -> Box<dyn RendererBackend>>;

struct ActiveBackend {
    renderer: Box<dyn RendererBackend>,
    lighting_buffer: BufferHandle,
    scene_uniforms: DynamicUniformBuffer,
}

/// Drives a rendering backend frame by frame.
pub struct GraphicsSystem {
    config: GraphicsConfig,
    factories: HashMap<RenderingApi, RendererFactory>,
    api: RenderingApi,
    active: Option<ActiveBackend>,
    window: Option<Arc<dyn RenderWindow>>,
    projection: Mat4,
    view: Mat4,
    lighting: LightingUniforms,
    shadow: DrawBucket,
    geometry: DrawBucket,
    material_ordinals: Ordinals,
    mesh_ordinals: Ordinals,
    culled: u32,
    frame_number: u64,
}

impl GraphicsSystem {
    /// Creates a system with no backend. Register factories, then call
    /// [`set_rendering_api`](Self::set_rendering_api).
    pub fn new(config: GraphicsConfig) -> Self {
        let config = config.sanitized();
        let lighting = LightingUniforms::new(&SceneLighting {
            view_position: Vec3::ZERO,
            ambient: Vec3::from(config.ambient_light),
        });
        Self {
            config,
            factories: HashMap::new(),
            api: RenderingApi::None,
            active: None,
            window: None,
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            lighting,
            shadow: DrawBucket::new(),
            geometry: DrawBucket::new(),
            material_ordinals: Ordinals::default(),
            mesh_ordinals: Ordinals::default(),
            culled: 0,
            frame_number: 0,
        }
    }

    /// The configuration the system was created with.
    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Registers the factory used when `api` is selected. Replaces any previous one.
    pub fn register_renderer_factory(&mut self, api: RenderingApi, factory: RendererFactory) {
        log::debug!("GraphicsSystem: registered renderer factory for '{api}'");
        self.factories.insert(api, factory);
    }

    /// The API of the active backend, or `RenderingApi::None`.
    pub fn rendering_api(&self) -> RenderingApi {
        self.api
    }

    /// Switches to `api`, tearing down the active backend first.
    ///
    /// Selecting the active API again does nothing. `RenderingApi::None` leaves the system
    /// without a backend.
    ///
    /// ## Errors
    /// * `RenderError::NoFactory` - If no factory is registered for `api`.
    /// * Any error raised while initializing the new backend. The system is left without a
    ///   backend in that case.
    pub fn set_rendering_api(&mut self, api: RenderingApi) -> Result<(), RenderError> {
        if api == self.api && (self.active.is_some() || api == RenderingApi::None) {
            return Ok(());
        }

        self.teardown_backend();
        if api == RenderingApi::None {
            return Ok(());
        }

        let Some(factory) = self.factories.get(&api) else {
            log::error!("GraphicsSystem: no renderer factory registered for '{api}'");
            return Err(RenderError::NoFactory(api.to_string()));
        };

        let mut renderer = factory();
        renderer.set_settings(self.config.backend_settings());
        match self.start_backend(renderer.as_mut()) {
            Ok((lighting_buffer, scene_uniforms)) => {
                log::info!("GraphicsSystem: rendering with '{}'", renderer.name());
                self.active = Some(ActiveBackend {
                    renderer,
                    lighting_buffer,
                    scene_uniforms,
                });
                self.api = api;
                Ok(())
            }
            Err(e) => {
                log::error!("GraphicsSystem: backend '{}' failed to start: {e}", renderer.name());
                renderer.cleanup();
                Err(e)
            }
        }
    }

    fn start_backend(
        &self,
        renderer: &mut dyn RendererBackend,
    ) -> Result<(BufferHandle, DynamicUniformBuffer), RenderError> {
        renderer.init()?;
        if let Some(window) = &self.window {
            renderer.set_window(Some(window.clone()))?;
        }
        let lighting_buffer = renderer.create_buffer(
            std::mem::size_of::<LightingUniforms>(),
            Some(bytemuck::bytes_of(&self.lighting)),
        )?;
        let scene_uniforms = DynamicUniformBuffer::new(
            renderer,
            std::mem::size_of::<SceneUniforms>(),
            self.config.scene_uniform_capacity,
            MIN_UNIFORM_ALIGNMENT,
            "scene",
        )?;
        Ok((lighting_buffer, scene_uniforms))
    }

    fn teardown_backend(&mut self) {
        self.clear_frame();
        if let Some(mut active) = self.active.take() {
            let renderer = active.renderer.as_mut();
            active.scene_uniforms.destroy(renderer);
            if let Err(e) = renderer.destroy_buffer(active.lighting_buffer) {
                log::warn!("GraphicsSystem: Failed to destroy lighting buffer: {e}");
            }
            renderer.cleanup();
            log::info!("GraphicsSystem: backend '{}' shut down", renderer.name());
        }
        self.api = RenderingApi::None;
    }

    /// The active backend.
    pub fn backend(&self) -> Option<&dyn RendererBackend> {
        self.active.as_ref().map(|a| a.renderer.as_ref())
    }

    /// The active backend, mutably.
    pub fn backend_mut(&mut self) -> Option<&mut dyn RendererBackend> {
        match &mut self.active {
            Some(active) => Some(active.renderer.as_mut()),
            None => None,
        }
    }

    /// Sets the window presented to, now and for every backend selected later.
    pub fn set_window(&mut self, window: Option<Arc<dyn RenderWindow>>) -> Result<(), RenderError> {
        self.window = window.clone();
        match &mut self.active {
            Some(active) => active.renderer.set_window(window),
            None => Ok(()),
        }
    }

    /// Forwards a framebuffer resize to the active backend.
    pub fn on_framebuffer_size(&mut self, width: u32, height: u32) {
        if let Some(active) = &mut self.active {
            active.renderer.on_framebuffer_size(width, height);
        }
    }

    /// Starts collecting a frame seen through `projection` and `view`.
    pub fn begin_scene(&mut self, projection: Mat4, view: Mat4, lighting: &SceneLighting) {
        self.projection = projection;
        self.view = view;
        self.lighting.set_scene(lighting);
    }

    /// Adds a light to the current frame.
    ///
    /// ## Returns
    /// `false` if the frame already holds `max_lights` lights. The light is dropped.
    pub fn add_light(&mut self, light: &Light) -> bool {
        let accepted = self.lighting.push(light, self.config.max_lights);
        if !accepted {
            log::debug!(
                "GraphicsSystem: light dropped, the frame already has {} lights",
                self.config.max_lights
            );
        }
        accepted
    }

    /// Number of lights collected for the current frame.
    pub fn light_count(&self) -> usize {
        self.lighting.light_count.max(0) as usize
    }

    /// Queues `mesh` drawn with `instance` at `world` for the current frame.
    pub fn add_renderable(&mut self, world: Mat4, mesh: &Rc<Mesh>, instance: &Rc<MaterialInst>) {
        self.push_renderable(world, mesh, instance, None);
    }

    /// Queues one index range of `mesh`.
    pub fn add_renderable_submesh(
        &mut self,
        world: Mat4,
        mesh: &Rc<Mesh>,
        instance: &Rc<MaterialInst>,
        submesh: Submesh,
    ) {
        self.push_renderable(world, mesh, instance, Some(submesh));
    }

    fn push_renderable(
        &mut self,
        world: Mat4,
        mesh: &Rc<Mesh>,
        instance: &Rc<MaterialInst>,
        submesh: Option<Submesh>,
    ) {
        if self.is_culled(&world, mesh) {
            self.culled += 1;
            return;
        }
        let entry = make_entry(
            &mut self.material_ordinals,
            &mut self.mesh_ordinals,
            world,
            mesh,
            instance,
            submesh,
        );
        if !instance.flags().contains(MaterialFlags::TRANSPARENT) {
            self.shadow.push(entry.clone());
        }
        self.geometry.push(entry);
    }

    // Frustum culling hook. Everything is visible for now.
    fn is_culled(&self, _world: &Mat4, _mesh: &Mesh) -> bool {
        false
    }

    /// Number of draws queued in `bucket` for the current frame.
    pub fn pending(&self, bucket: BucketKind) -> usize {
        match bucket {
            BucketKind::Shadow => self.shadow.len(),
            BucketKind::Geometry => self.geometry.len(),
        }
    }

    /// Renders the collected frame and starts a new, empty one.
    ///
    /// Draws whose material or mesh cannot be realized are skipped and counted in
    /// [`RenderStats::skipped`].
    ///
    /// ## Errors
    /// * `RenderError::NotInitialized` - If no backend is active.
    /// * Any error raised by the backend while starting or submitting the frame.
    pub fn render(&mut self) -> Result<RenderStats, RenderError> {
        let start = Instant::now();
        let Some(active) = self.active.as_mut() else {
            self.clear_frame();
            return Err(RenderError::NotInitialized);
        };

        let camera = SceneUniforms {
            projection: self.projection,
            view: self.view,
            world: Mat4::IDENTITY,
        };
        self.geometry.sort();
        let frame = draw_frame(active, &self.lighting, camera, &self.geometry);

        let backend_stats = active.renderer.frame_stats();
        let culled = self.culled;
        self.clear_frame();
        let skipped = frame?;

        self.frame_number += 1;
        let stats = RenderStats {
            frame_number: self.frame_number,
            culled,
            skipped: backend_stats.skipped + skipped,
            cpu_frame_time_ms: start.elapsed().as_secs_f32() * 1000.0,
            ..backend_stats
        };
        log::trace!(
            "GraphicsSystem: frame {} drew {} calls ({} triangles, {} skipped)",
            stats.frame_number,
            stats.draw_calls,
            stats.triangles,
            stats.skipped
        );
        Ok(stats)
    }

    // Submitted draw state never outlives its frame.
    fn clear_frame(&mut self) {
        self.shadow.clear();
        self.geometry.clear();
        self.material_ordinals.clear();
        self.mesh_ordinals.clear();
        self.lighting.clear_lights();
        self.culled = 0;
    }

    /// Releases the active backend and every GPU resource it holds.
    pub fn shutdown(&mut self) {
        self.teardown_backend();
    }
}

// Replays one sorted bucket. Returns the number of skipped draws.
fn draw_frame(
    active: &mut ActiveBackend,
    lighting: &LightingUniforms,
    camera: SceneUniforms,
    bucket: &DrawBucket,
) -> Result<u32, RenderError> {
    let ActiveBackend {
        renderer,
        lighting_buffer,
        scene_uniforms,
    } = active;
    let renderer = renderer.as_mut();

    renderer.update_buffer(*lighting_buffer, 0, bytemuck::bytes_of(lighting))?;
    scene_uniforms.reset();
    renderer.begin_frame()?;

    let mut skipped = 0;
    for entry in bucket.entries() {
        if entry.instance.is_released() {
            log::debug!(
                "GraphicsSystem: skipping draw with released instance {}",
                entry.instance.id()
            );
            skipped += 1;
            continue;
        }
        if entry.instance.shader().is_none() {
            log::debug!(
                "GraphicsSystem: skipping draw, the shader of instance {} is gone",
                entry.instance.id()
            );
            skipped += 1;
            continue;
        }
        if let Err(e) = renderer.bind_material(&entry.instance) {
            log::warn!("GraphicsSystem: skipping draw, material bind failed: {e}");
            skipped += 1;
            continue;
        }

        let uniforms = SceneUniforms {
            world: entry.world,
            ..camera
        };
        let (buffer, range) = match scene_uniforms.push(renderer, bytemuck::bytes_of(&uniforms)) {
            Ok(slot) => slot,
            Err(e) => {
                log::warn!("GraphicsSystem: skipping draw, scene upload failed: {e}");
                skipped += 1;
                continue;
            }
        };
        renderer.bind_uniform_buffer_range(buffer, SCENE_UNIFORM_SLOT, Some(range));
        renderer.bind_uniform_buffer(*lighting_buffer, LIGHTING_UNIFORM_SLOT);

        if let Err(e) = renderer.bind_mesh(&entry.mesh) {
            log::warn!("GraphicsSystem: skipping draw, mesh bind failed: {e}");
            skipped += 1;
            continue;
        }
        match entry.submesh {
            Some(submesh) => renderer.draw_submesh(submesh),
            None => renderer.draw(),
        }
    }

    renderer.end_frame()?;
    Ok(skipped)
}

impl Drop for GraphicsSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GraphicsSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsSystem")
            .field("api", &self.api)
            .field("factories", &self.factories.len())
            .field("pending", &self.geometry.len())
            .field("frame_number", &self.frame_number)
            .finish()
    }
}
