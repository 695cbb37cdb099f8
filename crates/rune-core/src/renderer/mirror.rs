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

//! Backend mirrors of CPU assets.
//!
//! [`GpuMirrors`] maps every realized asset to the backend handles created for it and keeps
//! them in sync with the asset's notifications. Backends own one, store it next to their
//! [`GpuResources`] implementation in an `Rc<RefCell<_>>`, and install an [`ObserverBridge`]
//! that forwards asset events into it.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use crate::asset::{Asset, AssetId};
use crate::renderer::api::handle::{
    BindingSlot, BufferHandle, MaterialHandle, MeshHandle, TextureHandle,
};
use crate::renderer::api::material_inst::MaterialInst;
use crate::renderer::api::scene::Mesh;
use crate::renderer::api::shader::Shader;
use crate::renderer::api::texture::Texture;
use crate::renderer::api::util::{MaterialFlags, MeshTopology};
use crate::renderer::error::ResourceError;
use crate::renderer::observer::{
    MaterialInstObserver, MeshObserver, ShaderObserver, TextureObserver,
};
use crate::renderer::traits::{GpuResources, MaterialDescriptor};

/// A realized mesh.
#[derive(Debug, Clone)]
pub struct MeshMirror {
    /// Backend handle of the vertex and index buffers.
    pub handle: MeshHandle,
    /// Number of indices uploaded.
    pub index_count: u32,
    /// How the indices are assembled.
    pub topology: MeshTopology,
    asset: Weak<Mesh>,
}

/// Everything a backend binds for one material instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMaterial {
    /// The program for the instance's shader and flags.
    pub material: MaterialHandle,
    /// Fixed-function state.
    pub flags: MaterialFlags,
    /// The instance's uniform buffers.
    pub uniform_buffers: Vec<(BindingSlot, BufferHandle)>,
    /// Texture slots. `None` means nothing is bound and the backend's default applies.
    pub textures: Vec<(BindingSlot, Option<TextureHandle>)>,
    /// Sampler bindings. Backends bind their default sampler.
    pub samplers: Vec<BindingSlot>,
}

#[derive(Debug)]
struct TextureMirror {
    handle: TextureHandle,
    asset: Weak<Texture>,
}

#[derive(Debug)]
struct ShaderMirror {
    asset: Weak<Shader>,
    pipelines: HashMap<MaterialFlags, MaterialHandle>,
}

#[derive(Debug)]
struct InstanceMirror {
    asset: Weak<MaterialInst>,
    buffers: Vec<BufferHandle>,
}

/// The observer registrations a backend subscribes assets with.
#[derive(Clone)]
pub struct Subscribers {
    mesh: Weak<dyn MeshObserver>,
    texture: Weak<dyn TextureObserver>,
    shader: Weak<dyn ShaderObserver>,
    instance: Weak<dyn MaterialInstObserver>,
}

impl Subscribers {
    /// Registers one object for every asset kind.
    pub fn new<O>(observer: &Rc<O>) -> Self
    where
        O: MeshObserver + TextureObserver + ShaderObserver + MaterialInstObserver + 'static,
    {
        let mesh: Rc<dyn MeshObserver> = observer.clone();
        let texture: Rc<dyn TextureObserver> = observer.clone();
        let shader: Rc<dyn ShaderObserver> = observer.clone();
        let instance: Rc<dyn MaterialInstObserver> = observer.clone();
        Self {
            mesh: Rc::downgrade(&mesh),
            texture: Rc::downgrade(&texture),
            shader: Rc::downgrade(&shader),
            instance: Rc::downgrade(&instance),
        }
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("alive", &(self.mesh.strong_count() > 0))
            .finish()
    }
}

/// The GPU mirrors of every asset a backend has realized.
#[derive(Debug, Default)]
pub struct GpuMirrors {
    subscribers: Option<Subscribers>,
    meshes: HashMap<AssetId, MeshMirror>,
    textures: HashMap<AssetId, TextureMirror>,
    shaders: HashMap<AssetId, ShaderMirror>,
    instances: HashMap<AssetId, InstanceMirror>,
    generation: u64,
}

impl GpuMirrors {
    /// Creates an empty cache. Assets realized before [`set_subscribers`](Self::set_subscribers)
    /// is called are not observed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the observer registrations used for assets realized from now on.
    pub fn set_subscribers(&mut self, subscribers: Subscribers) {
        self.subscribers = Some(subscribers);
    }

    /// Increases every time a mirror is recreated or released.
    ///
    /// Backends cache their current bindings against this value.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The mirror of a realized mesh.
    pub fn mesh(&self, id: AssetId) -> Option<&MeshMirror> {
        self.meshes.get(&id)
    }

    /// Number of realized meshes.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of realized textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of compiled programs across every shader.
    pub fn pipeline_count(&self) -> usize {
        self.shaders.values().map(|s| s.pipelines.len()).sum()
    }

    /// Number of material instances with realized uniform buffers.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Realizes `mesh` if needed.
    pub fn prepare_mesh<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        mesh: &Rc<Mesh>,
    ) -> Result<&MeshMirror, ResourceError> {
        let id = mesh.id();
        if !self.meshes.contains_key(&id) {
            let mirror = create_mesh_mirror(resources, mesh, Rc::downgrade(mesh))?;
            log::debug!(
                "GpuMirrors: realized mesh {id} as {:?} ({} indices)",
                mirror.handle,
                mirror.index_count
            );
            if let Some(subscribers) = &self.subscribers {
                mesh.attach_observer(subscribers.mesh.clone());
            }
            self.meshes.insert(id, mirror);
        }
        self.meshes.get(&id).ok_or(ResourceError::NotFound)
    }

    /// Realizes `texture` if needed.
    pub fn prepare_texture<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        texture: &Rc<Texture>,
    ) -> Result<TextureHandle, ResourceError> {
        let id = texture.id();
        if let Some(mirror) = self.textures.get(&id) {
            return Ok(mirror.handle);
        }
        let handle = texture.with_descriptor(|descriptor| resources.create_texture(descriptor))?;
        log::debug!("GpuMirrors: realized texture {id} as {handle:?}");
        if let Some(subscribers) = &self.subscribers {
            texture.attach_observer(subscribers.texture.clone());
        }
        self.textures.insert(
            id,
            TextureMirror {
                handle,
                asset: Rc::downgrade(texture),
            },
        );
        Ok(handle)
    }

    /// Realizes the program, uniform buffers and textures of `instance`.
    ///
    /// ## Errors
    /// * `ResourceError::NotFound` - If the instance was released or its shader is gone.
    /// * `ResourceError::InvalidDescriptor` - If the shader's bindings changed since the instance
    ///   was laid out.
    pub fn prepare_material<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        instance: &Rc<MaterialInst>,
    ) -> Result<PreparedMaterial, ResourceError> {
        if instance.is_released() {
            return Err(ResourceError::NotFound);
        }
        let shader = instance.shader().ok_or(ResourceError::NotFound)?;
        let layout = instance.layout();
        if !layout.matches(&shader) {
            return Err(ResourceError::InvalidDescriptor(format!(
                "material instance {} was laid out from an older binding layout of shader '{}'",
                instance.id(),
                shader.name()
            )));
        }

        let flags = instance.flags();
        let material = self.prepare_pipeline(resources, &shader, flags)?;
        let buffers = self.prepare_instance_buffers(resources, instance)?;

        let uniform_buffers = layout
            .blocks()
            .iter()
            .zip(buffers)
            .map(|(block, handle)| (block.slot, handle))
            .collect();

        let mut textures = Vec::with_capacity(layout.textures().len());
        for (slot, texture) in instance.resolved_textures() {
            let handle = match texture {
                Some(texture) => match self.prepare_texture(resources, &texture) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::warn!("GpuMirrors: texture {} cannot be realized: {e}", texture.id());
                        None
                    }
                },
                None => None,
            };
            textures.push((slot, handle));
        }

        Ok(PreparedMaterial {
            material,
            flags,
            uniform_buffers,
            textures,
            samplers: layout.samplers().iter().map(|s| s.slot).collect(),
        })
    }

    fn prepare_pipeline<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        shader: &Rc<Shader>,
        flags: MaterialFlags,
    ) -> Result<MaterialHandle, ResourceError> {
        let id = shader.id();
        if !self.shaders.contains_key(&id) {
            if let Some(subscribers) = &self.subscribers {
                shader.attach_observer(subscribers.shader.clone());
            }
            self.shaders.insert(
                id,
                ShaderMirror {
                    asset: Rc::downgrade(shader),
                    pipelines: HashMap::new(),
                },
            );
        }
        let mirror = self.shaders.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if let Some(handle) = mirror.pipelines.get(&flags) {
            return Ok(*handle);
        }

        let code = shader.code();
        let reflection = shader.reflection();
        let handle = resources.create_material(&MaterialDescriptor {
            label: shader.name(),
            code: &code,
            reflection: &reflection,
            flags,
        })?;
        log::debug!(
            "GpuMirrors: compiled shader '{}' with {flags:?} as {handle:?}",
            shader.name()
        );
        mirror.pipelines.insert(flags, handle);
        Ok(handle)
    }

    fn prepare_instance_buffers<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        instance: &Rc<MaterialInst>,
    ) -> Result<Vec<BufferHandle>, ResourceError> {
        let id = instance.id();
        if let Some(mirror) = self.instances.get(&id) {
            return Ok(mirror.buffers.clone());
        }

        let mut buffers = Vec::new();
        for uniform in instance.uniform_buffers().iter() {
            let bytes = uniform.buffer.as_bytes();
            match resources.create_buffer(bytes.len(), Some(bytes)) {
                Ok(handle) => buffers.push(handle),
                Err(e) => {
                    for handle in buffers {
                        release_buffer(resources, handle);
                    }
                    return Err(e);
                }
            }
        }
        if let Some(subscribers) = &self.subscribers {
            instance.attach_observer(subscribers.instance.clone());
        }
        self.instances.insert(
            id,
            InstanceMirror {
                asset: Rc::downgrade(instance),
                buffers: buffers.clone(),
            },
        );
        Ok(buffers)
    }

    /// Releases the mirror of a mesh that is being dropped.
    pub fn on_mesh_destroying<R: GpuResources + ?Sized>(&mut self, resources: &mut R, mesh: &Mesh) {
        self.release_mesh_mirror(resources, mesh.id());
    }

    fn release_mesh_mirror<R: GpuResources + ?Sized>(&mut self, resources: &mut R, id: AssetId) {
        if let Some(mirror) = self.meshes.remove(&id) {
            release_mesh(resources, mirror.handle);
            self.generation += 1;
        }
    }

    /// Recreates the mirror of a mesh whose geometry was applied.
    pub fn on_mesh_changed<R: GpuResources + ?Sized>(&mut self, resources: &mut R, mesh: &Mesh) {
        let id = mesh.id();
        let Some(old) = self.meshes.remove(&id) else {
            return;
        };
        release_mesh(resources, old.handle);
        self.generation += 1;
        match create_mesh_mirror(resources, mesh, old.asset) {
            Ok(mirror) => {
                self.meshes.insert(id, mirror);
            }
            Err(e) => log::warn!("GpuMirrors: mesh {id} could not be re-uploaded: {e}"),
        }
    }

    /// Releases the mirror of a texture that is being dropped.
    pub fn on_texture_destroying<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        texture: &Texture,
    ) {
        self.release_texture_mirror(resources, texture.id());
    }

    fn release_texture_mirror<R: GpuResources + ?Sized>(&mut self, resources: &mut R, id: AssetId) {
        if let Some(mirror) = self.textures.remove(&id) {
            release_texture(resources, mirror.handle);
            self.generation += 1;
        }
    }

    /// Releases the mirror of a texture whose pixels changed. It is recreated on next use.
    pub fn on_texture_changed<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        texture: &Texture,
    ) {
        self.on_texture_destroying(resources, texture);
    }

    /// Destroys every program of a shader that is being dropped.
    pub fn on_shader_destroying<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        shader: &Shader,
    ) {
        self.release_shader_mirror(resources, shader.id());
    }

    fn release_shader_mirror<R: GpuResources + ?Sized>(&mut self, resources: &mut R, id: AssetId) {
        if let Some(mirror) = self.shaders.remove(&id) {
            release_pipelines(resources, mirror.pipelines);
            self.generation += 1;
        }
    }

    /// Destroys every program of a shader whose code changed. They are rebuilt on next use.
    pub fn on_shader_changed<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        shader: &Shader,
    ) {
        self.drop_pipelines(resources, shader.id());
    }

    fn drop_pipelines<R: GpuResources + ?Sized>(&mut self, resources: &mut R, id: AssetId) {
        if let Some(mirror) = self.shaders.get_mut(&id) {
            release_pipelines(resources, std::mem::take(&mut mirror.pipelines));
            self.generation += 1;
        }
    }

    /// Releases the uniform buffers of an instance that is being released.
    pub fn on_instance_destroying<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        instance: &MaterialInst,
    ) {
        self.release_instance_mirror(resources, instance.id());
    }

    fn release_instance_mirror<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        id: AssetId,
    ) {
        if let Some(mirror) = self.instances.remove(&id) {
            for handle in mirror.buffers {
                release_buffer(resources, handle);
            }
            self.generation += 1;
        }
    }

    /// Uploads the byte range of an instance's uniform buffer that was written.
    pub fn on_uniform_changed<R: GpuResources + ?Sized>(
        &mut self,
        resources: &mut R,
        instance: &MaterialInst,
        buffer_index: usize,
        offset: usize,
        size: usize,
    ) {
        let Some(handle) = self
            .instances
            .get(&instance.id())
            .and_then(|m| m.buffers.get(buffer_index).copied())
        else {
            return;
        };
        let buffers = instance.uniform_buffers();
        let Some(uniform) = buffers.get(buffer_index) else {
            return;
        };
        let bytes = uniform.buffer.read_bytes(offset, size);
        if let Err(e) = resources.update_buffer(handle, offset, bytes) {
            log::warn!("GpuMirrors: uniform upload to {handle:?} failed: {e}");
        }
    }

    /// Applies an event that was queued while the backend was busy.
    ///
    /// Change events re-read the asset through the mirror's weak reference and are skipped
    /// when the asset is already gone.
    fn replay<R: GpuResources + ?Sized>(&mut self, resources: &mut R, event: DeferredEvent) {
        match event {
            DeferredEvent::MeshDestroying(id) => self.release_mesh_mirror(resources, id),
            DeferredEvent::MeshChanged(id) => {
                if let Some(mesh) = self.meshes.get(&id).and_then(|m| m.asset.upgrade()) {
                    self.on_mesh_changed(resources, &mesh);
                }
            }
            DeferredEvent::TextureDestroying(id) | DeferredEvent::TextureChanged(id) => {
                self.release_texture_mirror(resources, id)
            }
            DeferredEvent::ShaderDestroying(id) => self.release_shader_mirror(resources, id),
            DeferredEvent::ShaderChanged(id) => self.drop_pipelines(resources, id),
            DeferredEvent::InstanceDestroying(id) => self.release_instance_mirror(resources, id),
            DeferredEvent::UniformChanged {
                instance,
                buffer_index,
                offset,
                size,
            } => {
                if let Some(inst) = self.instances.get(&instance).and_then(|m| m.asset.upgrade()) {
                    self.on_uniform_changed(resources, &inst, buffer_index, offset, size);
                }
            }
        }
    }

    /// Releases every mirror and unsubscribes from every asset still alive.
    pub fn release_all<R: GpuResources + ?Sized>(&mut self, resources: &mut R) {
        let subscribers = self.subscribers.clone();

        for (_, mirror) in self.meshes.drain() {
            if let (Some(mesh), Some(s)) = (mirror.asset.upgrade(), &subscribers) {
                mesh.detach_observer(&s.mesh);
            }
            release_mesh(resources, mirror.handle);
        }
        for (_, mirror) in self.textures.drain() {
            if let (Some(texture), Some(s)) = (mirror.asset.upgrade(), &subscribers) {
                texture.detach_observer(&s.texture);
            }
            release_texture(resources, mirror.handle);
        }
        for (_, mirror) in self.shaders.drain() {
            if let (Some(shader), Some(s)) = (mirror.asset.upgrade(), &subscribers) {
                shader.detach_observer(&s.shader);
            }
            release_pipelines(resources, mirror.pipelines);
        }
        for (_, mirror) in self.instances.drain() {
            if let (Some(instance), Some(s)) = (mirror.asset.upgrade(), &subscribers) {
                instance.detach_observer(&s.instance);
            }
            for handle in mirror.buffers {
                release_buffer(resources, handle);
            }
        }
        self.generation += 1;
        log::debug!("GpuMirrors: released every mirror");
    }
}

fn create_mesh_mirror<R: GpuResources + ?Sized>(
    resources: &mut R,
    mesh: &Mesh,
    asset: Weak<Mesh>,
) -> Result<MeshMirror, ResourceError> {
    let vertices = mesh.vertices();
    let indices = mesh.indices();
    let topology = mesh.topology();
    let handle = resources.create_mesh(&vertices, &indices, topology)?;
    Ok(MeshMirror {
        handle,
        index_count: indices.len() as u32,
        topology,
        asset,
    })
}

fn release_mesh<R: GpuResources + ?Sized>(resources: &mut R, handle: MeshHandle) {
    if let Err(e) = resources.destroy_mesh(handle) {
        log::warn!("GpuMirrors: Failed to destroy mesh {handle:?}: {e}");
    }
}

fn release_texture<R: GpuResources + ?Sized>(resources: &mut R, handle: TextureHandle) {
    if let Err(e) = resources.destroy_texture(handle) {
        log::warn!("GpuMirrors: Failed to destroy texture {handle:?}: {e}");
    }
}

fn release_buffer<R: GpuResources + ?Sized>(resources: &mut R, handle: BufferHandle) {
    if let Err(e) = resources.destroy_buffer(handle) {
        log::warn!("GpuMirrors: Failed to destroy buffer {handle:?}: {e}");
    }
}

fn release_pipelines<R: GpuResources + ?Sized>(
    resources: &mut R,
    pipelines: HashMap<MaterialFlags, MaterialHandle>,
) {
    for (_, handle) in pipelines {
        if let Err(e) = resources.destroy_material(handle) {
            log::warn!("GpuMirrors: Failed to destroy material {handle:?}: {e}");
        }
    }
}

/// A backend's mirror cache together with the resources it allocates from.
pub trait MirrorSink: 'static {
    /// Splits the backend into its mirror cache and its resource allocator.
    fn mirror_parts(&mut self) -> (&mut GpuMirrors, &mut dyn GpuResources);
}

/// An asset notification reduced to the ids it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredEvent {
    MeshDestroying(AssetId),
    MeshChanged(AssetId),
    TextureDestroying(AssetId),
    TextureChanged(AssetId),
    ShaderDestroying(AssetId),
    ShaderChanged(AssetId),
    InstanceDestroying(AssetId),
    UniformChanged {
        instance: AssetId,
        buffer_index: usize,
        offset: usize,
        size: usize,
    },
}

/// Forwards asset notifications into a backend's [`GpuMirrors`].
///
/// The bridge holds the backend weakly. Events arriving while the backend is borrowed are
/// queued in arrival order and applied before the next event that gets through, or on
/// [`flush`](Self::flush).
pub struct ObserverBridge<S: MirrorSink> {
    sink: Weak<RefCell<S>>,
    pending: RefCell<VecDeque<DeferredEvent>>,
    label: &'static str,
}

impl<S: MirrorSink> ObserverBridge<S> {
    /// Creates a bridge for `sink` and registers it as the subscriber of its mirror cache.
    ///
    /// The caller keeps the returned `Rc` alive for as long as assets should be observed.
    pub fn install(sink: &Rc<RefCell<S>>, label: &'static str) -> Rc<Self> {
        let bridge = Rc::new(Self {
            sink: Rc::downgrade(sink),
            pending: RefCell::new(VecDeque::new()),
            label,
        });
        let subscribers = Subscribers::new(&bridge);
        sink.borrow_mut().mirror_parts().0.set_subscribers(subscribers);
        bridge
    }

    /// Applies every queued event. Does nothing while the backend is still borrowed.
    pub fn flush(&self) {
        if self.pending.borrow().is_empty() {
            return;
        }
        let Some(sink) = self.sink.upgrade() else {
            return;
        };
        let Ok(mut sink) = sink.try_borrow_mut() else {
            return;
        };
        let (mirrors, resources) = sink.mirror_parts();
        self.drain(mirrors, resources);
    }

    /// Number of events waiting for the backend.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    fn drain(&self, mirrors: &mut GpuMirrors, resources: &mut dyn GpuResources) {
        loop {
            let Some(event) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            mirrors.replay(resources, event);
        }
    }

    fn with(&self, event: DeferredEvent, f: impl FnOnce(&mut GpuMirrors, &mut dyn GpuResources)) {
        let Some(sink) = self.sink.upgrade() else {
            return;
        };
        let Ok(mut sink) = sink.try_borrow_mut() else {
            log::debug!("{}: {event:?} queued while the backend is busy", self.label);
            self.pending.borrow_mut().push_back(event);
            return;
        };
        let (mirrors, resources) = sink.mirror_parts();
        self.drain(mirrors, resources);
        f(&mut *mirrors, &mut *resources);
        self.drain(mirrors, resources);
    }
}

impl<S: MirrorSink> MeshObserver for ObserverBridge<S> {
    fn mesh_destroying(&self, mesh: &Mesh) {
        self.with(DeferredEvent::MeshDestroying(mesh.id()), |m, r| {
            m.on_mesh_destroying(r, mesh)
        });
    }

    fn mesh_changed(&self, mesh: &Mesh) {
        self.with(DeferredEvent::MeshChanged(mesh.id()), |m, r| {
            m.on_mesh_changed(r, mesh)
        });
    }
}

impl<S: MirrorSink> TextureObserver for ObserverBridge<S> {
    fn texture_destroying(&self, texture: &Texture) {
        self.with(DeferredEvent::TextureDestroying(texture.id()), |m, r| {
            m.on_texture_destroying(r, texture)
        });
    }

    fn texture_changed(&self, texture: &Texture) {
        self.with(DeferredEvent::TextureChanged(texture.id()), |m, r| {
            m.on_texture_changed(r, texture)
        });
    }
}

impl<S: MirrorSink> ShaderObserver for ObserverBridge<S> {
    fn shader_destroying(&self, shader: &Shader) {
        self.with(DeferredEvent::ShaderDestroying(shader.id()), |m, r| {
            m.on_shader_destroying(r, shader)
        });
    }

    fn shader_changed(&self, shader: &Shader) {
        self.with(DeferredEvent::ShaderChanged(shader.id()), |m, r| {
            m.on_shader_changed(r, shader)
        });
    }
}

impl<S: MirrorSink> MaterialInstObserver for ObserverBridge<S> {
    fn instance_destroying(&self, instance: &MaterialInst) {
        self.with(DeferredEvent::InstanceDestroying(instance.id()), |m, r| {
            m.on_instance_destroying(r, instance)
        });
    }

    fn uniform_changed(
        &self,
        instance: &MaterialInst,
        buffer_index: usize,
        offset: usize,
        size: usize,
    ) {
        let event = DeferredEvent::UniformChanged {
            instance: instance.id(),
            buffer_index,
            offset,
            size,
        };
        self.with(event, |m, r| {
            m.on_uniform_changed(r, instance, buffer_index, offset, size)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::material::Material;
    use crate::renderer::api::scene::{Submesh, Vertex};
    use crate::renderer::api::shader::ShaderCode;
    use crate::renderer::api::texture::{TextureDescriptor, TextureFormat};
    use crate::renderer::api::uniform::UniformAccess;
    use crate::utils::{Buffer, Storage};

    const SRC: &str = r#"
struct Mat {
    color: vec4<f32>,
    shininess: f32,
};
@group(0) @binding(2) var<uniform> u_mat: Mat;
@group(0) @binding(4) var t_diffuse: texture_2d<f32>;
@group(0) @binding(5) var s_diffuse: sampler;
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return u_mat.color; }
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(t_diffuse, s_diffuse, vec2<f32>(0.5)) * u_mat.shininess;
}
"#;

    #[derive(Default)]
    struct Fake {
        buffers: Storage<Buffer>,
        meshes: Storage<u32>,
        materials: Storage<String>,
        textures: Storage<(u32, u32)>,
        uploads: Vec<(BufferHandle, usize, usize)>,
    }

    impl GpuResources for Fake {
        fn create_buffer(
            &mut self,
            size: usize,
            data: Option<&[u8]>,
        ) -> Result<BufferHandle, ResourceError> {
            let mut buffer = Buffer::with_size(size);
            if let Some(data) = data {
                buffer.write_bytes(0, data);
            }
            Ok(self.buffers.add(buffer).into())
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
            self.uploads.push((handle, offset, data.len()));
            Ok(())
        }
        fn create_mesh(
            &mut self,
            _vertices: &[Vertex],
            indices: &[u16],
            _topology: MeshTopology,
        ) -> Result<MeshHandle, ResourceError> {
            Ok(self.meshes.add(indices.len() as u32).into())
        }
        fn destroy_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError> {
            self.meshes
                .remove(handle.raw())
                .map(|_| ())
                .ok_or(ResourceError::InvalidHandle)
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
            descriptor: &MaterialDescriptor<'_>,
        ) -> Result<MaterialHandle, ResourceError> {
            Ok(self.materials.add(descriptor.label.to_string()).into())
        }
        fn destroy_material(&mut self, handle: MaterialHandle) -> Result<(), ResourceError> {
            self.materials
                .remove(handle.raw())
                .map(|_| ())
                .ok_or(ResourceError::InvalidHandle)
        }
        fn create_texture(
            &mut self,
            descriptor: &TextureDescriptor<'_>,
        ) -> Result<TextureHandle, ResourceError> {
            descriptor.validate()?;
            Ok(self
                .textures
                .add((descriptor.width, descriptor.height))
                .into())
        }
        fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), ResourceError> {
            self.textures
                .remove(handle.raw())
                .map(|_| ())
                .ok_or(ResourceError::InvalidHandle)
        }
    }

    #[derive(Default)]
    struct Backend {
        mirrors: GpuMirrors,
        fake: Fake,
    }

    impl MirrorSink for Backend {
        fn mirror_parts(&mut self) -> (&mut GpuMirrors, &mut dyn GpuResources) {
            (&mut self.mirrors, &mut self.fake)
        }
    }

    fn backend() -> (Rc<RefCell<Backend>>, Rc<ObserverBridge<Backend>>) {
        let backend = Rc::new(RefCell::new(Backend::default()));
        let bridge = ObserverBridge::install(&backend, "TestBackend");
        (backend, bridge)
    }

    fn triangle() -> Rc<Mesh> {
        Mesh::with_geometry(
            vec![Vertex::default(); 3],
            vec![0, 1, 2],
            MeshTopology::Triangles,
        )
    }

    fn prepare(backend: &Rc<RefCell<Backend>>, instance: &Rc<MaterialInst>) -> PreparedMaterial {
        let mut b = backend.borrow_mut();
        let Backend { mirrors, fake } = &mut *b;
        mirrors.prepare_material(fake, instance).unwrap()
    }

    #[test]
    fn test_mesh_realized_once_and_released_on_drop() {
        let (backend, _bridge) = backend();
        let mesh = triangle();
        {
            let mut b = backend.borrow_mut();
            let Backend { mirrors, fake } = &mut *b;
            let first = mirrors.prepare_mesh(fake, &mesh).unwrap().handle;
            let second = mirrors.prepare_mesh(fake, &mesh).unwrap().handle;
            assert_eq!(first, second);
            assert_eq!(fake.meshes.len(), 1);
        }
        assert_eq!(mesh.observer_count(), 1);

        drop(mesh);
        let b = backend.borrow();
        assert_eq!(b.mirrors.mesh_count(), 0);
        assert!(b.fake.meshes.is_empty());
    }

    #[test]
    fn test_mesh_change_recreates_mirror() {
        let (backend, _bridge) = backend();
        let mesh = triangle();
        {
            let mut b = backend.borrow_mut();
            let Backend { mirrors, fake } = &mut *b;
            mirrors.prepare_mesh(fake, &mesh).unwrap();
        }
        let generation = backend.borrow().mirrors.generation();

        mesh.set_indices(vec![0, 1, 2, 2, 1, 0], MeshTopology::Triangles);
        mesh.set_submesh(1, Submesh::new(3, 3));
        mesh.apply();

        let b = backend.borrow();
        assert_eq!(b.mirrors.mesh(mesh.id()).unwrap().index_count, 6);
        assert!(b.mirrors.generation() > generation);
        assert_eq!(b.fake.meshes.len(), 1);
    }

    #[test]
    fn test_empty_mesh_is_realized() {
        let (backend, _bridge) = backend();
        let mesh = Mesh::new();
        let mut b = backend.borrow_mut();
        let Backend { mirrors, fake } = &mut *b;
        assert_eq!(mirrors.prepare_mesh(fake, &mesh).unwrap().index_count, 0);
    }

    #[test]
    fn test_prepare_material_binds_layout_slots() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let diffuse = Texture::new(1, 1, TextureFormat::Rgba, vec![255; 4]).unwrap();
        material.set_texture("t_diffuse", &diffuse);
        let instance = material.create_instance();

        let prepared = prepare(&backend, &instance);
        assert_eq!(prepared.uniform_buffers.len(), 1);
        assert_eq!(prepared.uniform_buffers[0].0, BindingSlot::new(0, 2));
        assert_eq!(prepared.textures[0].0, BindingSlot::new(0, 4));
        assert!(prepared.textures[0].1.is_some());
        assert_eq!(prepared.samplers, vec![BindingSlot::new(0, 5)]);

        let again = prepare(&backend, &instance);
        assert_eq!(prepared, again);
        let b = backend.borrow();
        assert_eq!(b.mirrors.pipeline_count(), 1);
        assert_eq!(b.mirrors.texture_count(), 1);
    }

    #[test]
    fn test_uniform_write_uploads_changed_range() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        let prepared = prepare(&backend, &instance);

        instance.set_float("u_mat.shininess", 16.0);

        let b = backend.borrow();
        let handle = prepared.uniform_buffers[0].1;
        assert_eq!(b.fake.uploads, vec![(handle, 16, 4)]);
        let bytes = b.fake.buffers.get(handle.raw()).unwrap().read_bytes(16, 4);
        assert_eq!(bytes, &16.0f32.to_ne_bytes());
    }

    #[test]
    fn test_flags_select_distinct_pipelines() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let opaque = prepare(&backend, &material.default_instance()).material;
        material.set_flag(MaterialFlags::TRANSPARENT, true);
        let blended = prepare(&backend, &material.default_instance()).material;
        assert_ne!(opaque, blended);
        assert_eq!(backend.borrow().mirrors.pipeline_count(), 2);
    }

    #[test]
    fn test_recompile_keeps_instances_bindable() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        instance.set_float("u_mat.shininess", 8.0);
        let before = prepare(&backend, &instance);

        shader.set_code(ShaderCode::wgsl(SRC));
        assert_eq!(backend.borrow().mirrors.pipeline_count(), 0);

        let after = prepare(&backend, &instance);
        assert_eq!(after.uniform_buffers, before.uniform_buffers);
        assert_eq!(backend.borrow().mirrors.pipeline_count(), 1);
        assert_eq!(instance.get_float("u_mat.shininess"), 8.0);
        prepare(&backend, &material.default_instance());
    }

    #[test]
    fn test_layout_change_stales_instances() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        prepare(&backend, &instance);

        let wider = SRC.replace("shininess: f32,", "shininess: f32,\n    glow: f32,");
        shader.set_code(ShaderCode::wgsl(wider));

        let mut b = backend.borrow_mut();
        let Backend { mirrors, fake } = &mut *b;
        let err = mirrors.prepare_material(fake, &instance).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidDescriptor(_)));
        drop(b);

        material.set_shader(&shader);
        let prepared = prepare(&backend, &material.default_instance());
        assert_eq!(prepared.uniform_buffers.len(), 1);
    }

    #[test]
    fn test_destroying_fires_for_every_kind() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let diffuse = Texture::new(1, 1, TextureFormat::R, vec![7]).unwrap();
        material.set_texture("t_diffuse", &diffuse);
        prepare(&backend, &material.default_instance());

        drop(diffuse);
        assert_eq!(backend.borrow().mirrors.texture_count(), 0);
        drop(material);
        assert_eq!(backend.borrow().mirrors.instance_count(), 0);
        drop(shader);
        assert_eq!(backend.borrow().mirrors.pipeline_count(), 0);

        let b = backend.borrow();
        assert!(b.fake.buffers.is_empty());
        assert!(b.fake.materials.is_empty());
        assert!(b.fake.textures.is_empty());
    }

    #[test]
    fn test_released_instance_is_rejected() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        material.destroy_instance(&instance);

        let mut b = backend.borrow_mut();
        let Backend { mirrors, fake } = &mut *b;
        assert!(matches!(
            mirrors.prepare_material(fake, &instance),
            Err(ResourceError::NotFound)
        ));
    }

    #[test]
    fn test_release_all_detaches() {
        let (backend, _bridge) = backend();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let mesh = triangle();
        prepare(&backend, &material.default_instance());
        {
            let mut b = backend.borrow_mut();
            let Backend { mirrors, fake } = &mut *b;
            mirrors.prepare_mesh(fake, &mesh).unwrap();
            mirrors.release_all(fake);
        }

        assert_eq!(mesh.observer_count(), 0);
        assert_eq!(shader.observer_count(), 0);
        assert_eq!(material.default_instance().observer_count(), 0);
        let b = backend.borrow();
        assert!(b.fake.meshes.is_empty());
        assert!(b.fake.buffers.is_empty());
    }

    #[test]
    fn test_events_while_busy_are_replayed_in_order() {
        let (backend, bridge) = backend();
        let mesh = triangle();
        let shader = Shader::from_wgsl("mat", SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        let prepared = prepare(&backend, &instance);
        {
            let mut b = backend.borrow_mut();
            let Backend { mirrors, fake } = &mut *b;
            mirrors.prepare_mesh(fake, &mesh).unwrap();
        }

        let guard = backend.borrow_mut();
        mesh.set_indices(vec![0, 1, 2, 2, 1, 0], MeshTopology::Triangles);
        mesh.apply();
        instance.set_float("u_mat.shininess", 2.0);
        material.destroy_instance(&instance);
        assert_eq!(bridge.pending_count(), 3);
        drop(guard);

        bridge.flush();
        assert_eq!(bridge.pending_count(), 0);
        let b = backend.borrow();
        assert_eq!(b.mirrors.mesh(mesh.id()).unwrap().index_count, 6);
        assert_eq!(b.mirrors.instance_count(), 0);
        assert!(b.fake.buffers.get(prepared.uniform_buffers[0].1.raw()).is_none());
    }

    #[test]
    fn test_destroying_while_busy_releases_on_next_event() {
        let (backend, bridge) = backend();
        let doomed = triangle();
        let other = triangle();
        {
            let mut b = backend.borrow_mut();
            let Backend { mirrors, fake } = &mut *b;
            mirrors.prepare_mesh(fake, &doomed).unwrap();
            mirrors.prepare_mesh(fake, &other).unwrap();
        }

        let guard = backend.borrow_mut();
        drop(doomed);
        drop(guard);
        assert_eq!(backend.borrow().mirrors.mesh_count(), 2);

        other.apply();
        assert_eq!(bridge.pending_count(), 0);
        let b = backend.borrow();
        assert_eq!(b.mirrors.mesh_count(), 1);
        assert_eq!(b.fake.meshes.len(), 1);
    }
}
