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

//! Defines material instances, the per-draw overrides of a material's values.

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use crate::asset::{Asset, AssetId};
use crate::renderer::api::handle::BindingSlot;
use crate::renderer::api::material::{Material, TextureSlot, UniformBuffer};
use crate::renderer::api::shader::Shader;
use crate::renderer::api::texture::Texture;
use crate::renderer::api::uniform::{MaterialLayout, UniformAccess, UniformMember};
use crate::renderer::api::util::MaterialFlags;
use crate::renderer::observer::{MaterialInstObserver, ObserverList};

/// An independently writable copy of a material's values and textures.
///
/// Every successful uniform write is reported to observers with the byte range it touched.
pub struct MaterialInst {
    id: AssetId,
    material: Weak<Material>,
    shader: Weak<Shader>,
    layout: Rc<MaterialLayout>,
    buffers: RefCell<Vec<UniformBuffer>>,
    textures: RefCell<Vec<TextureSlot>>,
    flags: Cell<MaterialFlags>,
    released: Cell<bool>,
    observers: ObserverList<dyn MaterialInstObserver>,
}

impl MaterialInst {
    pub(crate) fn spawn(
        material: Weak<Material>,
        shader: Weak<Shader>,
        layout: Rc<MaterialLayout>,
        buffers: Vec<UniformBuffer>,
        textures: Vec<TextureSlot>,
        flags: MaterialFlags,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: AssetId::new(),
            material,
            shader,
            layout,
            buffers: RefCell::new(buffers),
            textures: RefCell::new(textures),
            flags: Cell::new(flags),
            released: Cell::new(false),
            observers: ObserverList::new(),
        })
    }

    /// The owning material, if it is still alive.
    pub fn material(&self) -> Option<Rc<Material>> {
        self.material.upgrade()
    }

    /// The shader the layout was built from, if it is still alive.
    pub fn shader(&self) -> Option<Rc<Shader>> {
        self.shader.upgrade()
    }

    /// The layout this instance was created with.
    pub fn layout(&self) -> &Rc<MaterialLayout> {
        &self.layout
    }

    /// The fixed-function state.
    pub fn flags(&self) -> MaterialFlags {
        self.flags.get()
    }

    pub(crate) fn set_flags(&self, flags: MaterialFlags) {
        self.flags.set(flags);
    }

    /// Returns `true` once the owning material released this instance.
    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Notifies observers that the instance is going away. Later calls do nothing.
    pub(crate) fn release(&self) {
        if !self.released.replace(true) {
            self.observers.notify(|o| o.instance_destroying(self));
        }
    }

    /// Binds a texture to the slot called `name`.
    ///
    /// Returns `false`, leaving every slot unchanged, if the slot does not exist.
    pub fn set_texture(&self, name: &str, texture: &Rc<Texture>) -> bool {
        let Some(index) = self.layout.texture_index(name) else {
            log::warn!("Uniform texture '{name}' does not exist!");
            return false;
        };
        self.textures.borrow_mut()[index].texture = Rc::downgrade(texture);
        true
    }

    /// The texture used for the slot called `name`.
    ///
    /// An empty slot falls back to the owning material's texture of the same name.
    pub fn texture(&self, name: &str) -> Option<Rc<Texture>> {
        let index = self.layout.texture_index(name)?;
        let own = self.textures.borrow()[index].texture();
        own.or_else(|| self.material()?.texture(name))
    }

    /// Every texture slot with the texture it resolves to.
    pub fn resolved_textures(&self) -> Vec<(BindingSlot, Option<Rc<Texture>>)> {
        let slots: Vec<(String, BindingSlot)> = self
            .textures
            .borrow()
            .iter()
            .map(|s| (s.name.clone(), s.slot))
            .collect();
        slots
            .into_iter()
            .map(|(name, slot)| (slot, self.texture(&name)))
            .collect()
    }

    /// The instance's uniform buffers.
    pub fn uniform_buffers(&self) -> Ref<'_, [UniformBuffer]> {
        Ref::map(self.buffers.borrow(), |b| b.as_slice())
    }

    /// The instance's own texture slots, without fallback.
    pub fn texture_slots(&self) -> Ref<'_, [TextureSlot]> {
        Ref::map(self.textures.borrow(), |t| t.as_slice())
    }

    /// Subscribes an observer.
    pub fn attach_observer(&self, observer: Weak<dyn MaterialInstObserver>) {
        self.observers.attach(observer);
    }

    /// Unsubscribes an observer.
    pub fn detach_observer(&self, observer: &Weak<dyn MaterialInstObserver>) {
        self.observers.detach(observer);
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl UniformAccess for MaterialInst {
    fn uniform_layout(&self) -> Rc<MaterialLayout> {
        self.layout.clone()
    }

    fn read_member(&self, member: &UniformMember) -> Vec<u8> {
        self.buffers.borrow()[member.buffer_index]
            .buffer
            .read_bytes(member.offset, member.size)
            .to_vec()
    }

    fn write_member(&self, member: &UniformMember, bytes: &[u8]) {
        self.buffers.borrow_mut()[member.buffer_index]
            .buffer
            .write_bytes(member.offset, bytes);
        self.observers.notify(|o| {
            o.uniform_changed(self, member.buffer_index, member.offset, bytes.len())
        });
    }
}

impl Asset for MaterialInst {
    fn id(&self) -> AssetId {
        self.id
    }
}

impl std::fmt::Debug for MaterialInst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialInst")
            .field("id", &self.id)
            .field("flags", &self.flags.get())
            .field("released", &self.released.get())
            .finish_non_exhaustive()
    }
}

impl Drop for MaterialInst {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
struct Light {
    intensity: f32,
    pad: f32,
    color: vec2<f32>,
};
@group(1) @binding(0) var<uniform> u_light: Light;
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return vec4<f32>(u_light.color, u_light.intensity, u_light.pad);
}
@fragment
fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(u_light.intensity); }
"#;

    #[derive(Default)]
    struct Events {
        changes: RefCell<Vec<(usize, usize, usize)>>,
        destroyed: Cell<u32>,
    }

    impl MaterialInstObserver for Events {
        fn instance_destroying(&self, _instance: &MaterialInst) {
            self.destroyed.set(self.destroyed.get() + 1);
        }
        fn uniform_changed(
            &self,
            _instance: &MaterialInst,
            buffer_index: usize,
            offset: usize,
            size: usize,
        ) {
            self.changes.borrow_mut().push((buffer_index, offset, size));
        }
    }

    fn observed() -> (Rc<Material>, Rc<MaterialInst>, Rc<Events>, Rc<dyn MaterialInstObserver>) {
        let shader = Shader::from_wgsl("light", SRC);
        let material = Material::with_shader("light", &shader);
        let instance = material.create_instance();
        let events = Rc::new(Events::default());
        let observer: Rc<dyn MaterialInstObserver> = events.clone();
        instance.attach_observer(Rc::downgrade(&observer));
        (material, instance, events, observer)
    }

    #[test]
    fn test_write_reports_changed_range() {
        let (_material, instance, events, _observer) = observed();
        instance.set_float2("u_light.color", glam::Vec2::new(0.5, 0.25));
        instance.set_float("u_light.intensity", 2.0);
        assert_eq!(*events.changes.borrow(), vec![(0, 8, 8), (0, 0, 4)]);
    }

    #[test]
    fn test_failed_write_reports_nothing() {
        let (_material, instance, events, _observer) = observed();
        instance.set_float("u_light.missing", 1.0);
        instance.set_mat4("u_light.intensity", glam::Mat4::IDENTITY);
        assert!(events.changes.borrow().is_empty());
    }

    #[test]
    fn test_destroying_fires_once() {
        let (material, instance, events, _observer) = observed();
        drop(material);
        assert_eq!(events.destroyed.get(), 1);
        drop(instance);
        assert_eq!(events.destroyed.get(), 1);
    }

    #[test]
    fn test_resolved_textures_empty_without_slots() {
        let (_material, instance, _events, _observer) = observed();
        assert!(instance.resolved_textures().is_empty());
        assert_eq!(instance.uniform_buffers()[0].slot, BindingSlot::new(1, 0));
    }
}
