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

//! Defines the material asset: uniform storage and texture slots laid out from a shader.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use crate::asset::{Asset, AssetId};
use crate::renderer::api::handle::BindingSlot;
use crate::renderer::api::material_inst::MaterialInst;
use crate::renderer::api::shader::Shader;
use crate::renderer::api::texture::Texture;
use crate::renderer::api::uniform::{MaterialLayout, UniformAccess, UniformMember};
use crate::renderer::api::util::MaterialFlags;
use crate::utils::Buffer;

/// CPU storage of one uniform block.
#[derive(Debug, Clone)]
pub struct UniformBuffer {
    /// Where the block is bound.
    pub slot: BindingSlot,
    /// The block's bytes.
    pub buffer: Buffer,
}

/// A named texture binding. The texture is not owned.
#[derive(Debug, Clone)]
pub struct TextureSlot {
    /// Name of the binding in the shader.
    pub name: String,
    /// Where the texture is bound.
    pub slot: BindingSlot,
    /// The bound texture, if any.
    pub texture: Weak<Texture>,
}

impl TextureSlot {
    /// The bound texture, if it is still alive.
    pub fn texture(&self) -> Option<Rc<Texture>> {
        self.texture.upgrade()
    }
}

/// Allocates zeroed uniform buffers and empty texture slots for `layout`.
pub(crate) fn allocate_storage(layout: &MaterialLayout) -> (Vec<UniformBuffer>, Vec<TextureSlot>) {
    let buffers = layout
        .blocks()
        .iter()
        .map(|block| UniformBuffer {
            slot: block.slot,
            buffer: Buffer::with_size(block.size),
        })
        .collect();
    let textures = layout
        .textures()
        .iter()
        .map(|slot| TextureSlot {
            name: slot.name.clone(),
            slot: slot.slot,
            texture: Weak::new(),
        })
        .collect();
    (buffers, textures)
}

pub(crate) struct MaterialState {
    pub(crate) shader: Weak<Shader>,
    pub(crate) layout: Rc<MaterialLayout>,
    pub(crate) buffers: Vec<UniformBuffer>,
    pub(crate) textures: Vec<TextureSlot>,
    pub(crate) flags: MaterialFlags,
    default_instance: Rc<MaterialInst>,
    instances: Vec<Rc<MaterialInst>>,
}

/// A material asset.
///
/// Holds the default uniform values and textures for a shader. Scene code renders through
/// [`MaterialInst`]s: the default instance, or instances created with
/// [`Material::create_instance`]. Instances are owned by their material and released with it.
pub struct Material {
    id: AssetId,
    name: String,
    me: Weak<Material>,
    state: RefCell<MaterialState>,
}

impl Material {
    /// Creates a material without a shader. Its layout is empty until
    /// [`Material::set_shader`] is called.
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Material>| {
            let layout = Rc::new(MaterialLayout::default());
            let flags = MaterialFlags::default();
            let default_instance = MaterialInst::spawn(
                me.clone(),
                Weak::new(),
                layout.clone(),
                Vec::new(),
                Vec::new(),
                flags,
            );
            Self {
                id: AssetId::new(),
                name: name.into(),
                me: me.clone(),
                state: RefCell::new(MaterialState {
                    shader: Weak::new(),
                    layout,
                    buffers: Vec::new(),
                    textures: Vec::new(),
                    flags,
                    default_instance,
                    instances: Vec::new(),
                }),
            }
        })
    }

    /// Creates a material laid out from `shader`.
    pub fn with_shader(name: impl Into<String>, shader: &Rc<Shader>) -> Rc<Self> {
        let material = Self::new(name);
        material.set_shader(shader);
        material
    }

    /// A debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shader, if it is still alive.
    pub fn shader(&self) -> Option<Rc<Shader>> {
        self.state.borrow().shader.upgrade()
    }

    /// Lays the material out from `shader`'s reflection.
    ///
    /// Uniform buffers are reallocated zeroed and texture slots start empty. The default
    /// instance is released and recreated. Instances created earlier keep the layout they
    /// were created with.
    pub fn set_shader(&self, shader: &Rc<Shader>) {
        let layout = Rc::new(MaterialLayout::from_shader(shader));
        let (buffers, textures) = allocate_storage(&layout);

        let previous = {
            let mut state = self.state.borrow_mut();
            state.shader = Rc::downgrade(shader);
            state.layout = layout;
            state.buffers = buffers;
            state.textures = textures;
            if !state.instances.is_empty() {
                log::warn!(
                    "Material '{}': shader changed to '{}' while {} instance(s) keep the previous layout",
                    self.name,
                    shader.name(),
                    state.instances.len()
                );
            }
            let fresh = self.spawn_from(&state);
            std::mem::replace(&mut state.default_instance, fresh)
        };
        previous.release();
    }

    /// The layout shared with the default instance.
    pub fn layout(&self) -> Rc<MaterialLayout> {
        self.state.borrow().layout.clone()
    }

    /// The fixed-function state.
    pub fn flags(&self) -> MaterialFlags {
        self.state.borrow().flags
    }

    /// Replaces the fixed-function state of the material and every instance.
    pub fn set_flags(&self, flags: MaterialFlags) {
        let mut state = self.state.borrow_mut();
        state.flags = flags;
        state.default_instance.set_flags(flags);
        for instance in &state.instances {
            instance.set_flags(flags);
        }
    }

    /// Sets or clears some flags.
    pub fn set_flag(&self, flag: MaterialFlags, enabled: bool) {
        let mut flags = self.flags();
        flags.set(flag, enabled);
        self.set_flags(flags);
    }

    /// The instance created along with the current layout.
    pub fn default_instance(&self) -> Rc<MaterialInst> {
        self.state.borrow().default_instance.clone()
    }

    /// Creates an instance holding a copy of the current values and textures.
    pub fn create_instance(&self) -> Rc<MaterialInst> {
        let instance = {
            let state = self.state.borrow();
            self.spawn_from(&state)
        };
        self.state.borrow_mut().instances.push(instance.clone());
        instance
    }

    /// Releases an instance created by this material.
    ///
    /// Returns `false` if `instance` was not created by [`Material::create_instance`].
    pub fn destroy_instance(&self, instance: &Rc<MaterialInst>) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            state
                .instances
                .iter()
                .position(|i| Rc::ptr_eq(i, instance))
                .map(|index| state.instances.remove(index))
        };
        match removed {
            Some(instance) => {
                instance.release();
                true
            }
            None => false,
        }
    }

    /// Number of instances created with [`Material::create_instance`] and not yet destroyed.
    pub fn instance_count(&self) -> usize {
        self.state.borrow().instances.len()
    }

    /// Binds a texture to the slot called `name`.
    ///
    /// Returns `false`, leaving every slot unchanged, if the slot does not exist.
    pub fn set_texture(&self, name: &str, texture: &Rc<Texture>) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(index) = state.layout.texture_index(name) else {
            log::warn!("Uniform texture '{name}' does not exist!");
            return false;
        };
        state.textures[index].texture = Rc::downgrade(texture);
        true
    }

    /// The texture bound to the slot called `name`.
    pub fn texture(&self, name: &str) -> Option<Rc<Texture>> {
        let state = self.state.borrow();
        let index = state.layout.texture_index(name)?;
        state.textures[index].texture()
    }

    /// The uniform buffers holding default values.
    pub fn uniform_buffers(&self) -> Ref<'_, [UniformBuffer]> {
        Ref::map(self.state.borrow(), |s| s.buffers.as_slice())
    }

    /// The texture slots.
    pub fn texture_slots(&self) -> Ref<'_, [TextureSlot]> {
        Ref::map(self.state.borrow(), |s| s.textures.as_slice())
    }

    fn spawn_from(&self, state: &MaterialState) -> Rc<MaterialInst> {
        MaterialInst::spawn(
            self.me.clone(),
            state.shader.clone(),
            state.layout.clone(),
            state.buffers.clone(),
            state.textures.clone(),
            state.flags,
        )
    }
}

impl UniformAccess for Material {
    fn uniform_layout(&self) -> Rc<MaterialLayout> {
        self.layout()
    }

    fn read_member(&self, member: &UniformMember) -> Vec<u8> {
        self.state.borrow().buffers[member.buffer_index]
            .buffer
            .read_bytes(member.offset, member.size)
            .to_vec()
    }

    fn write_member(&self, member: &UniformMember, bytes: &[u8]) {
        self.state.borrow_mut().buffers[member.buffer_index]
            .buffer
            .write_bytes(member.offset, bytes);
    }
}

impl Asset for Material {
    fn id(&self) -> AssetId {
        self.id
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Material")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("flags", &state.flags)
            .field("instances", &state.instances.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.default_instance.release();
        for instance in state.instances.drain(..) {
            instance.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::texture::TextureFormat;
    use glam::Vec4;

    const MAT_SRC: &str = r#"
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

    const OTHER_SRC: &str = r#"
struct Other {
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> u_other: Other;
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return u_other.tint; }
@fragment
fn fs_main() -> @location(0) vec4<f32> { return u_other.tint; }
"#;

    fn white() -> Rc<Texture> {
        Texture::new(1, 1, TextureFormat::Rgba, vec![255; 4]).unwrap()
    }

    #[test]
    fn test_uniform_before_shader_is_noop() {
        let material = Material::new("empty");
        assert!(!material.set_float("u_mat.shininess", 1.0));
        assert_eq!(material.get_float("u_mat.shininess"), 0.0);
        assert!(material.uniform_buffers().is_empty());
    }

    #[test]
    fn test_set_color_leaves_neighbours_untouched() {
        let shader = Shader::from_wgsl("mat", MAT_SRC);
        let material = Material::with_shader("mat", &shader);

        assert!(material.set_float4("u_mat.color", Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(material.get_float4("u_mat.color"), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(material.uniform_buffers()[0].buffer.read_bytes(16, 4), &[0; 4]);
        assert_eq!(material.uniform_buffers()[0].slot, BindingSlot::new(0, 2));
    }

    #[test]
    fn test_instances_are_independent() {
        let shader = Shader::from_wgsl("mat", MAT_SRC);
        let material = Material::with_shader("mat", &shader);
        material.set_float("u_mat.shininess", 8.0);

        let a = material.create_instance();
        let b = material.create_instance();
        a.set_float("u_mat.shininess", 32.0);

        assert_eq!(a.get_float("u_mat.shininess"), 32.0);
        assert_eq!(b.get_float("u_mat.shininess"), 8.0);
        assert_eq!(material.get_float("u_mat.shininess"), 8.0);
        assert_eq!(material.default_instance().get_float("u_mat.shininess"), 0.0);
        assert_eq!(material.instance_count(), 2);
    }

    #[test]
    fn test_instance_keeps_layout_after_shader_swap() {
        let a = Shader::from_wgsl("a", MAT_SRC);
        let b = Shader::from_wgsl("b", OTHER_SRC);
        let material = Material::with_shader("swap", &a);
        let instance = material.create_instance();
        let old_default = material.default_instance();

        material.set_shader(&b);

        assert!(instance.uniform_layout().member("u_mat.color").is_some());
        assert!(instance.uniform_layout().member("u_other.tint").is_none());
        assert!(material.layout().member("u_other.tint").is_some());
        assert!(old_default.is_released());
        assert!(!instance.is_released());
        assert!(!Rc::ptr_eq(&old_default, &material.default_instance()));
    }

    #[test]
    fn test_unknown_texture_slot_changes_nothing() {
        let shader = Shader::from_wgsl("mat", MAT_SRC);
        let material = Material::with_shader("mat", &shader);
        let diffuse = white();
        assert!(material.set_texture("t_diffuse", &diffuse));

        let other = white();
        assert!(!material.set_texture("t_missing", &other));

        let slots = material.texture_slots();
        assert_eq!(slots.len(), 1);
        assert!(Rc::ptr_eq(&slots[0].texture().unwrap(), &diffuse));
    }

    #[test]
    fn test_instance_texture_falls_back_to_material() {
        let shader = Shader::from_wgsl("mat", MAT_SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        let diffuse = white();
        material.set_texture("t_diffuse", &diffuse);

        assert!(Rc::ptr_eq(&instance.texture("t_diffuse").unwrap(), &diffuse));

        let own = white();
        instance.set_texture("t_diffuse", &own);
        assert!(Rc::ptr_eq(&instance.texture("t_diffuse").unwrap(), &own));
    }

    #[test]
    fn test_flags_reach_instances() {
        let shader = Shader::from_wgsl("mat", MAT_SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        material.set_flag(MaterialFlags::TRANSPARENT, true);
        assert!(instance.flags().contains(MaterialFlags::TRANSPARENT));
        assert!(material
            .default_instance()
            .flags()
            .contains(MaterialFlags::DEPTH_TEST | MaterialFlags::TRANSPARENT));
    }

    #[test]
    fn test_dropping_material_releases_instances() {
        let shader = Shader::from_wgsl("mat", MAT_SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        let default = material.default_instance();
        drop(material);
        assert!(instance.is_released());
        assert!(default.is_released());
        assert!(instance.material().is_none());
    }

    #[test]
    fn test_destroy_instance() {
        let shader = Shader::from_wgsl("mat", MAT_SRC);
        let material = Material::with_shader("mat", &shader);
        let instance = material.create_instance();
        assert!(material.destroy_instance(&instance));
        assert!(instance.is_released());
        assert!(!material.destroy_instance(&instance));
        assert!(!material.destroy_instance(&material.default_instance()));
    }
}
