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

//! Uniform storage layout derived from shader reflection, and named accessors over it.

use std::collections::HashMap;
use std::rc::Rc;

use bytemuck::Pod;
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::asset::{Asset, AssetId};
use crate::renderer::api::handle::BindingSlot;
use crate::renderer::api::reflection::BindingKind;
use crate::renderer::api::shader::Shader;

/// Where a named uniform member lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformMember {
    /// Index into the uniform buffer list.
    pub buffer_index: usize,
    /// Byte offset inside that buffer.
    pub offset: usize,
    /// Byte size of the member.
    pub size: usize,
}

/// A uniform block of the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockLayout {
    /// Name of the block in the shader.
    pub name: String,
    /// Where the block is bound.
    pub slot: BindingSlot,
    /// Byte size of the block.
    pub size: usize,
}

/// A named texture or sampler binding of the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlotLayout {
    /// Name of the binding in the shader.
    pub name: String,
    /// Where the binding lives.
    pub slot: BindingSlot,
}

/// The uniform blocks, texture slots and samplers a shader exposes, with a lookup table from
/// `"<block>.<member>"` to the byte range of each member.
///
/// A layout is immutable. Materials share it with the instances they create, so an instance
/// keeps the layout it was created with even when its material later switches shaders.
#[derive(Debug, Clone, Default)]
pub struct MaterialLayout {
    shader: Option<AssetId>,
    key: u64,
    blocks: Vec<UniformBlockLayout>,
    textures: Vec<ResourceSlotLayout>,
    samplers: Vec<ResourceSlotLayout>,
    members: HashMap<String, UniformMember>,
    texture_lookup: HashMap<String, usize>,
}

impl MaterialLayout {
    /// Builds the layout from the shader's current reflection.
    pub fn from_shader(shader: &Shader) -> Self {
        let reflection = shader.reflection();
        let mut layout = Self {
            shader: Some(shader.id()),
            key: shader.layout_key(),
            ..Self::default()
        };

        for binding in reflection.bindings() {
            let slot = BindingSlot::new(binding.set, binding.binding);
            match binding.kind {
                BindingKind::UniformBuffer => {
                    let buffer_index = layout.blocks.len();
                    for member in &binding.members {
                        layout.members.insert(
                            format!("{}.{}", binding.name, member.name),
                            UniformMember {
                                buffer_index,
                                offset: member.offset as usize,
                                size: member.size as usize,
                            },
                        );
                    }
                    layout.blocks.push(UniformBlockLayout {
                        name: binding.name.clone(),
                        slot,
                        size: binding.size as usize,
                    });
                }
                BindingKind::Texture => {
                    layout
                        .texture_lookup
                        .insert(binding.name.clone(), layout.textures.len());
                    layout.textures.push(ResourceSlotLayout {
                        name: binding.name.clone(),
                        slot,
                    });
                }
                BindingKind::Sampler => layout.samplers.push(ResourceSlotLayout {
                    name: binding.name.clone(),
                    slot,
                }),
                BindingKind::None => {}
            }
        }
        layout
    }

    /// The shader this layout was built from, if any.
    pub fn shader_id(&self) -> Option<AssetId> {
        self.shader
    }

    /// The shader layout key this layout was built from.
    pub fn layout_key(&self) -> u64 {
        self.key
    }

    /// Returns `true` if this layout still describes `shader`'s current bindings.
    pub fn matches(&self, shader: &Shader) -> bool {
        self.shader == Some(shader.id()) && self.key == shader.layout_key()
    }

    /// Uniform blocks in binding order.
    pub fn blocks(&self) -> &[UniformBlockLayout] {
        &self.blocks
    }

    /// Texture slots in binding order.
    pub fn textures(&self) -> &[ResourceSlotLayout] {
        &self.textures
    }

    /// Sampler bindings in binding order.
    pub fn samplers(&self) -> &[ResourceSlotLayout] {
        &self.samplers
    }

    /// Looks up a `"<block>.<member>"` name.
    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.get(name)
    }

    /// Iterates every member name with its location.
    pub fn members(&self) -> impl Iterator<Item = (&str, &UniformMember)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Index of the texture slot called `name`.
    pub fn texture_index(&self, name: &str) -> Option<usize> {
        self.texture_lookup.get(name).copied()
    }
}

/// Named read/write access to uniform values.
///
/// Implementors supply the layout and raw byte access; the named and typed accessors are
/// provided. A name missing from the layout logs a warning: writes become no-ops and reads
/// return zero.
pub trait UniformAccess {
    /// The layout names are resolved against.
    fn uniform_layout(&self) -> Rc<MaterialLayout>;

    /// Resolves a member name, warning when it is missing.
    fn uniform_member(&self, name: &str) -> Option<UniformMember> {
        let member = self.uniform_layout().member(name).copied();
        if member.is_none() {
            log::warn!("Uniform member '{name}' does not exist!");
        }
        member
    }

    /// Copies `member.size` bytes of the member out of storage.
    fn read_member(&self, member: &UniformMember) -> Vec<u8>;

    /// Writes `bytes` at the member's offset. `bytes` never exceeds `member.size`.
    fn write_member(&self, member: &UniformMember, bytes: &[u8]);

    /// Writes raw bytes at the start of a member.
    ///
    /// # Returns
    ///
    /// `false` if the member does not exist.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is larger than the member.
    fn set_data(&self, name: &str, bytes: &[u8]) -> bool {
        let Some(member) = self.uniform_member(name) else {
            return false;
        };
        assert!(
            bytes.len() <= member.size,
            "Uniform overflow! '{name}' holds {} bytes, got {}",
            member.size,
            bytes.len()
        );
        self.write_member(&member, bytes);
        true
    }

    /// Reads the raw bytes of a member, or `None` if it does not exist.
    fn get_data(&self, name: &str) -> Option<Vec<u8>> {
        self.uniform_member(name)
            .map(|member| self.read_member(&member))
    }

    /// Writes a value whose size must equal the member's reflected size.
    fn set<T: Pod>(&self, name: &str, value: T) -> bool
    where
        Self: Sized,
    {
        let Some(member) = self.uniform_member(name) else {
            return false;
        };
        if member.size != std::mem::size_of::<T>() {
            log::warn!(
                "Uniform member '{name}' is {} bytes, refusing a {} byte write",
                member.size,
                std::mem::size_of::<T>()
            );
            return false;
        }
        self.write_member(&member, bytemuck::bytes_of(&value));
        true
    }

    /// Reads a value whose size must equal the member's reflected size. Returns zero otherwise.
    fn get<T: Pod>(&self, name: &str) -> T
    where
        Self: Sized,
    {
        let Some(member) = self.uniform_member(name) else {
            return T::zeroed();
        };
        if member.size != std::mem::size_of::<T>() {
            log::warn!(
                "Uniform member '{name}' is {} bytes, cannot read it as {} bytes",
                member.size,
                std::mem::size_of::<T>()
            );
            return T::zeroed();
        }
        bytemuck::pod_read_unaligned(&self.read_member(&member))
    }

    /// Writes an `f32`.
    fn set_float(&self, name: &str, value: f32) -> bool
    where
        Self: Sized,
    {
        self.set(name, value)
    }

    /// Reads an `f32`.
    fn get_float(&self, name: &str) -> f32
    where
        Self: Sized,
    {
        self.get(name)
    }

    /// Writes a `vec2<f32>`.
    fn set_float2(&self, name: &str, value: Vec2) -> bool
    where
        Self: Sized,
    {
        self.set(name, value)
    }

    /// Reads a `vec2<f32>`.
    fn get_float2(&self, name: &str) -> Vec2
    where
        Self: Sized,
    {
        self.get(name)
    }

    /// Writes a `vec3<f32>`.
    fn set_float3(&self, name: &str, value: Vec3) -> bool
    where
        Self: Sized,
    {
        self.set(name, value)
    }

    /// Reads a `vec3<f32>`.
    fn get_float3(&self, name: &str) -> Vec3
    where
        Self: Sized,
    {
        self.get(name)
    }

    /// Writes a `vec4<f32>`.
    fn set_float4(&self, name: &str, value: Vec4) -> bool
    where
        Self: Sized,
    {
        self.set(name, value)
    }

    /// Reads a `vec4<f32>`.
    fn get_float4(&self, name: &str) -> Vec4
    where
        Self: Sized,
    {
        self.get(name)
    }

    /// Writes an `i32`.
    fn set_int(&self, name: &str, value: i32) -> bool
    where
        Self: Sized,
    {
        self.set(name, value)
    }

    /// Reads an `i32`.
    fn get_int(&self, name: &str) -> i32
    where
        Self: Sized,
    {
        self.get(name)
    }

    /// Writes a `u32`.
    fn set_uint(&self, name: &str, value: u32) -> bool
    where
        Self: Sized,
    {
        self.set(name, value)
    }

    /// Reads a `u32`.
    fn get_uint(&self, name: &str) -> u32
    where
        Self: Sized,
    {
        self.get(name)
    }

    /// Writes a column-major `mat4x4<f32>`.
    fn set_mat4(&self, name: &str, value: Mat4) -> bool
    where
        Self: Sized,
    {
        self.set(name, value)
    }

    /// Reads a column-major `mat4x4<f32>`.
    fn get_mat4(&self, name: &str) -> Mat4
    where
        Self: Sized,
    {
        self.get(name)
    }
}
