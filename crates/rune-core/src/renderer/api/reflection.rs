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

//! Shader reflection: recovering the binding layout of compiled shader code.
//!
//! Reflection walks the global resources of each stage with `naga` and produces a
//! [`ReflectionData`]: an ordered list of sets, each holding its bindings indexed by slot.
//! Slots a stage does not declare are kept as default entries (kind [`BindingKind::None`])
//! so `sets[s].bindings[b]` is always a valid lookup for any declared `b`.
//!
//! Stages are merged by `(set, binding)`. A malformed module yields an empty
//! [`ReflectionData`] and an error in the log; callers end up with a material that has no
//! settable uniforms instead of a crash.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use naga::{AddressSpace, Module, TypeInner};

use crate::renderer::api::shader::{ShaderStage, ShaderStageCode};
use crate::renderer::error::ShaderError;

/// What kind of resource a binding slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingKind {
    /// An empty slot, or a resource type the material system does not manage.
    #[default]
    None,
    /// A uniform buffer block with named members.
    UniformBuffer,
    /// A sampled texture (or combined image sampler).
    Texture,
    /// A separate sampler object.
    Sampler,
}

/// One named member of a uniform block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ReflectedMember {
    /// Member name as declared in the block.
    pub name: String,
    /// Byte offset from the start of the block.
    pub offset: u32,
    /// Declared byte size of the member.
    pub size: u32,
}

impl ReflectedMember {
    /// One past the last byte of the member.
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// One resource slot declared by the shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ReflectedBinding {
    /// Descriptor set (bind group) index.
    pub set: u32,
    /// Binding index inside the set.
    pub binding: u32,
    /// Variable name, or the block type name for anonymous blocks.
    pub name: String,
    /// Resource kind.
    pub kind: BindingKind,
    /// Total byte size for uniform buffers, zero otherwise.
    pub size: u32,
    /// Members of a uniform block, ordered by offset.
    pub members: Vec<ReflectedMember>,
}

/// All bindings of one descriptor set, indexed by binding slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReflectedSet {
    /// The set index.
    pub set: u32,
    /// Bindings indexed by slot. Undeclared slots have kind [`BindingKind::None`].
    pub bindings: Vec<ReflectedBinding>,
}

/// The merged binding layout of a shader.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReflectionData {
    /// Sets indexed by set number.
    pub sets: Vec<ReflectedSet>,
    /// Name of the vertex entry point, if one was found.
    pub vertex_entry: Option<String>,
    /// Name of the fragment entry point, if one was found.
    pub fragment_entry: Option<String>,
}

impl ReflectionData {
    /// Returns `true` if no binding slot holds a resource.
    pub fn is_empty(&self) -> bool {
        self.bindings().next().is_none()
    }

    /// Iterates over every declared (non-`None`) binding, in set then slot order.
    pub fn bindings(&self) -> impl Iterator<Item = &ReflectedBinding> {
        self.sets
            .iter()
            .flat_map(|set| set.bindings.iter())
            .filter(|b| b.kind != BindingKind::None)
    }

    /// Hash of every declared binding with its members.
    ///
    /// Two reflections with the same key expose the same blocks, member offsets and resource
    /// slots, so anything laid out from one can be bound against the other.
    pub fn layout_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for binding in self.bindings() {
            binding.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Looks up the binding at `(set, binding)`.
    pub fn binding(&self, set: u32, binding: u32) -> Option<&ReflectedBinding> {
        self.sets
            .get(set as usize)?
            .bindings
            .get(binding as usize)
    }

    /// Looks up a declared binding by name.
    pub fn find(&self, name: &str) -> Option<&ReflectedBinding> {
        self.bindings().find(|b| b.name == name)
    }

    /// The entry point name recorded for `stage`.
    pub fn entry_point(&self, stage: ShaderStage) -> Option<&str> {
        match stage {
            ShaderStage::Vertex => self.vertex_entry.as_deref(),
            ShaderStage::Fragment => self.fragment_entry.as_deref(),
        }
    }

    /// Inserts `incoming` at its `(set, binding)` address, merging with what is already there.
    ///
    /// Sets and slots grow as needed. An empty slot is overwritten. Two uniform blocks at the
    /// same address are merged member by member (same name overwrites, new names append) and
    /// the block grows to the larger size. A kind conflict keeps the existing binding.
    pub fn insert(&mut self, incoming: ReflectedBinding) {
        let set_index = incoming.set as usize;
        while self.sets.len() <= set_index {
            let set = self.sets.len() as u32;
            self.sets.push(ReflectedSet {
                set,
                bindings: Vec::new(),
            });
        }
        let set = &mut self.sets[set_index];
        let slot_index = incoming.binding as usize;
        while set.bindings.len() <= slot_index {
            let binding = set.bindings.len() as u32;
            set.bindings.push(ReflectedBinding {
                set: set.set,
                binding,
                ..Default::default()
            });
        }

        let slot = &mut set.bindings[slot_index];
        if slot.kind == BindingKind::None {
            *slot = incoming;
        } else if slot.kind == incoming.kind {
            if slot.name.is_empty() {
                slot.name = incoming.name;
            }
            for member in incoming.members {
                match slot.members.iter_mut().find(|m| m.name == member.name) {
                    Some(existing) => *existing = member,
                    None => slot.members.push(member),
                }
            }
            slot.members.sort_by_key(|m| m.offset);
            slot.size = slot.size.max(incoming.size);
        } else {
            log::warn!(
                "Shader reflection: binding ({}, {}) declared as {:?} and {:?}; keeping {:?}",
                slot.set,
                slot.binding,
                slot.kind,
                incoming.kind,
                slot.kind
            );
            return;
        }

        let members_end = slot.members.iter().map(ReflectedMember::end).max();
        if let Some(end) = members_end {
            slot.size = slot.size.max(end);
        }
    }

    /// Merges every binding and entry point of `other` into `self`.
    pub fn merge(&mut self, other: ReflectionData) {
        for binding in other.sets.into_iter().flat_map(|s| s.bindings) {
            if binding.kind != BindingKind::None {
                self.insert(binding);
            }
        }
        if self.vertex_entry.is_none() {
            self.vertex_entry = other.vertex_entry;
        }
        if self.fragment_entry.is_none() {
            self.fragment_entry = other.fragment_entry;
        }
    }
}

/// Parses a single stage's code into a naga module.
pub fn parse_stage(stage: ShaderStage, code: &ShaderStageCode) -> Result<Module, ShaderError> {
    match code {
        ShaderStageCode::Wgsl(source) => {
            naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::ParseFailed {
                stage: stage.name(),
                details: e.emit_to_string(source),
            })
        }
        ShaderStageCode::SpirV(bytes) => {
            naga::front::spv::parse_u8_slice(bytes, &naga::front::spv::Options::default())
                .map_err(|e| ShaderError::ParseFailed {
                    stage: stage.name(),
                    details: e.to_string(),
                })
        }
    }
}

/// Reflects the resources of one stage.
pub fn reflect_stage(
    stage: ShaderStage,
    code: &ShaderStageCode,
) -> Result<ReflectionData, ShaderError> {
    let module = parse_stage(stage, code)?;
    Ok(reflect_module(stage, &module))
}

/// Reflects a vertex and a fragment stage and merges the results.
///
/// Any stage that fails to parse makes the whole result empty.
pub fn reflect_shader(vertex: &ShaderStageCode, fragment: &ShaderStageCode) -> ReflectionData {
    let stages = [
        (ShaderStage::Vertex, vertex),
        (ShaderStage::Fragment, fragment),
    ];
    let mut data = ReflectionData::default();
    for (stage, code) in stages {
        match reflect_stage(stage, code) {
            Ok(stage_data) => data.merge(stage_data),
            Err(e) => {
                log::error!("Failed to reflect shader code! {e}");
                return ReflectionData::default();
            }
        }
    }
    data
}

fn reflect_module(stage: ShaderStage, module: &Module) -> ReflectionData {
    let ctx = module.to_ctx();
    let mut data = ReflectionData::default();

    for (_, var) in module.global_variables.iter() {
        let Some(address) = &var.binding else {
            continue;
        };
        let ty = &module.types[var.ty];
        let name = var
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| ty.name.clone())
            .unwrap_or_default();

        let mut binding = ReflectedBinding {
            set: address.group,
            binding: address.binding,
            name,
            ..Default::default()
        };

        match var.space {
            AddressSpace::Uniform => {
                binding.kind = BindingKind::UniformBuffer;
                binding.size = ty.inner.size(ctx);
                if let TypeInner::Struct { members, .. } = &ty.inner {
                    binding.members = members
                        .iter()
                        .map(|m| ReflectedMember {
                            name: m.name.clone().unwrap_or_default(),
                            offset: m.offset,
                            size: module.types[m.ty].inner.size(ctx),
                        })
                        .collect();
                }
            }
            AddressSpace::Handle => {
                binding.kind = match ty.inner {
                    TypeInner::Image { .. } => BindingKind::Texture,
                    TypeInner::Sampler { .. } => BindingKind::Sampler,
                    _ => BindingKind::None,
                };
            }
            _ => {}
        }

        if binding.kind == BindingKind::None {
            log::debug!(
                "Shader reflection: skipping unmanaged resource '{}' at ({}, {})",
                binding.name,
                binding.set,
                binding.binding
            );
            continue;
        }
        data.insert(binding);
    }

    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga_stage)
        .map(|ep| ep.name.clone());
    match stage {
        ShaderStage::Vertex => data.vertex_entry = entry,
        ShaderStage::Fragment => data.fragment_entry = entry,
    }

    data
}
