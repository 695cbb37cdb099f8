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

//! Binding state of the frame being recorded, shared by every backend.

use std::collections::BTreeMap;
use std::rc::Rc;

use rune_core::asset::{Asset, AssetId};
use rune_core::renderer::{
    BindingSlot, BufferHandle, BufferRange, GpuMirrors, GpuResources, MaterialFlags,
    MaterialHandle, MaterialInst, Mesh, MeshHandle, MeshMirror, MeshTopology, PreparedMaterial,
    RenderStats, ResourceError, Submesh, TextureHandle,
};

/// One draw with every binding resolved to a backend handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    /// Program of the bound material.
    pub material: MaterialHandle,
    /// Fixed-function state of the bound material.
    pub flags: MaterialFlags,
    /// The bound mesh.
    pub mesh: MeshHandle,
    /// Topology of the bound mesh.
    pub topology: MeshTopology,
    /// First index drawn.
    pub first_index: u32,
    /// Number of indices drawn.
    pub index_count: u32,
    /// Uniform buffers by slot. `None` ranges cover the whole buffer.
    pub uniforms: Vec<(BindingSlot, BufferHandle, Option<BufferRange>)>,
    /// Textures by slot. `None` means the slot falls back to the default texture.
    pub textures: Vec<(BindingSlot, Option<TextureHandle>)>,
    /// Sampler slots.
    pub samplers: Vec<BindingSlot>,
}

impl DrawCall {
    /// The uniform buffer bound at `slot`.
    pub fn uniform(&self, slot: BindingSlot) -> Option<(BufferHandle, Option<BufferRange>)> {
        self.uniforms
            .iter()
            .find(|(s, _, _)| *s == slot)
            .map(|&(_, handle, range)| (handle, range))
    }
}

struct BoundMaterial {
    id: AssetId,
    generation: u64,
    prepared: PreparedMaterial,
}

struct BoundMesh {
    id: AssetId,
    generation: u64,
    mirror: MeshMirror,
}

#[derive(Default)]
pub(crate) struct FrameBindings {
    material: Option<BoundMaterial>,
    mesh: Option<BoundMesh>,
    uniforms: BTreeMap<BindingSlot, (BufferHandle, Option<BufferRange>)>,
    stats: RenderStats,
}

impl FrameBindings {
    /// Forgets every binding and starts counting for `frame_number`.
    pub(crate) fn begin(&mut self, frame_number: u64) {
        self.forget();
        self.stats = RenderStats {
            frame_number,
            ..RenderStats::default()
        };
    }

    /// Forgets every binding but keeps the counters.
    pub(crate) fn forget(&mut self) {
        self.material = None;
        self.mesh = None;
        self.uniforms.clear();
    }

    pub(crate) fn stats(&self) -> RenderStats {
        self.stats
    }

    pub(crate) fn count_draw(&mut self, call: &DrawCall) {
        self.stats.draw_calls += 1;
        if call.topology == MeshTopology::Triangles {
            self.stats.triangles += call.topology.primitive_count(call.index_count);
        }
    }

    pub(crate) fn count_skipped(&mut self) {
        self.stats.skipped += 1;
    }

    pub(crate) fn bind_uniform(
        &mut self,
        handle: BufferHandle,
        slot: BindingSlot,
        range: Option<BufferRange>,
    ) {
        self.uniforms.insert(slot, (handle, range));
    }

    /// Returns `true` if `instance` was not already bound.
    pub(crate) fn bind_material<R: GpuResources + ?Sized>(
        &mut self,
        mirrors: &mut GpuMirrors,
        resources: &mut R,
        instance: &Rc<MaterialInst>,
    ) -> Result<bool, ResourceError> {
        let id = instance.id();
        if let Some(bound) = &self.material {
            if bound.id == id && bound.generation == mirrors.generation() {
                return Ok(false);
            }
        }
        self.material = None;
        let prepared = mirrors.prepare_material(resources, instance)?;
        self.material = Some(BoundMaterial {
            id,
            generation: mirrors.generation(),
            prepared,
        });
        Ok(true)
    }

    /// Returns `true` if `mesh` was not already bound.
    pub(crate) fn bind_mesh<R: GpuResources + ?Sized>(
        &mut self,
        mirrors: &mut GpuMirrors,
        resources: &mut R,
        mesh: &Rc<Mesh>,
    ) -> Result<bool, ResourceError> {
        let id = mesh.id();
        if let Some(bound) = &self.mesh {
            if bound.id == id && bound.generation == mirrors.generation() {
                return Ok(false);
            }
        }
        self.mesh = None;
        let mirror = mirrors.prepare_mesh(resources, mesh)?.clone();
        self.mesh = Some(BoundMesh {
            id,
            generation: mirrors.generation(),
            mirror,
        });
        Ok(true)
    }

    /// Resolves a draw of `submesh`, or of the whole mesh.
    ///
    /// Returns `None` when nothing would be rasterized.
    ///
    /// # Panics
    ///
    /// Panics if no material or no mesh is bound.
    pub(crate) fn draw(&mut self, submesh: Option<Submesh>) -> Option<DrawCall> {
        let Some(material) = &self.material else {
            panic!("draw issued without a bound material");
        };
        let Some(mesh) = &self.mesh else {
            panic!("draw issued without a bound mesh");
        };

        let total = mesh.mirror.index_count;
        let (first_index, index_count) = match submesh {
            Some(range) => {
                let first = range.first_index.min(total);
                (first, range.index_count.min(total - first))
            }
            None => (0, total),
        };
        let topology = mesh.mirror.topology;
        if index_count == 0 || topology.primitive_count(index_count) == 0 {
            return None;
        }

        let prepared = &material.prepared;
        let mut uniforms: BTreeMap<BindingSlot, (BufferHandle, Option<BufferRange>)> = prepared
            .uniform_buffers
            .iter()
            .map(|&(slot, handle)| (slot, (handle, None)))
            .collect();
        uniforms.extend(self.uniforms.iter().map(|(slot, binding)| (*slot, *binding)));

        Some(DrawCall {
            material: prepared.material,
            flags: prepared.flags,
            mesh: mesh.mirror.handle,
            topology,
            first_index,
            index_count,
            uniforms: uniforms
                .into_iter()
                .map(|(slot, (handle, range))| (slot, handle, range))
                .collect(),
            textures: prepared.textures.clone(),
            samplers: prepared.samplers.clone(),
        })
    }
}
