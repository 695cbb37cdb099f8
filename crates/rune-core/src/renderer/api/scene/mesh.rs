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

//! Defines data structures for mesh representation.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use glam::{Vec2, Vec3};

use crate::asset::{Asset, AssetId};
use crate::renderer::api::util::MeshTopology;
use crate::renderer::observer::{MeshObserver, ObserverList};

/// One interleaved vertex as uploaded to the GPU.
///
/// Shader locations: `0` position, `1` uv, `2` normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: Vec3,
    /// Texture coordinates.
    pub uv: Vec2,
    /// Object-space normal.
    pub normal: Vec3,
}

impl Vertex {
    /// Size of one vertex in bytes.
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    /// Creates a vertex.
    pub const fn new(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self {
            position,
            uv,
            normal,
        }
    }
}

/// A contiguous range of a mesh's index buffer drawn on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Submesh {
    /// First index of the range.
    pub first_index: u32,
    /// Number of indices in the range.
    pub index_count: u32,
}

impl Submesh {
    /// Creates a range.
    pub const fn new(first_index: u32, index_count: u32) -> Self {
        Self {
            first_index,
            index_count,
        }
    }
}

#[derive(Debug, Default)]
struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    topology: MeshTopology,
    submeshes: Vec<Submesh>,
}

/// A mesh asset: vertices, 16-bit indices and submesh ranges.
///
/// Edits are staged. Backends only see them once [`Mesh::apply`] is called.
pub struct Mesh {
    id: AssetId,
    data: RefCell<MeshData>,
    observers: ObserverList<dyn MeshObserver>,
}

impl Mesh {
    /// Creates an empty mesh.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            id: AssetId::new(),
            data: RefCell::new(MeshData::default()),
            observers: ObserverList::new(),
        })
    }

    /// Creates a mesh from geometry. A single submesh covers every index.
    pub fn with_geometry(
        vertices: Vec<Vertex>,
        indices: Vec<u16>,
        topology: MeshTopology,
    ) -> Rc<Self> {
        let mesh = Self::new();
        let index_count = indices.len() as u32;
        mesh.set_vertices(vertices);
        mesh.set_indices(indices, topology);
        mesh.set_submesh(0, Submesh::new(0, index_count));
        mesh
    }

    /// Replaces the vertices.
    pub fn set_vertices(&self, vertices: Vec<Vertex>) {
        self.data.borrow_mut().vertices = vertices;
    }

    /// Replaces the indices and how they are assembled.
    pub fn set_indices(&self, indices: Vec<u16>, topology: MeshTopology) {
        let mut data = self.data.borrow_mut();
        data.indices = indices;
        data.topology = topology;
    }

    /// Stores `submesh` at slot `index`, growing the slot array with empty ranges as needed.
    pub fn set_submesh(&self, index: usize, submesh: Submesh) {
        let mut data = self.data.borrow_mut();
        if index >= data.submeshes.len() {
            data.submeshes.resize(index + 1, Submesh::default());
        }
        data.submeshes[index] = submesh;
    }

    /// The submesh at slot `index`.
    pub fn submesh(&self, index: usize) -> Option<Submesh> {
        self.data.borrow().submeshes.get(index).copied()
    }

    /// Number of submesh slots.
    pub fn submesh_count(&self) -> usize {
        self.data.borrow().submeshes.len()
    }

    /// The vertices.
    pub fn vertices(&self) -> Ref<'_, [Vertex]> {
        Ref::map(self.data.borrow(), |d| d.vertices.as_slice())
    }

    /// The indices.
    pub fn indices(&self) -> Ref<'_, [u16]> {
        Ref::map(self.data.borrow(), |d| d.indices.as_slice())
    }

    /// How indices are assembled into primitives.
    pub fn topology(&self) -> MeshTopology {
        self.data.borrow().topology
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.data.borrow().vertices.len()
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.data.borrow().indices.len()
    }

    /// Publishes staged edits to observers.
    pub fn apply(&self) {
        self.observers.notify(|o| o.mesh_changed(self));
    }

    /// Subscribes an observer.
    pub fn attach_observer(&self, observer: Weak<dyn MeshObserver>) {
        self.observers.attach(observer);
    }

    /// Unsubscribes an observer.
    pub fn detach_observer(&self, observer: &Weak<dyn MeshObserver>) {
        self.observers.detach(observer);
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Asset for Mesh {
    fn id(&self) -> AssetId {
        self.id
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Mesh")
            .field("id", &self.id)
            .field("vertices", &data.vertices.len())
            .field("indices", &data.indices.len())
            .field("topology", &data.topology)
            .finish_non_exhaustive()
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.observers.notify(|o| o.mesh_destroying(self));
    }
}
