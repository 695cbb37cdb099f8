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

//! Sortable lists of pending draw calls.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Mat4;

use crate::asset::{Asset, AssetId};
use crate::renderer::api::material_inst::MaterialInst;
use crate::renderer::api::scene::{Mesh, Submesh};
use crate::renderer::api::util::MaterialFlags;

const ORDINAL_MASK: u64 = 0xFF_FFFF;

/// The render pass a draw belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    /// Depth-only pass for shadow casters. Collected but not rendered yet.
    Shadow,
    /// The main lit pass.
    Geometry,
}

/// Packs the sort key of a draw.
///
/// Opaque draws come first, then draws are grouped by material and then by mesh so
/// consecutive entries share as much bound state as possible.
pub const fn sort_key(transparent: bool, material: u32, mesh: u32) -> u64 {
    ((transparent as u64) << 48)
        | ((material as u64 & ORDINAL_MASK) << 24)
        | (mesh as u64 & ORDINAL_MASK)
}

/// One pending draw.
#[derive(Debug, Clone)]
pub struct DrawEntry {
    /// Key the bucket is sorted by.
    pub sort_key: u64,
    /// Object to world transform.
    pub world: Mat4,
    /// The geometry drawn.
    pub mesh: Rc<Mesh>,
    /// The material instance drawn with.
    pub instance: Rc<MaterialInst>,
    /// Index range, or the whole mesh when `None`.
    pub submesh: Option<Submesh>,
}

/// Pending draws of one pass.
#[derive(Debug, Default)]
pub struct DrawBucket {
    entries: Vec<DrawEntry>,
}

impl DrawBucket {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a draw.
    pub fn push(&mut self, entry: DrawEntry) {
        self.entries.push(entry);
    }

    /// Sorts by key. Draws with equal keys keep their submission order.
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.sort_key);
    }

    /// The draws in their current order.
    pub fn entries(&self) -> &[DrawEntry] {
        &self.entries
    }

    /// Number of pending draws.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was submitted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending draw and the references it held.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Assigns small per-frame ordinals to assets in the order they are first seen.
#[derive(Debug, Default)]
pub struct Ordinals {
    seen: HashMap<AssetId, u32>,
}

impl Ordinals {
    /// The ordinal of `id`, assigning the next one if `id` is new.
    pub fn get(&mut self, id: AssetId) -> u32 {
        let next = self.seen.len() as u32;
        *self.seen.entry(id).or_insert(next)
    }

    /// Forgets every assignment.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Builds the entry for drawing `mesh` with `instance`, assigning ordinals as needed.
pub(crate) fn make_entry(
    materials: &mut Ordinals,
    meshes: &mut Ordinals,
    world: Mat4,
    mesh: &Rc<Mesh>,
    instance: &Rc<MaterialInst>,
    submesh: Option<Submesh>,
) -> DrawEntry {
    let transparent = instance.flags().contains(MaterialFlags::TRANSPARENT);
    let key = sort_key(
        transparent,
        materials.get(instance.id()),
        meshes.get(mesh.id()),
    );
    DrawEntry {
        sort_key: key,
        world,
        mesh: mesh.clone(),
        instance: instance.clone(),
        submesh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::material::Material;

    #[test]
    fn test_sort_key_orders_transparent_last() {
        assert!(sort_key(false, 9, 9) < sort_key(true, 0, 0));
        assert!(sort_key(false, 0, 9) < sort_key(false, 1, 0));
        assert!(sort_key(false, 1, 0) < sort_key(false, 1, 1));
    }

    #[test]
    fn test_ordinals_are_first_seen() {
        let mut ordinals = Ordinals::default();
        let a = AssetId::new();
        let b = AssetId::new();
        assert_eq!(ordinals.get(a), 0);
        assert_eq!(ordinals.get(b), 1);
        assert_eq!(ordinals.get(a), 0);
        ordinals.clear();
        assert_eq!(ordinals.get(b), 0);
    }

    #[test]
    fn test_bucket_sort_groups_materials() {
        let opaque = Material::new("opaque");
        let glass = Material::new("glass");
        glass.set_flag(MaterialFlags::TRANSPARENT, true);
        let mesh = Mesh::new();

        let mut materials = Ordinals::default();
        let mut meshes = Ordinals::default();
        let mut bucket = DrawBucket::new();
        for instance in [
            glass.default_instance(),
            opaque.default_instance(),
            glass.default_instance(),
        ] {
            bucket.push(make_entry(
                &mut materials,
                &mut meshes,
                Mat4::IDENTITY,
                &mesh,
                &instance,
                None,
            ));
        }
        bucket.sort();

        let order: Vec<AssetId> = bucket.entries().iter().map(|e| e.instance.id()).collect();
        assert_eq!(order[0], opaque.default_instance().id());
        assert_eq!(order[1], glass.default_instance().id());
        assert_eq!(order[2], glass.default_instance().id());

        bucket.clear();
        assert!(bucket.is_empty());
    }
}
