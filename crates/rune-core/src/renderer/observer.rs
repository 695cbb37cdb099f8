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

//! Publish/subscribe lists used by CPU assets to inform backends of changes.
//!
//! Assets hold their subscribers weakly. A backend subscribes the first time it realizes
//! an asset and must unsubscribe before it goes away; a subscriber that vanished without
//! unsubscribing is pruned on the next notification.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::renderer::api::material_inst::MaterialInst;
use crate::renderer::api::scene::mesh::Mesh;
use crate::renderer::api::shader::Shader;
use crate::renderer::api::texture::Texture;

/// Receives lifecycle events from a [`Mesh`].
pub trait MeshObserver {
    /// The mesh is about to be dropped.
    fn mesh_destroying(&self, mesh: &Mesh);
    /// The mesh geometry was applied and must be re-uploaded.
    fn mesh_changed(&self, mesh: &Mesh);
}

/// Receives lifecycle events from a [`Texture`].
pub trait TextureObserver {
    /// The texture is about to be dropped.
    fn texture_destroying(&self, texture: &Texture);
    /// The pixel data or dimensions were replaced.
    fn texture_changed(&self, texture: &Texture);
}

/// Receives lifecycle events from a [`Shader`].
pub trait ShaderObserver {
    /// The shader is about to be dropped.
    fn shader_destroying(&self, shader: &Shader);
    /// The code or reflection data was replaced.
    fn shader_changed(&self, shader: &Shader);
}

/// Receives lifecycle and uniform events from a [`MaterialInst`].
pub trait MaterialInstObserver {
    /// The instance is being released.
    fn instance_destroying(&self, instance: &MaterialInst);
    /// `size` bytes at `offset` inside uniform buffer `buffer_index` were written.
    fn uniform_changed(
        &self,
        instance: &MaterialInst,
        buffer_index: usize,
        offset: usize,
        size: usize,
    );
}

/// A list of weakly held subscribers.
pub struct ObserverList<O: ?Sized> {
    entries: RefCell<Vec<Weak<O>>>,
}

impl<O: ?Sized> Default for ObserverList<O> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<O: ?Sized> std::fmt::Debug for ObserverList<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

impl<O: ?Sized> ObserverList<O> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `observer`. Subscribing the same observer twice has no effect.
    pub fn attach(&self, observer: Weak<O>) {
        let mut entries = self.entries.borrow_mut();
        if !entries.iter().any(|e| Weak::ptr_eq(e, &observer)) {
            entries.push(observer);
        }
    }

    /// Unsubscribes `observer` if present.
    pub fn detach(&self, observer: &Weak<O>) {
        self.entries
            .borrow_mut()
            .retain(|e| !Weak::ptr_eq(e, observer));
    }

    /// Returns `true` if `observer` is subscribed.
    pub fn contains(&self, observer: &Weak<O>) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| Weak::ptr_eq(e, observer))
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.strong_count() > 0)
            .count()
    }

    /// Returns `true` if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` for every live subscriber.
    ///
    /// The list is snapshotted first: subscribers may attach or detach from inside `f`.
    pub fn notify(&self, mut f: impl FnMut(&O)) {
        let snapshot: Vec<Rc<O>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|e| e.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in &snapshot {
            f(observer.as_ref());
        }
    }
}
