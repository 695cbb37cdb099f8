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

//! Defines the shader asset: compiled stage code plus its reflected binding layout.

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use crate::asset::{Asset, AssetId};
use crate::renderer::api::reflection::{reflect_shader, ReflectionData};
use crate::renderer::observer::{ObserverList, ShaderObserver};

/// A programmable stage of the graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl ShaderStage {
    /// A lowercase name for logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// The language a stage's code is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    /// WGSL source text.
    Wgsl,
    /// SPIR-V binary modules.
    SpirV,
}

/// The code of a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderStageCode {
    /// WGSL source text.
    Wgsl(String),
    /// A SPIR-V binary, as raw bytes.
    SpirV(Vec<u8>),
}

impl ShaderStageCode {
    /// The language tag of this code.
    pub fn language(&self) -> ShaderLanguage {
        match self {
            ShaderStageCode::Wgsl(_) => ShaderLanguage::Wgsl,
            ShaderStageCode::SpirV(_) => ShaderLanguage::SpirV,
        }
    }
}

/// Vertex and fragment code of a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCode {
    /// Code of the vertex stage.
    pub vertex: ShaderStageCode,
    /// Code of the fragment stage.
    pub fragment: ShaderStageCode,
}

impl ShaderCode {
    /// Uses one WGSL module for both stages.
    pub fn wgsl(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            vertex: ShaderStageCode::Wgsl(source.clone()),
            fragment: ShaderStageCode::Wgsl(source),
        }
    }

    /// Uses two SPIR-V binaries.
    pub fn spirv(vertex: Vec<u8>, fragment: Vec<u8>) -> Self {
        Self {
            vertex: ShaderStageCode::SpirV(vertex),
            fragment: ShaderStageCode::SpirV(fragment),
        }
    }
}

/// A shader asset.
///
/// Holds the compiled code of both stages and the reflection merged across them. Replacing
/// the code or the reflection notifies observers so backends can rebuild their programs.
pub struct Shader {
    id: AssetId,
    name: String,
    code: RefCell<ShaderCode>,
    reflection: RefCell<ReflectionData>,
    revision: Cell<u64>,
    layout_key: Cell<u64>,
    observers: ObserverList<dyn ShaderObserver>,
}

impl Shader {
    /// Creates a shader and reflects its code.
    pub fn new(name: impl Into<String>, code: ShaderCode) -> Rc<Self> {
        let reflection = reflect_shader(&code.vertex, &code.fragment);
        let layout_key = reflection.layout_key();
        let shader = Rc::new(Self {
            id: AssetId::new(),
            name: name.into(),
            code: RefCell::new(code),
            reflection: RefCell::new(reflection),
            revision: Cell::new(0),
            layout_key: Cell::new(layout_key),
            observers: ObserverList::new(),
        });
        log::debug!(
            "Shader '{}' created with {} bindings",
            shader.name,
            shader.reflection.borrow().bindings().count()
        );
        shader
    }

    /// Creates a shader whose two stages live in one WGSL module.
    pub fn from_wgsl(name: impl Into<String>, source: impl Into<String>) -> Rc<Self> {
        Self::new(name, ShaderCode::wgsl(source))
    }

    /// A debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The code of both stages.
    pub fn code(&self) -> Ref<'_, ShaderCode> {
        self.code.borrow()
    }

    /// The merged reflection of both stages.
    pub fn reflection(&self) -> Ref<'_, ReflectionData> {
        self.reflection.borrow()
    }

    /// Bumped every time the code or reflection is replaced.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// [`ReflectionData::layout_key`] of the current reflection.
    ///
    /// Material layouts record the key they were built from. A recompile that keeps every
    /// binding in place keeps the key, so existing instances stay bindable.
    pub fn layout_key(&self) -> u64 {
        self.layout_key.get()
    }

    /// Replaces the code, reflects it again and notifies observers.
    pub fn set_code(&self, code: ShaderCode) {
        let reflection = reflect_shader(&code.vertex, &code.fragment);
        *self.code.borrow_mut() = code;
        *self.reflection.borrow_mut() = reflection;
        self.bump();
    }

    /// Overrides the reflection data and notifies observers.
    pub fn set_reflection_data(&self, reflection: ReflectionData) {
        *self.reflection.borrow_mut() = reflection;
        self.bump();
    }

    fn bump(&self) {
        self.revision.set(self.revision.get() + 1);
        self.layout_key.set(self.reflection.borrow().layout_key());
        self.observers.notify(|o| o.shader_changed(self));
    }

    /// Subscribes an observer.
    pub fn attach_observer(&self, observer: Weak<dyn ShaderObserver>) {
        self.observers.attach(observer);
    }

    /// Unsubscribes an observer.
    pub fn detach_observer(&self, observer: &Weak<dyn ShaderObserver>) {
        self.observers.detach(observer);
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Asset for Shader {
    fn id(&self) -> AssetId {
        self.id
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.observers.notify(|o| o.shader_destroying(self));
    }
}
