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

//! Asset notifications as seen by an outside subscriber.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec4;
use rune_core::asset::Asset;
use rune_core::renderer::{
    Material, MaterialInst, MaterialInstObserver, Mesh, MeshObserver, MeshTopology, Shader,
    ShaderCode, ShaderObserver, Texture, TextureFormat, TextureObserver, UniformAccess,
};

const SRC: &str = r#"
struct Mat {
    color: vec4<f32>,
    shininess: f32,
};
@group(0) @binding(2) var<uniform> u_mat: Mat;
@group(0) @binding(3) var t_diffuse: texture_2d<f32>;
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return u_mat.color; }
@fragment
fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(u_mat.shininess); }
"#;

#[derive(Default)]
struct Journal {
    events: RefCell<Vec<String>>,
}

impl Journal {
    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl MeshObserver for Journal {
    fn mesh_destroying(&self, _mesh: &Mesh) {
        self.push("mesh destroying".into());
    }
    fn mesh_changed(&self, mesh: &Mesh) {
        self.push(format!("mesh changed {}", mesh.index_count()));
    }
}

impl TextureObserver for Journal {
    fn texture_destroying(&self, _texture: &Texture) {
        self.push("texture destroying".into());
    }
    fn texture_changed(&self, texture: &Texture) {
        self.push(format!("texture changed {}x{}", texture.width(), texture.height()));
    }
}

impl ShaderObserver for Journal {
    fn shader_destroying(&self, _shader: &Shader) {
        self.push("shader destroying".into());
    }
    fn shader_changed(&self, shader: &Shader) {
        self.push(format!("shader changed {}", shader.revision()));
    }
}

impl MaterialInstObserver for Journal {
    fn instance_destroying(&self, _instance: &MaterialInst) {
        self.push("instance destroying".into());
    }
    fn uniform_changed(
        &self,
        _instance: &MaterialInst,
        buffer_index: usize,
        offset: usize,
        size: usize,
    ) {
        self.push(format!("uniform {buffer_index} {offset}+{size}"));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Geometry and pixels
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_mesh_notifies_apply_and_drop_once() {
    let journal = Rc::new(Journal::default());
    let mesh = Mesh::new();
    mesh.attach_observer(Rc::downgrade(&journal) as Weak<dyn MeshObserver>);

    mesh.set_indices(vec![0, 1, 2], MeshTopology::Triangles);
    assert!(journal.take().is_empty());
    mesh.apply();
    drop(mesh);

    assert_eq!(journal.take(), vec!["mesh changed 3", "mesh destroying"]);
}

#[test]
fn test_texture_notifies_only_accepted_data() {
    let journal = Rc::new(Journal::default());
    let texture = Texture::empty();
    texture.attach_observer(Rc::downgrade(&journal) as Weak<dyn TextureObserver>);

    assert!(texture.init(2, 2, TextureFormat::Rgb, vec![0; 5]).is_err());
    texture.init(2, 2, TextureFormat::Rgb, vec![0; 12]).unwrap();
    drop(texture);

    assert_eq!(
        journal.take(),
        vec!["texture changed 2x2", "texture destroying"]
    );
}

#[test]
fn test_dead_subscriber_is_pruned() {
    let texture = Texture::empty();
    {
        let journal = Rc::new(Journal::default());
        texture.attach_observer(Rc::downgrade(&journal) as Weak<dyn TextureObserver>);
        assert_eq!(texture.observer_count(), 1);
    }
    texture.init(1, 1, TextureFormat::R, vec![7]).unwrap();
    assert_eq!(texture.observer_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Shaders and materials
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_shader_revision_follows_changes() {
    let journal = Rc::new(Journal::default());
    let shader = Shader::from_wgsl("mat", SRC);
    shader.attach_observer(Rc::downgrade(&journal) as Weak<dyn ShaderObserver>);

    shader.set_code(ShaderCode::wgsl(SRC));
    let reflection = shader.reflection().clone();
    shader.set_reflection_data(reflection);
    drop(shader);

    assert_eq!(
        journal.take(),
        vec!["shader changed 1", "shader changed 2", "shader destroying"]
    );
}

#[test]
fn test_uniform_write_reports_member_range() {
    let journal = Rc::new(Journal::default());
    let shader = Shader::from_wgsl("mat", SRC);
    let material = Material::with_shader("mat", &shader);
    let instance = material.create_instance();
    instance.attach_observer(Rc::downgrade(&journal) as Weak<dyn MaterialInstObserver>);

    assert!(instance.set_float4("u_mat.color", Vec4::ONE));
    assert!(instance.set_float("u_mat.shininess", 4.0));
    assert!(!instance.set_float("u_mat.missing", 4.0));
    assert_eq!(journal.take(), vec!["uniform 0 0+16", "uniform 0 16+4"]);

    assert_eq!(instance.get_float4("u_mat.color"), Vec4::ONE);
    assert_eq!(material.get_float4("u_mat.color"), Vec4::ZERO);
}

#[test]
fn test_material_drop_releases_instances_once() {
    let journal = Rc::new(Journal::default());
    let shader = Shader::from_wgsl("mat", SRC);
    let material = Material::with_shader("mat", &shader);
    let instance = material.create_instance();
    instance.attach_observer(Rc::downgrade(&journal) as Weak<dyn MaterialInstObserver>);

    drop(material);
    drop(instance);

    assert_eq!(journal.take(), vec!["instance destroying"]);
}

#[test]
fn test_every_asset_has_its_own_id() {
    let shader = Shader::from_wgsl("mat", SRC);
    let material = Material::with_shader("mat", &shader);
    let a = material.create_instance();
    let b = material.create_instance();
    let mesh = Mesh::new();
    let texture = Texture::empty();

    let mut ids = vec![
        shader.id(),
        material.id(),
        a.id(),
        b.id(),
        material.default_instance().id(),
        mesh.id(),
        texture.id(),
    ];
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 7);
}
