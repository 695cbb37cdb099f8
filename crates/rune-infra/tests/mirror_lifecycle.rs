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

//! Mirrors follow their CPU assets: every asset change or drop reaches the backend once.

mod common;

use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};
use rune_core::renderer::{
    Material, MaterialFlags, Mesh, MeshTopology, Shader, ShaderCode, Texture, TextureFormat,
    Vertex,
};
use rune_core::GraphicsSystem;

use common::{backend, headless_system, quad, LIT};

struct Scene {
    shader: Rc<Shader>,
    material: Rc<Material>,
    mesh: Rc<Mesh>,
    texture: Rc<Texture>,
}

fn textured_scene() -> Scene {
    let shader = Shader::from_wgsl("lit", LIT);
    let material = Material::with_shader("lit", &shader);
    let texture = Texture::new(1, 1, TextureFormat::Rgba, vec![255; 4]).unwrap();
    assert!(material.set_texture("t_diffuse", &texture));
    Scene {
        shader,
        material,
        mesh: quad(),
        texture,
    }
}

fn render(system: &mut GraphicsSystem, scene: &Scene) {
    system.add_renderable(Mat4::IDENTITY, &scene.mesh, &scene.material.default_instance());
    system.render().unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Destruction
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_dropped_mesh_releases_its_mirror() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);
    let destroyed = backend(&system).counters().destroyed;

    let Scene { mesh, .. } = scene;
    assert_eq!(mesh.observer_count(), 1);
    drop(mesh);

    let headless = backend(&system);
    assert_eq!(headless.mirror_counts().meshes, 0);
    assert_eq!(headless.live_resources().meshes, 0);
    assert_eq!(headless.counters().destroyed, destroyed + 1);
}

#[test]
fn test_dropped_texture_releases_its_mirror() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);
    assert_eq!(backend(&system).live_resources().textures, 1);

    let Scene {
        shader: _shader,
        material,
        mesh,
        texture,
    } = scene;
    drop(texture);
    assert_eq!(backend(&system).mirror_counts().textures, 0);
    assert_eq!(backend(&system).live_resources().textures, 0);

    system.add_renderable(Mat4::IDENTITY, &mesh, &material.default_instance());
    system.render().unwrap();
    let call = &backend(&system).draws()[0];
    assert!(call.textures.iter().all(|(_, handle)| handle.is_none()));
}

#[test]
fn test_dropped_shader_releases_its_programs() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);
    assert_eq!(backend(&system).mirror_counts().pipelines, 1);

    let Scene { shader, .. } = scene;
    drop(shader);
    let headless = backend(&system);
    assert_eq!(headless.mirror_counts().pipelines, 0);
    assert_eq!(headless.live_resources().programs, 0);
}

#[test]
fn test_destroyed_instance_releases_its_buffers() {
    let mut system = headless_system();
    let scene = textured_scene();
    let instance = scene.material.create_instance();
    system.add_renderable(Mat4::IDENTITY, &scene.mesh, &instance);
    system.render().unwrap();

    let before = backend(&system).live_resources().buffers;
    let blocks = instance.uniform_buffers().len();
    assert_eq!(backend(&system).mirror_counts().instances, 1);

    assert!(scene.material.destroy_instance(&instance));
    assert!(!scene.material.destroy_instance(&instance));

    let headless = backend(&system);
    assert_eq!(headless.mirror_counts().instances, 0);
    assert_eq!(headless.live_resources().buffers, before - blocks);
}

#[test]
fn test_dropped_material_releases_its_instances() {
    let mut system = headless_system();
    let scene = textured_scene();
    let extra = scene.material.create_instance();
    system.add_renderable(Mat4::IDENTITY, &scene.mesh, &extra);
    render(&mut system, &scene);
    assert_eq!(backend(&system).mirror_counts().instances, 2);

    let Scene { material, .. } = scene;
    drop(material);
    assert!(extra.is_released());
    assert_eq!(backend(&system).mirror_counts().instances, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Changes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_applied_mesh_is_uploaded_again() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);
    let created = backend(&system).counters().meshes_created;

    let normal = Vec3::Z;
    scene.mesh.set_vertices(vec![
        Vertex::new(Vec3::ZERO, Vec2::ZERO, normal),
        Vertex::new(Vec3::X, Vec2::X, normal),
        Vertex::new(Vec3::Y, Vec2::Y, normal),
    ]);
    scene.mesh.set_indices(vec![0, 1, 2], MeshTopology::Triangles);
    scene.mesh.apply();

    let headless = backend(&system);
    assert_eq!(headless.counters().meshes_created, created + 1);
    assert_eq!(headless.live_resources().meshes, 1);

    render(&mut system, &scene);
    let headless = backend(&system);
    let call = &headless.draws()[0];
    assert_eq!(call.index_count, 3);
    let (vertices, indices, topology) = headless.mesh_contents(call.mesh).unwrap();
    assert_eq!(vertices.len(), 3);
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(topology, MeshTopology::Triangles);
}

#[test]
fn test_changed_texture_is_recreated_on_next_use() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);

    scene
        .texture
        .init(2, 2, TextureFormat::R, vec![0, 64, 128, 255])
        .unwrap();
    assert_eq!(backend(&system).mirror_counts().textures, 0);

    render(&mut system, &scene);
    let headless = backend(&system);
    let (_, handle) = headless.draws()[0].textures[0];
    let (width, height, format, pixels) = headless.texture_contents(handle.unwrap()).unwrap();
    assert_eq!((width, height, format), (2, 2, TextureFormat::R));
    assert_eq!(pixels, vec![0, 64, 128, 255]);
    assert_eq!(headless.counters().textures_created, 2);
}

#[test]
fn test_rejected_texture_data_keeps_the_mirror() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);

    assert!(scene.texture.init(2, 2, TextureFormat::Rgba, vec![0; 3]).is_err());
    assert_eq!(backend(&system).mirror_counts().textures, 1);
}

#[test]
fn test_flags_select_their_own_program() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);

    scene.material.set_flag(MaterialFlags::DOUBLE_SIDED, true);
    render(&mut system, &scene);

    let headless = backend(&system);
    assert_eq!(headless.mirror_counts().pipelines, 2);
    let call = &headless.draws()[0];
    assert!(call.flags.contains(MaterialFlags::DOUBLE_SIDED));
    let (label, flags, _) = headless.program_info(call.material).unwrap();
    assert_eq!(label, "lit");
    assert_eq!(flags, call.flags);
}

#[test]
fn test_shader_change_rebuilds_programs_on_next_draw() {
    let mut system = headless_system();
    let scene = textured_scene();
    render(&mut system, &scene);

    scene.shader.set_code(ShaderCode::wgsl(LIT));
    assert_eq!(backend(&system).mirror_counts().pipelines, 0);
    assert_eq!(backend(&system).live_resources().programs, 0);

    render(&mut system, &scene);
    assert_eq!(backend(&system).mirror_counts().pipelines, 1);
    assert_eq!(backend(&system).live_resources().programs, 1);
    assert_eq!(backend(&system).draws().len(), 1);
}
