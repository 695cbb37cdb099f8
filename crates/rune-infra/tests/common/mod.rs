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

//! Shared fixtures for the rune-infra integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use glam::{Vec2, Vec3};
use rune_core::renderer::{GraphicsConfig, Mesh, MeshTopology, RenderingApi, Vertex};
use rune_core::GraphicsSystem;
use rune_infra::{register_default_renderers, HeadlessRenderer};

/// A lit, textured material using every slot the graphics system fills.
pub const LIT: &str = r#"
struct Scene {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    world: mat4x4<f32>,
}

struct Light {
    position: vec3<f32>,
    is_directional: i32,
    direction: vec4<f32>,
    constant: f32,
    linear: f32,
    quadratic: f32,
    padding: f32,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
}

struct Lighting {
    view_position: vec4<f32>,
    ambient: vec3<f32>,
    light_count: i32,
    lights: array<Light, 32>,
}

struct MaterialBlock {
    tint: vec4<f32>,
    shininess: f32,
}

@group(0) @binding(0) var<uniform> u_scene: Scene;
@group(0) @binding(1) var<uniform> u_lighting: Lighting;
@group(0) @binding(2) var<uniform> u_material: MaterialBlock;
@group(0) @binding(3) var t_diffuse: texture_2d<f32>;
@group(0) @binding(4) var s_diffuse: sampler;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = u_scene.projection * u_scene.view * u_scene.world * vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var color = u_lighting.ambient;
    for (var i = 0; i < u_lighting.light_count; i++) {
        color += u_lighting.lights[i].diffuse.rgb;
    }
    return textureSample(t_diffuse, s_diffuse, input.uv) * u_material.tint * vec4<f32>(color, 1.0);
}
"#;

/// A graphics system rendering through the headless backend.
pub fn headless_system() -> GraphicsSystem {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut system = GraphicsSystem::new(GraphicsConfig::default());
    register_default_renderers(&mut system);
    system
        .set_rendering_api(RenderingApi::Headless)
        .expect("the headless backend always starts");
    system
}

/// The active backend, which must be headless.
pub fn backend(system: &GraphicsSystem) -> &HeadlessRenderer {
    system
        .backend()
        .and_then(|b| b.as_any().downcast_ref::<HeadlessRenderer>())
        .expect("the headless backend is active")
}

/// A unit quad in the XY plane, two triangles.
pub fn quad() -> Rc<Mesh> {
    let normal = Vec3::Z;
    Mesh::with_geometry(
        vec![
            Vertex::new(Vec3::new(-0.5, -0.5, 0.0), Vec2::new(0.0, 1.0), normal),
            Vertex::new(Vec3::new(0.5, -0.5, 0.0), Vec2::new(1.0, 1.0), normal),
            Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec2::new(0.0, 0.0), normal),
            Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec2::new(1.0, 0.0), normal),
        ],
        vec![0, 1, 2, 2, 1, 3],
        MeshTopology::Triangles,
    )
}
