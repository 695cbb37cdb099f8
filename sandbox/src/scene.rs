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

//! The demo scene: one checkered cube lit by a sun and a point light.

use std::rc::Rc;

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use rune_core::renderer::{
    Attenuation, Light, Material, MaterialInst, Mesh, MeshTopology, SceneLighting, Shader,
    Texture, TextureFormat, UniformAccess, Vertex,
};
use rune_core::GraphicsSystem;

const LIT_WGSL: &str = include_str!("lit.wgsl");

// (normal, right, up) with right x up == normal.
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
];

const EYE: Vec3 = Vec3::new(0.0, 1.5, 4.0);

/// Every asset the demo draws. The material only holds weak references, so the shader and
/// texture live here.
pub struct CubeScene {
    _shader: Rc<Shader>,
    _texture: Rc<Texture>,
    material: Rc<Material>,
    instance: Rc<MaterialInst>,
    mesh: Rc<Mesh>,
    ambient: Vec3,
}

impl CubeScene {
    pub fn new(ambient: Vec3) -> Result<Self> {
        let shader = Shader::from_wgsl("lit", LIT_WGSL);
        if shader.reflection().bindings().count() == 0 {
            anyhow::bail!("the lit shader reflected no bindings");
        }

        let texture = Texture::new(8, 8, TextureFormat::Rgb, checker(8))
            .context("checker texture has the wrong size")?;

        let material = Material::with_shader("cube", &shader);
        material.set_texture("t_diffuse", &texture);
        material.set_float4("u_material.tint", Vec4::ONE);
        material.set_float("u_material.shininess", 32.0);
        let instance = material.create_instance();

        Ok(Self {
            _shader: shader,
            _texture: texture,
            material,
            instance,
            mesh: cube(),
            ambient,
        })
    }

    /// Queues one frame of the scene, `seconds` after start.
    pub fn submit(&self, system: &mut GraphicsSystem, aspect: f32, seconds: f32) {
        let projection = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 100.0);
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Y);
        system.begin_scene(
            projection,
            view,
            &SceneLighting {
                view_position: EYE,
                ambient: self.ambient,
            },
        );

        system.add_light(&Light::Directional {
            direction: Vec3::new(-0.4, -1.0, -0.6),
            diffuse: Vec3::splat(0.7),
            specular: Vec3::splat(0.4),
        });
        system.add_light(&Light::Point {
            position: Vec3::new(2.0 * seconds.cos(), 1.0, 2.0 * seconds.sin()),
            attenuation: Attenuation::default(),
            diffuse: Vec3::new(1.0, 0.6, 0.3),
            specular: Vec3::ONE,
        });

        let pulse = 0.75 + 0.25 * (seconds * 2.0).sin();
        self.instance
            .set_float4("u_material.tint", Vec4::new(1.0, pulse, pulse, 1.0));

        let spin = Quat::from_euler(glam::EulerRot::YXZ, seconds * 0.8, seconds * 0.3, 0.0);
        system.add_renderable(Mat4::from_quat(spin), &self.mesh, &self.instance);
    }
}

impl Drop for CubeScene {
    fn drop(&mut self) {
        self.material.destroy_instance(&self.instance);
    }
}

fn cube() -> Rc<Mesh> {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, right, up) in FACES {
        let base = vertices.len() as u16;
        let center = normal * 0.5;
        for (x, y) in [(-0.5, -0.5), (0.5, -0.5), (-0.5, 0.5), (0.5, 0.5)] {
            vertices.push(Vertex::new(
                center + right * x + up * y,
                Vec2::new(x + 0.5, 0.5 - y),
                normal,
            ));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    Mesh::with_geometry(vertices, indices, MeshTopology::Triangles)
}

fn checker(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 3) as usize);
    for y in 0..size {
        for x in 0..size {
            let shade = if (x + y) % 2 == 0 { 230 } else { 60 };
            pixels.extend_from_slice(&[shade, shade, shade]);
        }
    }
    pixels
}
