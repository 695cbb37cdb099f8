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

//! Lighting uniform structures.

use glam::{Vec3, Vec4};

/// Maximum number of lights in the global lighting buffer.
pub const MAX_LIGHTS: usize = 32;

/// Distance falloff of a point light: `1 / (constant + linear * d + quadratic * d^2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Constant term.
    pub constant: f32,
    /// Linear term.
    pub linear: f32,
    /// Quadratic term.
    pub quadratic: f32,
}

impl Default for Attenuation {
    /// Covers roughly 50 units.
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

/// A light submitted for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Parallel rays, no falloff.
    Directional {
        /// Direction the light travels, in world space.
        direction: Vec3,
        /// Diffuse color.
        diffuse: Vec3,
        /// Specular color.
        specular: Vec3,
    },
    /// Emits in every direction from a point.
    Point {
        /// World-space position.
        position: Vec3,
        /// Distance falloff.
        attenuation: Attenuation,
        /// Diffuse color.
        diffuse: Vec3,
        /// Specular color.
        specular: Vec3,
    },
}

impl Light {
    /// Converts to the GPU layout.
    pub fn to_uniform(&self) -> LightUniform {
        match *self {
            Light::Directional {
                direction,
                diffuse,
                specular,
            } => LightUniform {
                position: [0.0; 3],
                is_directional: 1,
                direction: direction.normalize_or_zero().extend(0.0).to_array(),
                constant: 1.0,
                linear: 0.0,
                quadratic: 0.0,
                _padding: 0.0,
                diffuse: diffuse.extend(1.0).to_array(),
                specular: specular.extend(1.0).to_array(),
            },
            Light::Point {
                position,
                attenuation,
                diffuse,
                specular,
            } => LightUniform {
                position: position.to_array(),
                is_directional: 0,
                direction: [0.0; 4],
                constant: attenuation.constant,
                linear: attenuation.linear,
                quadratic: attenuation.quadratic,
                _padding: 0.0,
                diffuse: diffuse.extend(1.0).to_array(),
                specular: specular.extend(1.0).to_array(),
            },
        }
    }
}

/// Data for a single light, formatted for GPU consumption.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// World-space position of a point light.
    pub position: [f32; 3],
    /// Non-zero for directional lights.
    pub is_directional: i32,
    /// Direction (xyz) of a directional light, with padding (w).
    pub direction: [f32; 4],
    /// Constant attenuation term.
    pub constant: f32,
    /// Linear attenuation term.
    pub linear: f32,
    /// Quadratic attenuation term.
    pub quadratic: f32,
    /// Padding for 16-byte alignment.
    pub _padding: f32,
    /// Diffuse color (rgb), with padding (a).
    pub diffuse: [f32; 4],
    /// Specular color (rgb), with padding (a).
    pub specular: [f32; 4],
}

/// Ambient term and viewer position of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLighting {
    /// World-space camera position, used for specular highlights.
    pub view_position: Vec3,
    /// Ambient color.
    pub ambient: Vec3,
}

impl Default for SceneLighting {
    fn default() -> Self {
        Self {
            view_position: Vec3::ZERO,
            ambient: Vec3::splat(0.2),
        }
    }
}

/// The structure of the global lighting uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniforms {
    /// Camera position (xyz), with padding (w).
    pub view_position: [f32; 4],
    /// Ambient color.
    pub ambient: [f32; 3],
    /// Number of valid entries in `lights`.
    pub light_count: i32,
    /// The lights of the frame.
    pub lights: [LightUniform; MAX_LIGHTS],
}

impl LightingUniforms {
    /// Creates an empty lighting block.
    pub fn new(lighting: &SceneLighting) -> Self {
        let mut uniforms: Self = bytemuck::Zeroable::zeroed();
        uniforms.set_scene(lighting);
        uniforms
    }

    /// Stores the camera position and ambient color.
    pub fn set_scene(&mut self, lighting: &SceneLighting) {
        self.view_position = Vec4::from((lighting.view_position, 1.0)).to_array();
        self.ambient = lighting.ambient.to_array();
    }

    /// Appends a light. Returns `false` once `limit` (itself capped at [`MAX_LIGHTS`]) is
    /// reached.
    pub fn push(&mut self, light: &Light, limit: usize) -> bool {
        let count = self.light_count.max(0) as usize;
        if count >= limit.min(MAX_LIGHTS) {
            return false;
        }
        self.lights[count] = light.to_uniform();
        self.light_count += 1;
        true
    }

    /// Forgets every light.
    pub fn clear_lights(&mut self) {
        self.light_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 80);
        assert_eq!(std::mem::size_of::<LightingUniforms>(), 32 + 80 * MAX_LIGHTS);
    }

    #[test]
    fn test_push_respects_limit() {
        let mut uniforms = LightingUniforms::new(&SceneLighting::default());
        let light = Light::Directional {
            direction: Vec3::NEG_Y,
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
        };
        assert!(uniforms.push(&light, 2));
        assert!(uniforms.push(&light, 2));
        assert!(!uniforms.push(&light, 2));
        assert_eq!(uniforms.light_count, 2);
        uniforms.clear_lights();
        assert_eq!(uniforms.light_count, 0);
    }

    #[test]
    fn test_point_light_uniform() {
        let uniform = Light::Point {
            position: Vec3::new(1.0, 2.0, 3.0),
            attenuation: Attenuation::default(),
            diffuse: Vec3::new(1.0, 0.5, 0.0),
            specular: Vec3::ONE,
        }
        .to_uniform();
        assert_eq!(uniform.is_directional, 0);
        assert_eq!(uniform.position, [1.0, 2.0, 3.0]);
        assert_eq!(uniform.diffuse, [1.0, 0.5, 0.0, 1.0]);
        approx::assert_relative_eq!(uniform.quadratic, 0.032);
    }
}
