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

//! Generic rendering enums.

use serde::{Deserialize, Serialize};

/// How the indices of a mesh are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeshTopology {
    /// Nothing is drawn.
    #[default]
    None,
    /// Every two indices form a line.
    Lines,
    /// Every three indices form a triangle.
    Triangles,
}

impl MeshTopology {
    /// Number of primitives `index_count` indices produce.
    pub const fn primitive_count(self, index_count: u32) -> u32 {
        match self {
            MeshTopology::None => 0,
            MeshTopology::Lines => index_count / 2,
            MeshTopology::Triangles => index_count / 3,
        }
    }
}

/// Identifies a rendering API a backend can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderingApi {
    /// No backend. Rendering is a no-op.
    #[default]
    None,
    /// The `wgpu` backend.
    Wgpu,
    /// The CPU-only backend used by tests and CI.
    Headless,
    /// A backend registered by the application under its own name.
    #[serde(skip)]
    Custom(#[serde(skip)] &'static str),
}

impl RenderingApi {
    /// A lowercase name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            RenderingApi::None => "none",
            RenderingApi::Wgpu => "wgpu",
            RenderingApi::Headless => "headless",
            RenderingApi::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for RenderingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The physical type of a graphics device (GPU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RendererDeviceType {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized or software-based GPU.
    VirtualGpu,
    /// A software renderer running on the CPU.
    Cpu,
    /// An unknown or unsupported device type.
    #[default]
    Unknown,
}
