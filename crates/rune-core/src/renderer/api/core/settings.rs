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

//! Global settings for the rendering system.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::renderer::api::scene::MAX_LIGHTS;
use crate::renderer::api::util::RenderingApi;

/// Settings of the graphics system, usually read from a JSON file.
///
/// Every field is optional in the file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// The backend to start with.
    pub rendering_api: RenderingApi,
    /// Color the frame is cleared to (linear RGBA).
    pub clear_color: [f32; 4],
    /// Ambient light color.
    pub ambient_light: [f32; 3],
    /// Lights accepted per frame. Values above 32 are clamped.
    pub max_lights: usize,
    /// Per-draw scene uniform slots allocated up front. More are allocated on demand.
    pub scene_uniform_capacity: usize,
    /// Wait for vertical sync when presenting.
    pub vsync: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            rendering_api: RenderingApi::Wgpu,
            clear_color: [0.3912, 0.5843, 0.9294, 1.0],
            ambient_light: [0.2, 0.2, 0.2],
            max_lights: MAX_LIGHTS,
            scene_uniform_capacity: 256,
            vsync: true,
        }
    }
}

impl GraphicsConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        Ok(config.sanitized())
    }

    /// Reads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    /// The settings handed to backends.
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            clear_color: self.clear_color,
            vsync: self.vsync,
        }
    }

    pub(crate) fn sanitized(mut self) -> Self {
        if self.max_lights > MAX_LIGHTS {
            log::warn!(
                "GraphicsConfig: max_lights {} clamped to {MAX_LIGHTS}",
                self.max_lights
            );
            self.max_lights = MAX_LIGHTS;
        }
        self.scene_uniform_capacity = self.scene_uniform_capacity.max(1);
        self
    }
}

/// Settings a backend reads when it initializes and presents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendSettings {
    /// Color the frame is cleared to (linear RGBA).
    pub clear_color: [f32; 4],
    /// Wait for vertical sync when presenting.
    pub vsync: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        GraphicsConfig::default().backend_settings()
    }
}

/// Failure to obtain a [`GraphicsConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The text is not a valid configuration.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read graphics config: {e}"),
            ConfigError::Parse(e) => write!(f, "Invalid graphics config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}
