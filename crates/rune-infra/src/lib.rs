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

//! Concrete backends for `rune-core`.
//!
//! * [`graphics::headless`] records every GPU operation on the CPU. It needs no device and is
//!   what tests drive.
//! * [`graphics::wgpu`] renders through `wgpu` (feature `graphics`).
//! * [`platform::window`] provides a `winit` window (feature `platform`).

#![warn(missing_docs)]

pub mod graphics;
#[cfg(feature = "platform")]
pub mod platform;

pub use graphics::headless::HeadlessRenderer;
#[cfg(feature = "graphics")]
pub use graphics::wgpu::WgpuRenderer;
#[cfg(feature = "platform")]
pub use platform::window::{WinitWindow, WinitWindowBuilder};

use rune_core::renderer::{GraphicsSystem, RenderingApi};

/// Registers every backend compiled into this crate with `system`.
pub fn register_default_renderers(system: &mut GraphicsSystem) {
    system.register_renderer_factory(
        RenderingApi::Headless,
        Box::new(|| Box::new(HeadlessRenderer::new())),
    );
    #[cfg(feature = "graphics")]
    system.register_renderer_factory(
        RenderingApi::Wgpu,
        Box::new(|| Box::new(WgpuRenderer::new())),
    );
}
