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

//! # Rune Core
//!
//! Backend-agnostic half of the rune renderer: CPU-side assets (meshes, textures, shaders,
//! materials), the shader reflection that lays out material uniforms, the contracts rendering
//! backends implement and the [`GraphicsSystem`](renderer::GraphicsSystem) that drives them.

#![warn(missing_docs)]

pub mod asset;
pub mod platform;
pub mod renderer;
pub mod utils;

pub use renderer::GraphicsSystem;
