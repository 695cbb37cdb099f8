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

//! CPU-side rendering assets and the value types shared with backends.

pub mod core;
pub mod handle;
pub mod material;
pub mod material_inst;
pub mod reflection;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod uniform;
pub mod util;

pub use self::core::*;
pub use self::handle::*;
pub use self::material::{Material, TextureSlot, UniformBuffer};
pub use self::material_inst::MaterialInst;
pub use self::reflection::*;
pub use self::scene::*;
pub use self::shader::*;
pub use self::texture::*;
pub use self::uniform::*;
pub use self::util::*;
