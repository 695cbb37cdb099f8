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

//! Rendering backends.

mod binding;
pub mod headless;
#[cfg(feature = "graphics")]
pub mod wgpu;

pub use self::binding::DrawCall;

use rune_core::renderer::{parse_stage, MaterialDescriptor, ShaderError, ShaderStage};

/// Parses and validates both stages of a program and checks their entry points.
pub(crate) fn check_program(descriptor: &MaterialDescriptor<'_>) -> Result<(), ShaderError> {
    let stages = [
        (ShaderStage::Vertex, &descriptor.code.vertex),
        (ShaderStage::Fragment, &descriptor.code.fragment),
    ];
    for (stage, code) in stages {
        let module = parse_stage(stage, code)?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::CompilationFailed {
            label: descriptor.label.to_string(),
            details: e.into_inner().to_string(),
        })?;
        if descriptor.reflection.entry_point(stage).is_none() {
            return Err(ShaderError::MissingEntryPoint {
                stage: stage.name(),
            });
        }
    }
    Ok(())
}
