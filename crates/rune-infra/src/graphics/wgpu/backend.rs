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

//! Adapter selection with fallback.
//!
//! A high-performance adapter is preferred. If none is available a low-power one is tried,
//! and finally the platform's fallback (software) adapter.

use anyhow::{anyhow, Result};
use wgpu::{Adapter, Backend, DeviceType, Instance, PowerPreference, RequestAdapterOptions};

use rune_core::renderer::RendererDeviceType;

/// Returns a human-readable name for a backend.
pub fn backend_name(backend: Backend) -> &'static str {
    match backend {
        Backend::Vulkan => "Vulkan",
        Backend::Metal => "Metal",
        Backend::Dx12 => "DirectX 12",
        Backend::Gl => "OpenGL",
        Backend::BrowserWebGpu => "WebGPU",
        Backend::Noop => "No-op",
    }
}

/// Converts a `wgpu` device type to the engine's.
pub fn device_type(device_type: DeviceType) -> RendererDeviceType {
    match device_type {
        DeviceType::IntegratedGpu => RendererDeviceType::IntegratedGpu,
        DeviceType::DiscreteGpu => RendererDeviceType::DiscreteGpu,
        DeviceType::VirtualGpu => RendererDeviceType::VirtualGpu,
        DeviceType::Cpu => RendererDeviceType::Cpu,
        _ => RendererDeviceType::Unknown,
    }
}

/// The order adapters are requested in: `(power preference, force fallback)`.
const ATTEMPTS: [(PowerPreference, bool); 3] = [
    (PowerPreference::HighPerformance, false),
    (PowerPreference::LowPower, false),
    (PowerPreference::None, true),
];

/// Requests adapters from `instance` until one is granted.
///
/// ## Errors
/// Fails if every attempt was refused.
pub async fn select_adapter(instance: &Instance) -> Result<Adapter> {
    for (power_preference, force_fallback_adapter) in ATTEMPTS {
        log::debug!(
            "WgpuAdapter: requesting {power_preference:?} adapter (fallback: {force_fallback_adapter})"
        );
        match instance
            .request_adapter(&RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
        {
            Ok(adapter) => {
                let info = adapter.get_info();
                log::info!(
                    "WgpuAdapter: selected \"{}\" on {} ({:?})",
                    info.name,
                    backend_name(info.backend),
                    device_type(info.device_type)
                );
                return Ok(adapter);
            }
            Err(e) => log::warn!("WgpuAdapter: {power_preference:?} request failed: {e}"),
        }
    }
    Err(anyhow!("no graphics adapter is available"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name_function() {
        assert_eq!(backend_name(Backend::Vulkan), "Vulkan");
        assert_eq!(backend_name(Backend::Metal), "Metal");
        assert_eq!(backend_name(Backend::Dx12), "DirectX 12");
        assert_eq!(backend_name(Backend::Gl), "OpenGL");
    }

    #[test]
    fn test_device_type_conversion() {
        assert_eq!(
            device_type(DeviceType::DiscreteGpu),
            RendererDeviceType::DiscreteGpu
        );
        assert_eq!(device_type(DeviceType::Other), RendererDeviceType::Unknown);
    }
}
