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

use anyhow::{anyhow, Context, Result};
use rune_core::platform::RuneWindowHandle;

use super::backend::{backend_name, select_adapter};
use super::conversions::DEPTH_FORMAT;

/// Format of the color target used when rendering without a window.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Holds the core WGPU state objects required for rendering.
///
/// The context does not own a surface, so it can be created before a window exists and
/// outlives every window it presents to.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    /// The instance surfaces are created from.
    pub instance: wgpu::Instance,
    /// The selected adapter.
    pub adapter: wgpu::Adapter,
    /// The logical device.
    pub device: wgpu::Device,
    /// The device's command queue.
    pub queue: wgpu::Queue,

    // Store info for easy access
    /// Adapter name as reported by the driver.
    pub adapter_name: String,
    /// API the adapter runs on.
    pub adapter_backend: wgpu::Backend,
    /// Physical type of the adapter.
    pub adapter_device_type: wgpu::DeviceType,
    /// Limits of the created device.
    pub device_limits: wgpu::Limits,
}

impl WgpuGraphicsContext {
    /// Selects an adapter and creates the logical device.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context, or why no device could be created.
    pub async fn new() -> Result<Self> {
        log::info!("WgpuGraphicsContext: initializing");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = select_adapter(&instance).await?;
        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("rune device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;
        log::info!(
            "WgpuGraphicsContext: device created on \"{}\" ({})",
            adapter_info.name,
            backend_name(adapter_info.backend)
        );

        let device_limits = device.limits();
        log::debug!("Device limits: {device_limits:?}");

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            adapter_device_type: adapter_info.device_type,
            device_limits,
        })
    }
}

enum ColorTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        size: (u32, u32),
    },
}

/// The image a frame is rendered into, with its depth buffer.
pub struct PresentTarget {
    color: ColorTarget,
    depth: wgpu::TextureView,
}

/// A color view acquired for one frame.
pub struct AcquiredFrame {
    /// View of the color image.
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl AcquiredFrame {
    /// Schedules the image for presentation. Offscreen frames are simply dropped.
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

/// Why no frame could be acquired.
pub enum AcquireError {
    /// The frame should be skipped. The target was reconfigured if needed.
    Skip,
    /// The target cannot be rendered to any more.
    Fatal(String),
}

impl PresentTarget {
    /// Creates a surface for `window` and configures it.
    ///
    /// ## Errors
    /// Fails if the surface cannot be created or supports no format.
    pub fn for_window(
        context: &WgpuGraphicsContext,
        window: RuneWindowHandle,
        size: (u32, u32),
        vsync: bool,
    ) -> Result<Self> {
        let surface = context
            .instance
            .create_surface(window)
            .context("Failed to create surface")?;

        let caps = surface.get_capabilities(&context.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| {
                matches!(
                    f,
                    wgpu::TextureFormat::Bgra8UnormSrgb | wgpu::TextureFormat::Rgba8UnormSrgb
                )
            })
            .or_else(|| caps.formats.iter().copied().find(|f| f.is_srgb()))
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface supports no format on this adapter"))?;

        let present_mode = if vsync {
            wgpu::PresentMode::Fifo // Fifo is guaranteed to be supported
        } else {
            [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Immediate]
                .into_iter()
                .find(|m| caps.present_modes.contains(m))
                .unwrap_or(wgpu::PresentMode::Fifo)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.0.max(1),
            height: size.1.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);
        log::info!(
            "PresentTarget: surface configured as {format:?} {}x{} ({present_mode:?})",
            config.width,
            config.height
        );

        let depth = create_depth_view(&context.device, (config.width, config.height));
        Ok(Self {
            color: ColorTarget::Surface { surface, config },
            depth,
        })
    }

    /// Creates an offscreen color target.
    pub fn offscreen(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let size = (size.0.max(1), size.1.max(1));
        Self {
            color: ColorTarget::Offscreen {
                texture: create_offscreen_texture(device, size),
                size,
            },
            depth: create_depth_view(device, size),
        }
    }

    /// The color format pipelines must target.
    pub fn format(&self) -> wgpu::TextureFormat {
        match &self.color {
            ColorTarget::Surface { config, .. } => config.format,
            ColorTarget::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    /// Current size in pixels.
    pub fn size(&self) -> (u32, u32) {
        match &self.color {
            ColorTarget::Surface { config, .. } => (config.width, config.height),
            ColorTarget::Offscreen { size, .. } => *size,
        }
    }

    /// The depth buffer.
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth
    }

    /// Resizes the color and depth targets. Zero sizes are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("PresentTarget: Ignoring resize request to zero dimensions: {width}x{height}");
            return;
        }
        if self.size() == (width, height) {
            return;
        }
        log::info!("PresentTarget: Resizing to {width}x{height}");
        match &mut self.color {
            ColorTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(device, config);
            }
            ColorTarget::Offscreen { texture, size } => {
                *texture = create_offscreen_texture(device, (width, height));
                *size = (width, height);
            }
        }
        self.depth = create_depth_view(device, (width, height));
    }

    /// Acquires the image of the next frame.
    pub fn acquire(&mut self, device: &wgpu::Device) -> Result<AcquiredFrame, AcquireError> {
        match &self.color {
            ColorTarget::Offscreen { texture, .. } => Ok(AcquiredFrame {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: None,
            }),
            ColorTarget::Surface { surface, config } => match surface.get_current_texture() {
                Ok(texture) => Ok(AcquiredFrame {
                    view: texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default()),
                    surface_texture: Some(texture),
                }),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("PresentTarget: surface lost or outdated, reconfiguring");
                    surface.configure(device, config);
                    Err(AcquireError::Skip)
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    log::warn!("PresentTarget: timed out acquiring the surface texture");
                    Err(AcquireError::Skip)
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    Err(AcquireError::Fatal("out of memory".to_string()))
                }
                Err(e) => Err(AcquireError::Fatal(e.to_string())),
            },
        }
    }
}

fn create_offscreen_texture(device: &wgpu::Device, (width, height): (u32, u32)) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("rune offscreen color"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn create_depth_view(device: &wgpu::Device, (width, height): (u32, u32)) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("rune depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}
