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

//! Rune sandbox: renders a spinning cube through the configured backend.
//!
//! Usage: `sandbox [config.json]`. The file holds a `GraphicsConfig`; defaults are used when
//! it is missing.

mod scene;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Vec3;
use rune_core::platform::RenderWindow;
use rune_core::renderer::{ConfigError, GraphicsConfig};
use rune_core::GraphicsSystem;
use rune_infra::{register_default_renderers, WinitWindow, WinitWindowBuilder};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::WindowId;

use scene::CubeScene;

struct Sandbox {
    config: GraphicsConfig,
    window: Option<Arc<WinitWindow>>,
    system: Option<GraphicsSystem>,
    scene: Option<CubeScene>,
    started: Instant,
}

impl Sandbox {
    fn new(config: GraphicsConfig) -> Self {
        Self {
            config,
            window: None,
            system: None,
            scene: None,
            started: Instant::now(),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Arc::new(
            WinitWindowBuilder::new()
                .with_title("rune sandbox")
                .build(event_loop)?,
        );

        let mut system = GraphicsSystem::new(self.config.clone());
        register_default_renderers(&mut system);
        system.set_window(Some(window.clone() as Arc<dyn RenderWindow>))?;
        system
            .set_rendering_api(self.config.rendering_api)
            .with_context(|| format!("cannot start the '{}' backend", self.config.rendering_api))?;

        self.scene = Some(CubeScene::new(Vec3::from(self.config.ambient_light))?);
        self.system = Some(system);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) {
        let (Some(window), Some(system), Some(scene)) =
            (self.window.as_ref(), self.system.as_mut(), self.scene.as_ref())
        else {
            return;
        };

        let (width, height) = window.inner_size();
        if width == 0 || height == 0 {
            return;
        }
        let seconds = self.started.elapsed().as_secs_f32();
        scene.submit(system, width as f32 / height as f32, seconds);

        match system.render() {
            Ok(stats) => log::trace!(
                "Sandbox: frame {} ({} draws, {} triangles)",
                stats.frame_number,
                stats.draw_calls,
                stats.triangles
            ),
            Err(e) => log::error!("Sandbox: rendering error: {e}"),
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        // Backend resources go before the assets they mirror and before the window.
        if let Some(mut system) = self.system.take() {
            system.shutdown();
        }
        self.scene = None;
        log::info!("Sandbox: shutdown complete");
    }
}

impl ApplicationHandler for Sandbox {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("Sandbox: startup failed: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if !self.window.as_ref().is_some_and(|w| w.is(id)) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Sandbox: close requested, exiting event loop...");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(system) = self.system.as_mut() {
                    log::debug!("Sandbox: window resized to {}x{}", size.width, size.height);
                    system.on_framebuffer_size(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn load_config() -> Result<GraphicsConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(GraphicsConfig::default());
    };
    match GraphicsConfig::load(&path) {
        Ok(config) => {
            log::info!("Sandbox: loaded configuration from {path}");
            Ok(config)
        }
        Err(ConfigError::Io(e)) => {
            log::warn!("Sandbox: cannot read {path} ({e}), using the default configuration");
            Ok(GraphicsConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("invalid configuration in {path}")),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .init();

    let config = load_config()?;
    log::info!("Sandbox: starting with the '{}' backend", config.rendering_api);

    let event_loop = EventLoop::new()?;
    let mut sandbox = Sandbox::new(config);
    event_loop.run_app(&mut sandbox)?;
    Ok(())
}
