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

//! A `winit` window presented to by the rendering backends.

use anyhow::Context;
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use rune_core::platform::{RenderWindow, RuneWindowHandle};
use std::sync::Arc;
use winit::{dpi::LogicalSize, event_loop::ActiveEventLoop, window::Window};

/// A shared `winit::window::Window` implementing [`RenderWindow`].
///
/// Cloning is cheap; every clone refers to the same native window.
#[derive(Debug, Clone)]
pub struct WinitWindow {
    inner: Arc<Window>,
}

impl WinitWindow {
    /// Wraps a window created elsewhere.
    pub fn from_window(window: Window) -> Self {
        Self {
            inner: Arc::new(window),
        }
    }

    /// The underlying `winit` window.
    pub fn window(&self) -> &Window {
        &self.inner
    }

    /// Returns `true` if `id` names this window.
    pub fn is(&self, id: winit::window::WindowId) -> bool {
        self.inner.id() == id
    }
}

/// A builder for [`WinitWindow`].
pub struct WinitWindowBuilder {
    title: String,
    width: u32,
    height: u32,
    resizable: bool,
}

impl WinitWindowBuilder {
    /// Creates a builder for a resizable 1024x768 window.
    pub fn new() -> Self {
        Self {
            title: "rune".to_string(),
            width: 1024,
            height: 768,
            resizable: true,
        }
    }

    /// Sets the title of the window to be built.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the initial inner size, in logical pixels.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets whether the user can resize the window.
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Creates the window on `event_loop`.
    ///
    /// # Errors
    /// Fails if the platform refuses to create the window.
    pub fn build(self, event_loop: &ActiveEventLoop) -> anyhow::Result<WinitWindow> {
        log::info!(
            "WinitWindowBuilder: creating '{}' ({}x{})",
            self.title,
            self.width,
            self.height
        );

        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
            .with_visible(true);

        let window = event_loop
            .create_window(attributes)
            .with_context(|| format!("failed to create window '{}'", self.title))?;

        log::info!("WinitWindowBuilder: window {:?} created", window.id());
        Ok(WinitWindow::from_window(window))
    }
}

impl Default for WinitWindowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HasWindowHandle for WinitWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.inner.window_handle()
    }
}

impl HasDisplayHandle for WinitWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.inner.display_handle()
    }
}

impl RenderWindow for WinitWindow {
    fn inner_size(&self) -> (u32, u32) {
        let size = self.inner.inner_size();
        (size.width, size.height)
    }

    fn scale_factor(&self) -> f64 {
        self.inner.scale_factor()
    }

    fn request_redraw(&self) {
        self.inner.request_redraw();
    }

    fn clone_handle_arc(&self) -> RuneWindowHandle {
        self.inner.clone()
    }

    fn id(&self) -> u64 {
        u64::from(self.inner.id())
    }
}
