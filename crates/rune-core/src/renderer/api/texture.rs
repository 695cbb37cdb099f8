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

//! Defines the texture asset and its pixel formats.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use crate::asset::{Asset, AssetId};
use crate::renderer::error::ResourceError;
use crate::renderer::observer::{ObserverList, TextureObserver};

/// The channel layout of a texture's pixel data. Every channel is one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// No known layout. Such a texture cannot be realized.
    #[default]
    Unknown,
    /// One channel.
    R,
    /// Three channels.
    Rgb,
    /// Four channels.
    Rgba,
}

impl TextureFormat {
    /// Maps a channel count as reported by image decoders (1, 3 or 4).
    pub fn from_channels(channels: u32) -> Self {
        match channels {
            1 => TextureFormat::R,
            3 => TextureFormat::Rgb,
            4 => TextureFormat::Rgba,
            _ => TextureFormat::Unknown,
        }
    }

    /// Bytes per pixel, or zero for [`TextureFormat::Unknown`].
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Unknown => 0,
            TextureFormat::R => 1,
            TextureFormat::Rgb => 3,
            TextureFormat::Rgba => 4,
        }
    }
}

/// Everything a backend needs to create a texture.
#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format of `pixels`.
    pub format: TextureFormat,
    /// Tightly packed rows of pixels.
    pub pixels: &'a [u8],
}

impl TextureDescriptor<'_> {
    /// Checks that the pixel data matches the dimensions and format.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.format == TextureFormat::Unknown {
            return Err(ResourceError::InvalidDescriptor(
                "texture format is unknown".to_string(),
            ));
        }
        let expected =
            self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        if self.pixels.len() != expected {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{}x{} {:?} texture needs {expected} bytes, got {}",
                self.width,
                self.height,
                self.format,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TextureData {
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: Vec<u8>,
}

/// A texture asset: raw pixel bytes with their dimensions and format.
pub struct Texture {
    id: AssetId,
    data: RefCell<TextureData>,
    observers: ObserverList<dyn TextureObserver>,
}

impl Texture {
    /// Creates an empty texture with an unknown format.
    pub fn empty() -> Rc<Self> {
        Rc::new(Self {
            id: AssetId::new(),
            data: RefCell::new(TextureData::default()),
            observers: ObserverList::new(),
        })
    }

    /// Creates a texture from pixel data.
    pub fn new(
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Vec<u8>,
    ) -> Result<Rc<Self>, ResourceError> {
        let texture = Self::empty();
        texture.init(width, height, format, pixels)?;
        Ok(texture)
    }

    /// Replaces the pixel data and notifies observers.
    ///
    /// The data is rejected, and the texture left untouched, if its length does not match
    /// `width * height * bytes_per_pixel`.
    pub fn init(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Vec<u8>,
    ) -> Result<(), ResourceError> {
        TextureDescriptor {
            width,
            height,
            format,
            pixels: &pixels,
        }
        .validate()?;
        *self.data.borrow_mut() = TextureData {
            width,
            height,
            format,
            pixels,
        };
        self.observers.notify(|o| o.texture_changed(self));
        Ok(())
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.data.borrow().width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.data.borrow().height
    }

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.data.borrow().format
    }

    /// Raw pixel bytes.
    pub fn pixels(&self) -> Ref<'_, [u8]> {
        Ref::map(self.data.borrow(), |d| d.pixels.as_slice())
    }

    /// Runs `f` with a descriptor borrowing this texture's data.
    pub fn with_descriptor<R>(&self, f: impl FnOnce(&TextureDescriptor<'_>) -> R) -> R {
        let data = self.data.borrow();
        f(&TextureDescriptor {
            width: data.width,
            height: data.height,
            format: data.format,
            pixels: &data.pixels,
        })
    }

    /// Subscribes an observer.
    pub fn attach_observer(&self, observer: Weak<dyn TextureObserver>) {
        self.observers.attach(observer);
    }

    /// Unsubscribes an observer.
    pub fn detach_observer(&self, observer: &Weak<dyn TextureObserver>) {
        self.observers.detach(observer);
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Asset for Texture {
    fn id(&self) -> AssetId {
        self.id
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("width", &data.width)
            .field("height", &data.height)
            .field("format", &data.format)
            .finish_non_exhaustive()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.observers.notify(|o| o.texture_destroying(self));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_channels() {
        assert_eq!(TextureFormat::from_channels(1), TextureFormat::R);
        assert_eq!(TextureFormat::from_channels(3), TextureFormat::Rgb);
        assert_eq!(TextureFormat::from_channels(4), TextureFormat::Rgba);
        assert_eq!(TextureFormat::from_channels(2), TextureFormat::Unknown);
    }

    #[test]
    fn test_new_texture_keeps_data() {
        let texture = Texture::new(2, 1, TextureFormat::Rgb, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!((texture.width(), texture.height()), (2, 1));
        assert_eq!(texture.format(), TextureFormat::Rgb);
        assert_eq!(&*texture.pixels(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_mismatched_pixel_count_rejected() {
        let texture = Texture::new(2, 2, TextureFormat::Rgba, vec![0; 15]).unwrap_err();
        assert!(matches!(texture, ResourceError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_failed_init_leaves_texture_untouched() {
        let texture = Texture::new(1, 1, TextureFormat::R, vec![9]).unwrap();
        assert!(texture.init(4, 4, TextureFormat::Unknown, vec![]).is_err());
        assert_eq!(texture.format(), TextureFormat::R);
        assert_eq!(&*texture.pixels(), &[9]);
    }
}
