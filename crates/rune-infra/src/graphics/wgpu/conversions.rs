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

//! Conversions from `rune-core` types to `wgpu` types.

use std::borrow::Cow;

use rune_core::renderer::{BindingKind, MaterialFlags, MeshTopology, TextureFormat, Vertex};

/// Format of the depth buffer every pipeline is built against.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Vertex attributes of [`Vertex`]: position, uv, normal.
pub const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];

/// A local extension trait to convert engine types into `wgpu` types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a `wgpu` type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::PrimitiveTopology> for MeshTopology {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            MeshTopology::Lines => wgpu::PrimitiveTopology::LineList,
            MeshTopology::Triangles | MeshTopology::None => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

/// `None` for formats no texture can be created with. Three-channel data is uploaded as
/// four-channel.
impl IntoWgpu<Option<wgpu::TextureFormat>> for TextureFormat {
    fn into_wgpu(self) -> Option<wgpu::TextureFormat> {
        match self {
            TextureFormat::Unknown => None,
            TextureFormat::R => Some(wgpu::TextureFormat::R8Unorm),
            TextureFormat::Rgb | TextureFormat::Rgba => Some(wgpu::TextureFormat::Rgba8UnormSrgb),
        }
    }
}

/// `None` for slots a bind group layout does not describe.
impl IntoWgpu<Option<wgpu::BindingType>> for BindingKind {
    fn into_wgpu(self) -> Option<wgpu::BindingType> {
        match self {
            BindingKind::UniformBuffer => Some(wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            }),
            BindingKind::Texture => Some(wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            }),
            BindingKind::Sampler => Some(wgpu::BindingType::Sampler(
                wgpu::SamplerBindingType::Filtering,
            )),
            BindingKind::None => None,
        }
    }
}

impl IntoWgpu<wgpu::Color> for [f32; 4] {
    fn into_wgpu(self) -> wgpu::Color {
        let [r, g, b, a] = self;
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }
    }
}

/// The layout of a mesh vertex buffer.
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: Vertex::STRIDE as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Rasterizer state for `flags`. Double-sided materials are not culled.
pub fn primitive_state(flags: MaterialFlags, topology: MeshTopology) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: topology.into_wgpu(),
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: if flags.contains(MaterialFlags::DOUBLE_SIDED) {
            None
        } else {
            Some(wgpu::Face::Back)
        },
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

/// Blending for `flags`: alpha blending for transparent materials, none otherwise.
pub fn blend_state(flags: MaterialFlags) -> Option<wgpu::BlendState> {
    flags
        .contains(MaterialFlags::TRANSPARENT)
        .then_some(wgpu::BlendState::ALPHA_BLENDING)
}

/// Depth state for `flags`.
///
/// Without `DEPTH_TEST` every fragment passes. Transparent materials test but do not write.
pub fn depth_stencil_state(flags: MaterialFlags) -> wgpu::DepthStencilState {
    let tested = flags.contains(MaterialFlags::DEPTH_TEST);
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: tested && !flags.contains(MaterialFlags::TRANSPARENT),
        depth_compare: if tested {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Pixel data laid out for upload in the format [`IntoWgpu`] picks.
pub fn texel_data(format: TextureFormat, pixels: &[u8]) -> Cow<'_, [u8]> {
    match format {
        TextureFormat::Rgb => Cow::Owned(
            pixels
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], u8::MAX])
                .collect(),
        ),
        _ => Cow::Borrowed(pixels),
    }
}

/// Bytes per texel after [`texel_data`].
pub fn uploaded_bytes_per_pixel(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::Rgb => 4,
        other => other.bytes_per_pixel() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_matches_vertex() {
        let layout = vertex_buffer_layout();
        assert_eq!(layout.array_stride, 32);
        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 20]);
    }

    #[test]
    fn test_topology_conversion() {
        assert_eq!(
            MeshTopology::Lines.into_wgpu(),
            wgpu::PrimitiveTopology::LineList
        );
        assert_eq!(
            MeshTopology::Triangles.into_wgpu(),
            wgpu::PrimitiveTopology::TriangleList
        );
    }

    #[test]
    fn test_flags_select_fixed_function_state() {
        let opaque = MaterialFlags::DEPTH_TEST;
        assert_eq!(
            primitive_state(opaque, MeshTopology::Triangles).cull_mode,
            Some(wgpu::Face::Back)
        );
        assert!(blend_state(opaque).is_none());
        assert!(depth_stencil_state(opaque).depth_write_enabled);

        let glass = MaterialFlags::DEPTH_TEST
            .union(MaterialFlags::TRANSPARENT)
            .union(MaterialFlags::DOUBLE_SIDED);
        assert_eq!(primitive_state(glass, MeshTopology::Triangles).cull_mode, None);
        assert_eq!(blend_state(glass), Some(wgpu::BlendState::ALPHA_BLENDING));
        let depth = depth_stencil_state(glass);
        assert!(!depth.depth_write_enabled);
        assert_eq!(depth.depth_compare, wgpu::CompareFunction::Less);

        assert_eq!(
            depth_stencil_state(MaterialFlags::NONE).depth_compare,
            wgpu::CompareFunction::Always
        );
    }

    #[test]
    fn test_rgb_is_expanded_to_rgba() {
        let data = texel_data(TextureFormat::Rgb, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(data.as_ref(), &[1, 2, 3, 255, 4, 5, 6, 255]);
        assert_eq!(uploaded_bytes_per_pixel(TextureFormat::Rgb), 4);
        assert!(matches!(
            texel_data(TextureFormat::R, &[7]),
            Cow::Borrowed(&[7])
        ));
        let unknown: Option<wgpu::TextureFormat> = TextureFormat::Unknown.into_wgpu();
        assert!(unknown.is_none());
    }
}
