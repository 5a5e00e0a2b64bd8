use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::compile::{compile_stage, BlurStage};
use crate::error::RenderError;

use super::settings::BlurSettings;
use super::surface::SURFACE_FORMAT;
use super::with_error_scope;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct FullscreenVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// One triangle that over-covers clip space; the visible part maps to uv 0..1
/// with v growing downwards.
pub(crate) const FULLSCREEN_TRIANGLE: [FullscreenVertex; 3] = [
    FullscreenVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    FullscreenVertex {
        position: [-1.0, 3.0],
        uv: [0.0, -1.0],
    },
    FullscreenVertex {
        position: [3.0, -1.0],
        uv: [2.0, 1.0],
    },
];

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

impl FullscreenVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<FullscreenVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        }
    }
}

/// Compiled programs and the fixed objects every blur and composition pass uses.
///
/// Built once per device and never mutated afterwards, apart from the contents
/// of the settings buffer which each pass rewrites.
pub(crate) struct BlurPipelineState {
    pub horizontal: wgpu::RenderPipeline,
    pub vertical: wgpu::RenderPipeline,
    pub passthrough: wgpu::RenderPipeline,
    pub vertex_buffer: wgpu::Buffer,
    pub settings_buffer: wgpu::Buffer,
    pub sampler: wgpu::Sampler,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl BlurPipelineState {
    pub(crate) fn build(
        device: &wgpu::Device,
        present_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let vertex = compile_stage(device, BlurStage::FullscreenVertex)?;
        let horizontal_fragment = compile_stage(device, BlurStage::HorizontalBlur)?;
        let vertical_fragment = compile_stage(device, BlurStage::VerticalBlur)?;
        let passthrough_fragment = compile_stage(device, BlurStage::Passthrough)?;

        let bind_group_layout = with_error_scope(device, || {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("blur bind group layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(BlurSettings::SIZE),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            })
        })
        .map_err(|err| RenderError::resource("blur bind group layout", err))?;

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blur pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline =
            |label: &str, fragment: &wgpu::ShaderModule, format: wgpu::TextureFormat| {
            with_error_scope(device, || {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &vertex,
                        entry_point: Some("main"),
                        buffers: &[FullscreenVertex::layout()],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module: fragment,
                        entry_point: Some("main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    multiview: None,
                    cache: None,
                })
            })
            .map_err(|err| RenderError::resource(label, err))
        };

        let horizontal = make_pipeline(
            "horizontal blur pipeline",
            &horizontal_fragment,
            SURFACE_FORMAT,
        )?;
        let vertical =
            make_pipeline("vertical blur pipeline", &vertical_fragment, SURFACE_FORMAT)?;
        let passthrough =
            make_pipeline("passthrough pipeline", &passthrough_fragment, present_format)?;

        let (vertex_buffer, settings_buffer, sampler) = with_error_scope(device, || {
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fullscreen triangle"),
                contents: bytemuck::cast_slice(&FULLSCREEN_TRIANGLE),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let settings_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("blur settings"),
                size: BlurSettings::SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("linear clamp sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });
            (vertex_buffer, settings_buffer, sampler)
        })
        .map_err(|err| RenderError::resource("blur buffers and sampler", err))?;

        tracing::debug!(?present_format, "built blur pipeline state");

        Ok(Self {
            horizontal,
            vertical,
            passthrough,
            vertex_buffer,
            settings_buffer,
            sampler,
            bind_group_layout,
        })
    }

    /// Binds the settings buffer, `source` and the sampler for one pass.
    pub(crate) fn bind_group(
        &self,
        device: &wgpu::Device,
        label: &str,
        source: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.settings_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Barycentric interpolation of a vertex attribute at clip position `p`.
    fn interpolate(p: [f32; 2], attr: impl Fn(&FullscreenVertex) -> [f32; 2]) -> [f32; 2] {
        let [a, b, c] = FULLSCREEN_TRIANGLE;
        let (ax, ay) = (a.position[0], a.position[1]);
        let (bx, by) = (b.position[0], b.position[1]);
        let (cx, cy) = (c.position[0], c.position[1]);
        let det = (by - cy) * (ax - cx) + (cx - bx) * (ay - cy);
        let wa = ((by - cy) * (p[0] - cx) + (cx - bx) * (p[1] - cy)) / det;
        let wb = ((cy - ay) * (p[0] - cx) + (ax - cx) * (p[1] - cy)) / det;
        let wc = 1.0 - wa - wb;
        assert!(wa >= -1e-6 && wb >= -1e-6 && wc >= -1e-6, "{p:?} outside triangle");
        let (ta, tb, tc) = (attr(&a), attr(&b), attr(&c));
        [
            wa * ta[0] + wb * tb[0] + wc * tc[0],
            wa * ta[1] + wb * tb[1] + wc * tc[1],
        ]
    }

    #[test]
    fn triangle_covers_clip_space_with_unit_uvs() {
        let corners = [
            ([-1.0, -1.0], [0.0, 1.0]),
            ([1.0, -1.0], [1.0, 1.0]),
            ([-1.0, 1.0], [0.0, 0.0]),
            ([1.0, 1.0], [1.0, 0.0]),
        ];
        for (position, expected) in corners {
            let uv = interpolate(position, |vertex| vertex.uv);
            assert!((uv[0] - expected[0]).abs() < 1e-5, "{position:?} -> {uv:?}");
            assert!((uv[1] - expected[1]).abs() < 1e-5, "{position:?} -> {uv:?}");
        }
    }

    #[test]
    fn vertex_layout_matches_shader_locations() {
        let layout = FullscreenVertex::layout();
        assert_eq!(layout.array_stride, 16);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[0].shader_location, 0);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].shader_location, 1);
        assert_eq!(layout.attributes[1].offset, 8);
    }
}
