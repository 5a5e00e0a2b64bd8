use std::sync::mpsc;

use crate::error::RenderError;

use super::with_error_scope;

/// Pixel format shared by the source upload and both blur surfaces.
pub(crate) const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const BYTES_PER_PIXEL: u32 = 4;

/// Which views a [`SurfaceResource`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceViews {
    pub render: bool,
    pub sampled: bool,
}

impl SurfaceViews {
    pub const RENDER_ONLY: SurfaceViews = SurfaceViews {
        render: true,
        sampled: false,
    };
    pub const RENDER_AND_SAMPLED: SurfaceViews = SurfaceViews {
        render: true,
        sampled: true,
    };
}

/// A texture plus the views used to write and read it, bound to one size.
///
/// Both views are created from the same texture, so they always agree on
/// dimensions. Views are declared before the texture and drop first.
pub struct SurfaceResource {
    render_view: Option<wgpu::TextureView>,
    sampled_view: Option<wgpu::TextureView>,
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

impl SurfaceResource {
    pub(crate) fn create(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        views: SurfaceViews,
    ) -> Result<Self, RenderError> {
        validate_dimensions(width, height, device.limits().max_texture_dimension_2d)?;

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        if views.sampled {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }

        let (texture, render_view, sampled_view) = with_error_scope(device, || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: SURFACE_FORMAT,
                usage,
                view_formats: &[],
            });
            let render_view = views.render.then(|| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("{label} render view")),
                    ..Default::default()
                })
            });
            let sampled_view = views.sampled.then(|| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("{label} sampled view")),
                    ..Default::default()
                })
            });
            (texture, render_view, sampled_view)
        })
        .map_err(|err| RenderError::resource(label, err))?;

        tracing::debug!(label, width, height, ?views, "created surface resource");

        Ok(Self {
            render_view,
            sampled_view,
            texture,
            width,
            height,
        })
    }

    pub fn render_view(&self) -> Option<&wgpu::TextureView> {
        self.render_view.as_ref()
    }

    pub fn sampled_view(&self) -> Option<&wgpu::TextureView> {
        self.sampled_view.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Copies the texture back to the CPU as tightly packed RGBA8 rows.
    pub(crate) fn read_back(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Vec<u8>, RenderError> {
        let unpadded_row = self.width * BYTES_PER_PIXEL;
        let padded_row = padded_bytes_per_row(self.width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("surface readback"),
            size: u64::from(padded_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| RenderError::Readback(err.to_string()))?;
        receiver
            .recv()
            .map_err(|_| RenderError::Readback("map callback dropped".into()))?
            .map_err(|err| RenderError::Readback(err.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded_row * self.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_row as usize]);
            }
        }
        buffer.unmap();
        Ok(pixels)
    }
}

pub(crate) fn validate_dimensions(width: u32, height: u32, max: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 || width > max || height > max {
        return Err(RenderError::InvalidDimensions { width, height, max });
    }
    Ok(())
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_and_oversized_dimensions() {
        assert!(validate_dimensions(0, 720, 8192).is_err());
        assert!(validate_dimensions(1280, 0, 8192).is_err());
        assert!(validate_dimensions(8193, 10, 8192).is_err());
        assert!(validate_dimensions(1280, 720, 8192).is_ok());
        assert!(validate_dimensions(8192, 8192, 8192).is_ok());
    }

    #[test]
    fn readback_rows_respect_copy_alignment() {
        assert_eq!(padded_bytes_per_row(4), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1280) % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
    }
}
