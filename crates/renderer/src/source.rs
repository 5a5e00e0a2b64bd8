use std::path::{Path, PathBuf};

use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::RenderError;
use crate::gpu::with_error_scope;

/// Decoded RGBA8 pixels of the image being viewed.
///
/// The CPU copy outlives any device so the texture can be uploaded again
/// after an adapter switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    path: Option<PathBuf>,
}

impl SourceImage {
    /// Decodes a PNG, JPEG, BMP or TIFF file.
    pub fn open(path: &Path) -> Result<Self, RenderError> {
        let decoded = image::open(path).map_err(|source| RenderError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        tracing::info!(path = %path.display(), width, height, "loaded source image");
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Wraps tightly packed RGBA8 rows. Returns `None` when the buffer length
    /// does not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
            path: None,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// File name for display, or a placeholder for in-memory images.
    pub fn display_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// The uploaded source image; the blur only ever samples it.
pub(crate) struct SourceTexture {
    view: wgpu::TextureView,
    _texture: wgpu::Texture,
    width: u32,
    height: u32,
}

impl SourceTexture {
    pub(crate) fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &SourceImage,
    ) -> Result<Self, RenderError> {
        crate::gpu::validate_dimensions(
            image.width,
            image.height,
            device.limits().max_texture_dimension_2d,
        )?;

        let (texture, view) = with_error_scope(device, || {
            let texture = device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some("source image"),
                    size: wgpu::Extent3d {
                        width: image.width,
                        height: image.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                TextureDataOrder::LayerMajor,
                &image.pixels,
            );
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        })
        .map_err(|err| RenderError::resource("source image texture", err))?;

        Ok(Self {
            view,
            _texture: texture,
            width: image.width,
            height: image.height,
        })
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgba_checks_buffer_length() {
        assert!(SourceImage::from_rgba(2, 2, vec![0; 16]).is_some());
        assert!(SourceImage::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(SourceImage::from_rgba(u32::MAX, u32::MAX, Vec::new()).is_none());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SourceImage::open(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, RenderError::ImageLoad { .. }));
        assert!(err.to_string().contains("not/here.png"));
        assert!(!err.is_device_fatal());
    }

    #[test]
    fn display_name_uses_file_name() {
        let image = SourceImage::from_rgba(1, 1, vec![255; 4]).unwrap();
        assert_eq!(image.display_name(), "<memory>");

        let opened = SourceImage {
            path: Some(PathBuf::from("/photos/harbour.png")),
            ..image
        };
        assert_eq!(opened.display_name(), "harbour.png");
    }
}
