//! Renderer crate for blurview, a GPU Gaussian blur image viewer.
//!
//! The crate owns the `wgpu` device, the two-pass separable blur and the
//! `winit` viewer window. The overall flow is:
//!
//! ```text
//!   CLI / blurview
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ RenderSubsystem ◀── key / drop / resize events (winit)
//!          │                 │
//!          │                 └─▶ render_frame()
//!          │                        ├─▶ horizontal pass ─▶ intermediate surface
//!          │                        ├─▶ vertical pass ───▶ output surface
//!          │                        └─▶ passthrough ─────▶ back buffer
//!          │
//!          └─▶ Renderer::export ─▶ headless RenderSubsystem ─▶ read_output() ─▶ PNG
//! ```
//!
//! [`RenderSubsystem`] owns every GPU object and releases them in dependency
//! order. The blur only re-runs when the radius or the source image changed,
//! so an idle window costs one composition pass per redraw.

mod compile;
mod error;
pub mod gpu;
mod source;
mod types;
mod window;

use std::path::Path;

use anyhow::{Context, Result};

pub use error::RenderError;
pub use gpu::{
    enumerate_adapters, AdapterEntry, FrameOutcome, RenderSubsystem, SurfaceSizes, RADIUS_MAX,
    RADIUS_MIN,
};
pub use source::SourceImage;
pub use types::{RendererConfig, DEFAULT_RADIUS};

/// Entry point used by the CLI.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the viewer window and blocks until it is closed.
    ///
    /// The startup image, if any, is decoded before the GPU is touched so a
    /// bad path fails fast.
    pub fn run(&self) -> Result<()> {
        let image = self.decode_startup_image()?;
        window::run_window(&self.config, image)
    }

    /// Blurs the startup image at its native size and writes it to `output`
    /// as PNG, without opening a window.
    pub fn export(&self, output: &Path) -> Result<()> {
        let image = self
            .decode_startup_image()?
            .context("an input image is required for export")?;
        let (width, height) = image.size();

        let mut subsystem = RenderSubsystem::headless(&self.config, width, height)
            .context("failed to initialise headless renderer")?;
        subsystem
            .set_image(image)
            .context("failed to upload source image")?;
        match subsystem.render_frame().context("failed to render frame")? {
            FrameOutcome::Rendered { .. } => {}
            FrameOutcome::Suspended => anyhow::bail!("renderer is suspended; nothing to export"),
        }

        let blurred = subsystem
            .read_output()
            .context("failed to read blurred output")?;
        blurred
            .save_with_format(output, image::ImageFormat::Png)
            .with_context(|| format!("failed to write {}", output.display()))?;
        tracing::info!(
            path = %output.display(),
            width,
            height,
            radius = subsystem.radius(),
            "exported blurred image"
        );
        Ok(())
    }

    fn decode_startup_image(&self) -> Result<Option<SourceImage>> {
        self.config
            .image
            .as_deref()
            .map(SourceImage::open)
            .transpose()
            .context("failed to load startup image")
    }
}
