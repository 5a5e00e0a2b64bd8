use std::sync::Arc;

use winit::window::Window;

use crate::error::RenderError;
use crate::source::{SourceImage, SourceTexture};
use crate::types::RendererConfig;

use super::adapters::{AdapterEntry, AdapterSelector};
use super::blur::{apply_blur, compose, BlurTargets};
use super::context::DeviceContext;
use super::pipeline::BlurPipelineState;
use super::recompute::RecomputeController;
use super::settings::clamp_radius;

/// A rectangle in framebuffer pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Largest rectangle with the aspect ratio of `content`, centred in `region`.
pub fn fit_viewport(content: (u32, u32), region: (u32, u32)) -> Viewport {
    let (content_w, content_h) = (content.0 as f32, content.1 as f32);
    let (region_w, region_h) = (region.0 as f32, region.1 as f32);
    if content.0 == 0 || content.1 == 0 || region.0 == 0 || region.1 == 0 {
        return Viewport::full(region.0, region.1);
    }
    let scale = (region_w / content_w).min(region_h / content_h);
    let width = content_w * scale;
    let height = content_h * scale;
    Viewport {
        x: ((region_w - width) / 2.0).floor(),
        y: ((region_h - height) / 2.0).floor(),
        width,
        height,
    }
}

/// What [`RenderSubsystem::render_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was composed; `blurred` is true when the blur ran this frame.
    Rendered { blurred: bool },
    /// No device is live; nothing was drawn.
    Suspended,
}

/// Sizes of the surfaces currently owned by the subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSizes {
    pub back_buffer: (u32, u32),
    pub intermediate: Option<(u32, u32)>,
    pub output: Option<(u32, u32)>,
}

/// Everything that belongs to one device. Declaration order is release order:
/// the uploaded source, the blur surfaces and the pipeline all go before the
/// device context that created them.
struct GpuResources {
    source: Option<SourceTexture>,
    targets: Option<BlurTargets>,
    pipeline: Option<BlurPipelineState>,
    context: DeviceContext,
}

impl GpuResources {
    fn teardown(self) {
        let Self {
            source,
            targets,
            pipeline,
            context,
        } = self;
        drop(source);
        drop(targets);
        drop(pipeline);
        context.teardown();
    }
}

/// The single owned object behind the viewer: adapter list, live device,
/// blur resources, recompute state and the retained source image.
pub struct RenderSubsystem {
    gpu: Option<GpuResources>,
    window: Option<Arc<Window>>,
    adapters: AdapterSelector,
    instance: wgpu::Instance,
    controller: RecomputeController,
    image: Option<SourceImage>,
    radius: f32,
    size: (u32, u32),
    vsync: bool,
    blur_valid: bool,
    generation: u64,
}

impl RenderSubsystem {
    /// Builds a subsystem presenting into `window`.
    ///
    /// A device that cannot be created is logged and leaves the subsystem
    /// suspended so the window stays responsive; an empty or out-of-range
    /// adapter list is returned as an error.
    pub fn windowed(window: Arc<Window>, config: &RendererConfig) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let mut subsystem = Self::new(
            Some(window),
            config,
            (size.width.max(1), size.height.max(1)),
        )?;
        if let Err(err) = subsystem.rebuild() {
            tracing::error!(error = %err, "rendering suspended until another adapter is selected");
        }
        Ok(subsystem)
    }

    /// Builds a subsystem that renders into an offscreen back buffer.
    pub fn headless(
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let mut subsystem = Self::new(None, config, (width, height))?;
        subsystem.rebuild()?;
        Ok(subsystem)
    }

    fn new(
        window: Option<Arc<Window>>,
        config: &RendererConfig,
        size: (u32, u32),
    ) -> Result<Self, RenderError> {
        let instance = create_instance();
        let mut adapters = AdapterSelector::enumerate(&instance);
        adapters.select(config.adapter_index)?;
        let radius = config.effective_radius();
        Ok(Self {
            gpu: None,
            window,
            adapters,
            instance,
            controller: RecomputeController::new(radius),
            image: None,
            radius,
            size,
            vsync: config.vsync,
            blur_valid: false,
            generation: 0,
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = clamp_radius(radius);
        self.controller.on_radius_changed(self.radius);
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    /// Decodes `path` and makes it the source image. The previous image stays
    /// in place when decoding fails.
    pub fn load_image(&mut self, path: &std::path::Path) -> Result<(), RenderError> {
        let image = SourceImage::open(path)?;
        self.set_image(image)
    }

    /// Replaces the source image and uploads it to the live device.
    ///
    /// The image is kept even if the upload fails, so a later device rebuild
    /// can try again.
    pub fn set_image(&mut self, image: SourceImage) -> Result<(), RenderError> {
        let upload = match &mut self.gpu {
            Some(gpu) => {
                let uploaded =
                    SourceTexture::upload(&gpu.context.device, &gpu.context.queue, &image);
                match uploaded {
                    Ok(texture) => {
                        gpu.source = Some(texture);
                        Ok(())
                    }
                    Err(err) => {
                        gpu.source = None;
                        Err(err)
                    }
                }
            }
            None => Ok(()),
        };
        self.image = Some(image);
        self.blur_valid = false;
        self.controller.on_image_loaded();
        upload
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Resizes the back buffer and both blur surfaces.
    ///
    /// Zero dimensions are ignored. The replacement blur surfaces are created
    /// before the old ones are released; when anything fails the old set stays
    /// bound and the error is returned.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, RenderError> {
        if width == 0 || height == 0 {
            return Ok(false);
        }
        let Some(gpu) = self.gpu.as_mut() else {
            self.size = (width, height);
            return Ok(true);
        };

        let targets = BlurTargets::create(&gpu.context.device, width, height)?;
        gpu.context.resize(width, height)?;
        gpu.targets = Some(targets);

        self.size = (width, height);
        self.blur_valid = false;
        self.controller.invalidate();
        tracing::debug!(width, height, "resized render surfaces");
        Ok(true)
    }

    /// Re-applies the presentation chain configuration after it was lost.
    pub fn reconfigure(&mut self) -> Result<(), RenderError> {
        match self.gpu.as_mut() {
            Some(gpu) => gpu.context.reconfigure(),
            None => Ok(()),
        }
    }

    pub fn adapters(&self) -> &[AdapterEntry] {
        self.adapters.entries()
    }

    pub fn selected_adapter(&self) -> Option<&AdapterEntry> {
        self.adapters.selected_entry()
    }

    /// Index the next adapter-cycle request should switch to.
    pub fn next_adapter_index(&self) -> usize {
        self.adapters.next_index()
    }

    /// Switches to adapter `index`, rebuilding every GPU object.
    ///
    /// Selecting the current adapter is a no-op unless rendering is suspended.
    pub fn select_adapter(&mut self, index: usize) -> Result<(), RenderError> {
        let changed = self.adapters.select(index)?;
        if !changed && self.gpu.is_some() {
            return Ok(());
        }
        self.reset_device()
    }

    /// Tears down the device and everything created from it, then builds it
    /// again on the selected adapter at the current size.
    pub fn reset_device(&mut self) -> Result<(), RenderError> {
        if let Some(previous) = self.gpu.take() {
            previous.teardown();
        }
        self.rebuild()
    }

    fn rebuild(&mut self) -> Result<(), RenderError> {
        debug_assert!(self.gpu.is_none());
        self.blur_valid = false;
        self.controller.invalidate();

        let adapter = self.adapters.adapter()?;
        let entry = self
            .adapters
            .selected_entry()
            .ok_or(RenderError::NoAdapters)?;
        let (width, height) = self.size;
        let context = match &self.window {
            Some(window) => DeviceContext::windowed(
                &self.instance,
                adapter,
                entry,
                window.as_ref(),
                width,
                height,
                self.vsync,
            )?,
            None => DeviceContext::headless(adapter, entry, width, height)?,
        };

        let pipeline = BlurPipelineState::build(&context.device, context.present_format())
            .map_err(|err| tracing::error!(error = %err, "blur pipeline unavailable"))
            .ok();
        let targets = BlurTargets::create(&context.device, width, height)
            .map_err(|err| tracing::error!(error = %err, "blur surfaces unavailable"))
            .ok();
        let source = self.image.as_ref().and_then(|image| {
            SourceTexture::upload(&context.device, &context.queue, image)
                .map_err(|err| tracing::error!(error = %err, "source image upload failed"))
                .ok()
        });

        self.generation += 1;
        tracing::info!(
            adapter = %entry.name,
            generation = self.generation,
            windowed = context.is_windowed(),
            "render subsystem ready"
        );
        self.gpu = Some(GpuResources {
            source,
            targets,
            pipeline,
            context,
        });
        Ok(())
    }

    /// True when no device is live and frames are skipped.
    pub fn is_suspended(&self) -> bool {
        self.gpu.is_none()
    }

    /// Incremented every time the device is rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn surface_sizes(&self) -> Option<SurfaceSizes> {
        let gpu = self.gpu.as_ref()?;
        Some(SurfaceSizes {
            back_buffer: gpu.context.back_buffer_size(),
            intermediate: gpu.targets.as_ref().map(|t| t.intermediate.size()),
            output: gpu.targets.as_ref().map(|t| t.output.size()),
        })
    }

    /// Runs the blur if the output is stale, then composes and presents.
    ///
    /// A failed blur is logged and the unblurred source is shown instead;
    /// only presentation chain errors are returned.
    pub fn render_frame(&mut self) -> Result<FrameOutcome, RenderError> {
        let Self {
            gpu,
            controller,
            blur_valid,
            ..
        } = self;
        let Some(gpu) = gpu.as_mut() else {
            return Ok(FrameOutcome::Suspended);
        };

        let mut blurred = false;
        if let (Some(pipeline), Some(targets), Some(source)) =
            (&gpu.pipeline, &gpu.targets, &gpu.source)
        {
            let device = &gpu.context.device;
            let queue = &gpu.context.queue;
            let result = controller.run_if_dirty(|radius| {
                apply_blur(device, queue, pipeline, source.view(), targets, radius)
            });
            match result {
                Ok(ran) => {
                    blurred = ran;
                    *blur_valid |= ran;
                }
                Err(err) => {
                    *blur_valid = false;
                    tracing::error!(error = %err, "blur failed; showing the unblurred image");
                }
            }
        }

        let displayed = match (&gpu.targets, &gpu.source) {
            (Some(targets), Some(_)) if *blur_valid => targets.output.sampled_view(),
            (_, Some(source)) => Some(source.view()),
            _ => None,
        };
        let content = gpu.source.as_ref().map(SourceTexture::size).unwrap_or((0, 0));

        let frame = gpu.context.acquire_frame()?;
        let viewport = fit_viewport(content, gpu.context.back_buffer_size());
        compose(
            &gpu.context.device,
            &gpu.context.queue,
            gpu.pipeline.as_ref(),
            frame.view(),
            displayed,
            viewport,
        );
        frame.present();

        Ok(FrameOutcome::Rendered { blurred })
    }

    /// Copies the blurred output surface back as an RGBA image.
    pub fn read_output(&self) -> Result<image::RgbaImage, RenderError> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or_else(|| RenderError::Readback("rendering is suspended".into()))?;
        let targets = gpu
            .targets
            .as_ref()
            .ok_or_else(|| RenderError::Readback("blur surfaces are unavailable".into()))?;
        if !self.blur_valid {
            return Err(RenderError::Readback(
                "no blurred output has been produced".into(),
            ));
        }
        let (width, height) = targets.output.size();
        let pixels = targets
            .output
            .read_back(&gpu.context.device, &gpu.context.queue)?;
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("readback size mismatch".into()))
    }
}

impl Drop for RenderSubsystem {
    fn drop(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            gpu.teardown();
        }
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

/// Lists the adapters visible to a fresh instance.
pub fn enumerate_adapters() -> Vec<AdapterEntry> {
    AdapterSelector::enumerate(&create_instance())
        .entries()
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_is_letterboxed() {
        let viewport = fit_viewport((200, 100), (800, 600));
        assert_eq!(viewport.width, 800.0);
        assert_eq!(viewport.height, 400.0);
        assert_eq!(viewport.x, 0.0);
        assert_eq!(viewport.y, 100.0);
    }

    #[test]
    fn tall_image_is_pillarboxed() {
        let viewport = fit_viewport((100, 200), (800, 600));
        assert_eq!(viewport.height, 600.0);
        assert_eq!(viewport.width, 300.0);
        assert_eq!(viewport.x, 250.0);
        assert_eq!(viewport.y, 0.0);
    }

    #[test]
    fn small_images_scale_up_to_fit() {
        let viewport = fit_viewport((4, 4), (1280, 720));
        assert_eq!((viewport.width, viewport.height), (720.0, 720.0));
        assert_eq!(viewport.x, 280.0);
    }

    #[test]
    fn empty_content_fills_region() {
        assert_eq!(fit_viewport((0, 0), (640, 480)), Viewport::full(640, 480));
    }
}
