use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::RenderError;

use super::adapters::AdapterEntry;
use super::surface::{SurfaceResource, SurfaceViews, SURFACE_FORMAT};
use super::with_error_scope;

/// Where composed frames end up.
enum Presentation {
    /// A swapchain bound to a window.
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// An offscreen back buffer standing in for the swapchain.
    Offscreen { back_buffer: SurfaceResource },
}

/// A back buffer acquired for one frame.
pub(crate) enum Frame<'a> {
    Window {
        texture: wgpu::SurfaceTexture,
        view: wgpu::TextureView,
    },
    Offscreen {
        view: &'a wgpu::TextureView,
    },
}

impl Frame<'_> {
    pub(crate) fn view(&self) -> &wgpu::TextureView {
        match self {
            Frame::Window { view, .. } => view,
            Frame::Offscreen { view } => view,
        }
    }

    pub(crate) fn present(self) {
        if let Frame::Window { texture, view } = self {
            drop(view);
            texture.present();
        }
    }
}

/// Device, queue and presentation chain for the selected adapter.
///
/// Fields are declared in release order: the presentation chain goes first,
/// then the queue, then the device.
pub(crate) struct DeviceContext {
    presentation: Presentation,
    pub(crate) queue: wgpu::Queue,
    pub(crate) device: wgpu::Device,
    adapter: AdapterEntry,
    present_format: wgpu::TextureFormat,
}

impl DeviceContext {
    /// Creates the device and a swapchain for `target` sized `width`x`height`.
    pub(crate) fn windowed<T>(
        instance: &wgpu::Instance,
        adapter: &wgpu::Adapter,
        entry: &AdapterEntry,
        target: &T,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, RenderError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let fatal = |reason: String| RenderError::DeviceFatal {
            adapter: entry.name.clone(),
            reason,
        };

        let window_handle = target
            .window_handle()
            .map_err(|err| fatal(format!("failed to acquire window handle: {err}")))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| fatal(format!("failed to acquire display handle: {err}")))?;

        // SAFETY: the caller keeps the window alive for as long as this context.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| fatal(format!("failed to create rendering surface: {err}")))?;

        if !adapter.is_surface_supported(&surface) {
            return Err(fatal("adapter cannot present to this window".into()));
        }

        let (device, queue) = request_device(adapter, entry)?;

        let caps = surface.get_capabilities(adapter);
        let Some(&fallback_format) = caps.formats.first() else {
            return Err(fatal("surface reports no supported formats".into()));
        };
        // Stored pixels are already display-encoded, so skip the sRGB conversion.
        let present_format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or(fallback_format);
        let present_mode = select_present_mode(&caps.present_modes, vsync);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: present_format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        with_error_scope(&device, || surface.configure(&device, &config))
            .map_err(|err| fatal(format!("failed to configure presentation chain: {err}")))?;

        tracing::info!(
            adapter = %entry.name,
            backend = ?entry.backend,
            ?present_format,
            ?present_mode,
            width = config.width,
            height = config.height,
            "initialised windowed device context"
        );

        Ok(Self {
            presentation: Presentation::Window { surface, config },
            queue,
            device,
            adapter: entry.clone(),
            present_format,
        })
    }

    /// Creates the device with an offscreen back buffer in place of a swapchain.
    pub(crate) fn headless(
        adapter: &wgpu::Adapter,
        entry: &AdapterEntry,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let (device, queue) = request_device(adapter, entry)?;
        let back_buffer = SurfaceResource::create(
            &device,
            "back buffer",
            width,
            height,
            SurfaceViews::RENDER_ONLY,
        )?;

        tracing::info!(
            adapter = %entry.name,
            backend = ?entry.backend,
            width,
            height,
            "initialised headless device context"
        );

        Ok(Self {
            presentation: Presentation::Offscreen { back_buffer },
            queue,
            device,
            adapter: entry.clone(),
            present_format: SURFACE_FORMAT,
        })
    }

    pub(crate) fn present_format(&self) -> wgpu::TextureFormat {
        self.present_format
    }

    /// Dimensions of the back buffer frames are composed into.
    pub(crate) fn back_buffer_size(&self) -> (u32, u32) {
        match &self.presentation {
            Presentation::Window { config, .. } => (config.width, config.height),
            Presentation::Offscreen { back_buffer } => back_buffer.size(),
        }
    }

    pub(crate) fn is_windowed(&self) -> bool {
        matches!(self.presentation, Presentation::Window { .. })
    }

    /// Resizes the presentation chain. Zero dimensions are ignored and
    /// reported as `Ok(false)`; on failure the previous chain stays live.
    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Result<bool, RenderError> {
        if width == 0 || height == 0 {
            return Ok(false);
        }

        match &mut self.presentation {
            Presentation::Window { surface, config } => {
                let mut next = config.clone();
                next.width = width;
                next.height = height;
                with_error_scope(&self.device, || surface.configure(&self.device, &next))
                    .map_err(|err| RenderError::resource("presentation chain", err))?;
                *config = next;
            }
            Presentation::Offscreen { back_buffer } => {
                let replacement = SurfaceResource::create(
                    &self.device,
                    "back buffer",
                    width,
                    height,
                    SurfaceViews::RENDER_ONLY,
                )?;
                *back_buffer = replacement;
            }
        }

        tracing::debug!(width, height, "resized presentation chain");
        Ok(true)
    }

    /// Re-applies the current configuration after the chain was lost.
    pub(crate) fn reconfigure(&mut self) -> Result<(), RenderError> {
        if let Presentation::Window { surface, config } = &self.presentation {
            with_error_scope(&self.device, || surface.configure(&self.device, config))
                .map_err(|err| RenderError::resource("presentation chain", err))?;
        }
        Ok(())
    }

    pub(crate) fn acquire_frame(&self) -> Result<Frame<'_>, RenderError> {
        match &self.presentation {
            Presentation::Window { surface, .. } => {
                let texture = surface.get_current_texture()?;
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(Frame::Window { texture, view })
            }
            Presentation::Offscreen { back_buffer } => {
                let view = back_buffer
                    .render_view()
                    .ok_or_else(|| RenderError::resource("back buffer", "missing render view"))?;
                Ok(Frame::Offscreen { view })
            }
        }
    }

    /// Releases the presentation chain, then the queue, then the device.
    pub(crate) fn teardown(self) {
        let Self {
            presentation,
            queue,
            device,
            adapter,
            ..
        } = self;
        drop(presentation);
        drop(queue);
        drop(device);
        tracing::debug!(adapter = %adapter.name, "tore down device context");
    }
}

fn request_device(
    adapter: &wgpu::Adapter,
    entry: &AdapterEntry,
) -> Result<(wgpu::Device, wgpu::Queue), RenderError> {
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("blurview device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .map_err(|err| RenderError::DeviceFatal {
        adapter: entry.name.clone(),
        reason: format!("failed to create GPU device: {err}"),
    })?;

    device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
        tracing::error!(error = %err, "uncaptured GPU error");
    }));

    Ok((device, queue))
}

/// Fifo when vsync is on; otherwise Immediate, then Mailbox, then Fifo.
fn select_present_mode(available: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    let find = |wanted: wgpu::PresentMode| available.iter().copied().find(|mode| *mode == wanted);
    let fifo = find(wgpu::PresentMode::Fifo)
        .or_else(|| available.first().copied())
        .unwrap_or(wgpu::PresentMode::Fifo);
    if vsync {
        return fifo;
    }
    find(wgpu::PresentMode::Immediate)
        .or_else(|| find(wgpu::PresentMode::Mailbox))
        .unwrap_or(fifo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::PresentMode;

    #[test]
    fn vsync_prefers_fifo() {
        let modes = [PresentMode::Immediate, PresentMode::Fifo];
        assert_eq!(select_present_mode(&modes, true), PresentMode::Fifo);
    }

    #[test]
    fn no_vsync_prefers_immediate_then_mailbox() {
        let all = [PresentMode::Fifo, PresentMode::Mailbox, PresentMode::Immediate];
        assert_eq!(select_present_mode(&all, false), PresentMode::Immediate);

        let no_immediate = [PresentMode::Fifo, PresentMode::Mailbox];
        assert_eq!(select_present_mode(&no_immediate, false), PresentMode::Mailbox);

        let fifo_only = [PresentMode::Fifo];
        assert_eq!(select_present_mode(&fifo_only, false), PresentMode::Fifo);
    }

    #[test]
    fn empty_mode_list_falls_back_to_fifo() {
        assert_eq!(select_present_mode(&[], true), PresentMode::Fifo);
    }
}
