use crate::error::RenderError;

use super::pipeline::BlurPipelineState;
use super::settings::BlurSettings;
use super::state::Viewport;
use super::surface::{SurfaceResource, SurfaceViews};
use super::with_error_scope;

/// Background behind the fitted image.
pub(crate) const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.2,
    g: 0.2,
    b: 0.2,
    a: 1.0,
};

/// The horizontal-pass intermediate and the final blurred surface, always the
/// same size.
pub(crate) struct BlurTargets {
    pub intermediate: SurfaceResource,
    pub output: SurfaceResource,
}

impl BlurTargets {
    pub(crate) fn create(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let intermediate = SurfaceResource::create(
            device,
            "blur intermediate",
            width,
            height,
            SurfaceViews::RENDER_AND_SAMPLED,
        )?;
        let output = SurfaceResource::create(
            device,
            "blur output",
            width,
            height,
            SurfaceViews::RENDER_AND_SAMPLED,
        )?;
        Ok(Self {
            intermediate,
            output,
        })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        self.output.size()
    }
}

/// Records and submits the two blur passes: `source` into the intermediate
/// surface horizontally, then the intermediate into the output vertically.
pub(crate) fn apply_blur(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &BlurPipelineState,
    source: &wgpu::TextureView,
    targets: &BlurTargets,
    radius: f32,
) -> Result<(), RenderError> {
    let (width, height) = targets.size();
    let intermediate_target = render_view(&targets.intermediate, "blur intermediate")?;
    let intermediate_source = sampled_view(&targets.intermediate, "blur intermediate")?;
    let output_target = render_view(&targets.output, "blur output")?;

    let settings = BlurSettings::new(width, height, radius);
    let viewport = Viewport::full(width, height);
    let horizontal_group = pipeline.bind_group(device, "horizontal blur bind group", source);
    let vertical_group =
        pipeline.bind_group(device, "vertical blur bind group", intermediate_source);

    with_error_scope(device, || {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blur encoder"),
        });

        settings.encode_upload(device, &mut encoder, &pipeline.settings_buffer);
        draw_fullscreen(
            &mut encoder,
            "horizontal blur pass",
            intermediate_target,
            wgpu::Color::BLACK,
            &pipeline.horizontal,
            &horizontal_group,
            &pipeline.vertex_buffer,
            viewport,
        );

        // Same texel size and radius for the second 1-D kernel.
        settings.encode_upload(device, &mut encoder, &pipeline.settings_buffer);
        draw_fullscreen(
            &mut encoder,
            "vertical blur pass",
            output_target,
            wgpu::Color::BLACK,
            &pipeline.vertical,
            &vertical_group,
            &pipeline.vertex_buffer,
            viewport,
        );

        queue.submit(std::iter::once(encoder.finish()));
    })
    .map_err(|err| RenderError::resource("blur passes", err))?;
    tracing::trace!(width, height, radius, "submitted blur passes");
    Ok(())
}

/// Draws `displayed` into `target` inside `viewport` over the clear colour.
///
/// Without a pipeline or an image the frame is only cleared.
pub(crate) fn compose(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: Option<&BlurPipelineState>,
    target: &wgpu::TextureView,
    displayed: Option<&wgpu::TextureView>,
    viewport: Viewport,
) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("compose encoder"),
    });
    match (pipeline, displayed) {
        (Some(pipeline), Some(view)) => {
            let group = pipeline.bind_group(device, "compose bind group", view);
            draw_fullscreen(
                &mut encoder,
                "compose pass",
                target,
                CLEAR_COLOR,
                &pipeline.passthrough,
                &group,
                &pipeline.vertex_buffer,
                viewport,
            );
        }
        _ => {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(color_attachment(target, CLEAR_COLOR))],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
    }
    queue.submit(std::iter::once(encoder.finish()));
}

#[allow(clippy::too_many_arguments)]
fn draw_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    clear: wgpu::Color,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    vertex_buffer: &wgpu::Buffer,
    viewport: Viewport,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(color_attachment(target, clear))],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.set_vertex_buffer(0, vertex_buffer.slice(..));
    pass.set_viewport(
        viewport.x,
        viewport.y,
        viewport.width,
        viewport.height,
        0.0,
        1.0,
    );
    pass.draw(0..3, 0..1);
}

fn color_attachment(
    view: &wgpu::TextureView,
    clear: wgpu::Color,
) -> wgpu::RenderPassColorAttachment<'_> {
    wgpu::RenderPassColorAttachment {
        view,
        depth_slice: None,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(clear),
            store: wgpu::StoreOp::Store,
        },
    }
}

fn render_view<'a>(
    surface: &'a SurfaceResource,
    what: &str,
) -> Result<&'a wgpu::TextureView, RenderError> {
    surface
        .render_view()
        .ok_or_else(|| RenderError::resource(what, "surface has no render view"))
}

fn sampled_view<'a>(
    surface: &'a SurfaceResource,
    what: &str,
) -> Result<&'a wgpu::TextureView, RenderError> {
    surface
        .sampled_view()
        .ok_or_else(|| RenderError::resource(what, "surface has no sampled view"))
}
