//! GPU side of the blur viewer.
//!
//! - `context` owns the wgpu device, queue and (optionally) the presentation
//!   chain, and knows how to reconfigure the chain when the window resizes.
//! - `adapters` enumerates the system's adapters and tracks the selection.
//! - `surface` creates the textures the blur renders into and reads them back.
//! - `pipeline` compiles the four GLSL stages and holds the fullscreen
//!   triangle, sampler and settings buffer.
//! - `settings` mirrors the `BlurSettings` uniform block.
//! - `blur` records the horizontal and vertical passes.
//! - `recompute` decides once per frame whether the blur has to run again.
//! - `state` glues everything together into [`RenderSubsystem`], the single
//!   owned object the window loop and the export path drive.

mod adapters;
mod blur;
mod context;
mod pipeline;
mod recompute;
mod settings;
mod state;
mod surface;

pub use adapters::{AdapterEntry, AdapterSelector};
pub use recompute::{RecomputeController, RADIUS_EPSILON};
pub use settings::{clamp_radius, BlurSettings, RADIUS_MAX, RADIUS_MIN};
pub use state::{
    enumerate_adapters, fit_viewport, FrameOutcome, RenderSubsystem, SurfaceSizes, Viewport,
};
pub use surface::{SurfaceResource, SurfaceViews};
pub(crate) use surface::validate_dimensions;

/// Runs `f` inside validation and out-of-memory error scopes.
///
/// Returns the value produced by `f` only when neither scope captured an
/// error; otherwise the value is dropped so no half-built object escapes.
pub(crate) fn with_error_scope<T>(
    device: &wgpu::Device,
    f: impl FnOnce() -> T,
) -> Result<T, wgpu::Error> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}
