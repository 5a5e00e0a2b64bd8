use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::error::RenderError;
use crate::gpu::{FrameOutcome, RenderSubsystem};
use crate::source::SourceImage;
use crate::types::RendererConfig;

/// Interactive controls bound to the keyboard.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Control {
    AdjustRadius(f32),
    NextAdapter,
    Quit,
}

/// Maps a key press to a control. Radius keys repeat while held; the others
/// fire once per press.
pub(crate) fn control_for_key(key: &Key, repeat: bool) -> Option<Control> {
    let control = match key {
        Key::Named(NamedKey::ArrowUp) => Control::AdjustRadius(1.0),
        Key::Named(NamedKey::ArrowDown) => Control::AdjustRadius(-1.0),
        Key::Named(NamedKey::PageUp) => Control::AdjustRadius(10.0),
        Key::Named(NamedKey::PageDown) => Control::AdjustRadius(-10.0),
        Key::Named(NamedKey::Tab) if !repeat => Control::NextAdapter,
        Key::Named(NamedKey::Escape) if !repeat => Control::Quit,
        _ => return None,
    };
    Some(control)
}

pub(crate) fn window_title(subsystem: &RenderSubsystem) -> String {
    let adapter = if subsystem.is_suspended() {
        "no device".to_string()
    } else {
        subsystem
            .selected_adapter()
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| "no device".to_string())
    };
    let image = subsystem
        .image()
        .map(SourceImage::display_name)
        .unwrap_or_else(|| "drop an image to open it".to_string());
    format!(
        "blurview - radius {} - {adapter} - {image}",
        format_radius(subsystem.radius())
    )
}

/// Three decimals with trailing zeros dropped, so the minimum radius stays
/// visible.
fn format_radius(radius: f32) -> String {
    let text = format!("{radius:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Opens the viewer window and runs its event loop on the calling thread
/// until the window is closed.
pub(crate) fn run_window(config: &RendererConfig, image: Option<SourceImage>) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let (width, height) = config.surface_size;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("blurview")
            .with_inner_size(PhysicalSize::new(width, height))
            .build(&event_loop)
            .context("failed to create viewer window")?,
    );

    let mut subsystem = RenderSubsystem::windowed(Arc::clone(&window), config)
        .context("failed to initialise renderer")?;
    if let Some(image) = image {
        if let Err(err) = subsystem.set_image(image) {
            error!(error = %err, "failed to upload source image");
        }
    }
    window.set_title(&window_title(&subsystem));
    window.request_redraw();

    // Set when the presentation chain no longer matches the window; cleared by
    // the next successful resize.
    let mut chain_stale = false;

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            let Event::WindowEvent { window_id, event } = event else {
                return;
            };
            if window_id != window.id() {
                return;
            }

            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    match subsystem.resize(new_size.width, new_size.height) {
                        Ok(true) => {
                            chain_stale = false;
                            window.request_redraw();
                        }
                        Ok(false) => {}
                        Err(err) => {
                            chain_stale = true;
                            warn!(error = %err, "resize failed; keeping previous surfaces")
                        }
                    }
                }
                WindowEvent::DroppedFile(path) => {
                    open_image(&mut subsystem, &path);
                    window.set_title(&window_title(&subsystem));
                    window.request_redraw();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    let Some(control) = key_control(&event) else {
                        return;
                    };
                    match control {
                        Control::AdjustRadius(delta) => {
                            subsystem.set_radius(subsystem.radius() + delta);
                        }
                        Control::NextAdapter => {
                            let next = subsystem.next_adapter_index();
                            match subsystem.select_adapter(next) {
                                Ok(()) => info!(index = next, "switched adapter"),
                                Err(err) => {
                                    error!(error = %err, index = next, "adapter switch failed")
                                }
                            }
                        }
                        Control::Quit => {
                            elwt.exit();
                            return;
                        }
                    }
                    window.set_title(&window_title(&subsystem));
                    window.request_redraw();
                }
                WindowEvent::RedrawRequested => match subsystem.render_frame() {
                    Ok(FrameOutcome::Rendered { blurred }) => {
                        if blurred {
                            tracing::debug!(
                                radius = subsystem.radius(),
                                "blurred output refreshed"
                            );
                        }
                    }
                    Ok(FrameOutcome::Suspended) => {}
                    Err(RenderError::Surface(surface_err)) => {
                        match surface_recovery(&surface_err, chain_stale) {
                            Recovery::Reconfigure => match subsystem.reconfigure() {
                                Ok(()) => window.request_redraw(),
                                Err(err) => {
                                    chain_stale = true;
                                    error!(
                                        error = %err,
                                        "reconfigure failed; waiting for resize"
                                    );
                                }
                            },
                            Recovery::WaitForResize => {
                                tracing::debug!("presentation chain stale; waiting for resize")
                            }
                            Recovery::Retry => {
                                warn!(error = %surface_err, "surface error; retrying next frame");
                                window.request_redraw();
                            }
                            Recovery::Exit => {
                                error!("surface out of memory; closing viewer");
                                elwt.exit();
                            }
                        }
                    }
                    Err(err) => error!(error = %err, "frame failed"),
                },
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Reconfigure,
    WaitForResize,
    Retry,
    Exit,
}

/// Decides how the loop reacts to a failed frame acquisition. A stale chain is
/// left alone until the window reports a new size.
fn surface_recovery(err: &wgpu::SurfaceError, chain_stale: bool) -> Recovery {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated if chain_stale => {
            Recovery::WaitForResize
        }
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => Recovery::Reconfigure,
        wgpu::SurfaceError::OutOfMemory => Recovery::Exit,
        _ => Recovery::Retry,
    }
}

fn key_control(event: &KeyEvent) -> Option<Control> {
    if event.state != ElementState::Pressed {
        return None;
    }
    control_for_key(&event.logical_key, event.repeat)
}

fn open_image(subsystem: &mut RenderSubsystem, path: &Path) {
    match subsystem.load_image(path) {
        Ok(()) => info!(path = %path.display(), "opened image"),
        Err(err) => error!(error = %err, "failed to open dropped file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_and_page_keys_adjust_radius() {
        let up = Key::Named(NamedKey::ArrowUp);
        let page_down = Key::Named(NamedKey::PageDown);
        assert_eq!(control_for_key(&up, false), Some(Control::AdjustRadius(1.0)));
        assert_eq!(control_for_key(&up, true), Some(Control::AdjustRadius(1.0)));
        assert_eq!(
            control_for_key(&page_down, false),
            Some(Control::AdjustRadius(-10.0))
        );
    }

    #[test]
    fn tab_and_escape_ignore_repeats() {
        let tab = Key::Named(NamedKey::Tab);
        let escape = Key::Named(NamedKey::Escape);
        assert_eq!(control_for_key(&tab, false), Some(Control::NextAdapter));
        assert_eq!(control_for_key(&tab, true), None);
        assert_eq!(control_for_key(&escape, false), Some(Control::Quit));
        assert_eq!(control_for_key(&escape, true), None);
    }

    #[test]
    fn stale_chain_waits_for_resize() {
        assert_eq!(
            surface_recovery(&wgpu::SurfaceError::Outdated, false),
            Recovery::Reconfigure
        );
        assert_eq!(
            surface_recovery(&wgpu::SurfaceError::Lost, false),
            Recovery::Reconfigure
        );
        assert_eq!(
            surface_recovery(&wgpu::SurfaceError::Outdated, true),
            Recovery::WaitForResize
        );
        assert_eq!(
            surface_recovery(&wgpu::SurfaceError::Lost, true),
            Recovery::WaitForResize
        );
        assert_eq!(
            surface_recovery(&wgpu::SurfaceError::Timeout, true),
            Recovery::Retry
        );
        assert_eq!(
            surface_recovery(&wgpu::SurfaceError::OutOfMemory, false),
            Recovery::Exit
        );
    }

    #[test]
    fn radius_keeps_small_values_visible() {
        assert_eq!(format_radius(0.001), "0.001");
        assert_eq!(format_radius(5.0), "5");
        assert_eq!(format_radius(12.5), "12.5");
        assert_eq!(format_radius(120.0), "120");
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(control_for_key(&Key::Character("a".into()), false), None);
        assert_eq!(control_for_key(&Key::Named(NamedKey::Space), false), None);
    }
}
