use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the blur renderer.
///
/// Variants fall into two classes: device-fatal errors leave the renderer
/// without a usable GPU until another adapter is selected, while everything
/// else degrades a single feature and keeps the window responsive.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no GPU adapters are available on this system")]
    NoAdapters,

    #[error("adapter index {index} is out of range ({available} adapters available)")]
    AdapterOutOfRange { index: usize, available: usize },

    #[error("GPU device on adapter '{adapter}' could not be initialised: {reason}")]
    DeviceFatal { adapter: String, reason: String },

    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: String, reason: String },

    #[error("{stage} shader failed to compile:\n{diagnostics}")]
    ShaderCompile {
        stage: &'static str,
        diagnostics: String,
    },

    #[error("surface dimensions {width}x{height} are outside the supported range (1..={max})")]
    InvalidDimensions { width: u32, height: u32, max: u32 },

    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read back blurred output: {0}")]
    Readback(String),

    #[error("presentation chain error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl RenderError {
    pub(crate) fn resource(what: impl Into<String>, reason: impl ToString) -> Self {
        RenderError::ResourceCreation {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// True when no rendering is possible until the device is rebuilt.
    pub fn is_device_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::NoAdapters
                | RenderError::AdapterOutOfRange { .. }
                | RenderError::DeviceFatal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_device_fatal_errors() {
        assert!(RenderError::NoAdapters.is_device_fatal());
        assert!(RenderError::DeviceFatal {
            adapter: "test".into(),
            reason: "lost".into(),
        }
        .is_device_fatal());
        assert!(!RenderError::resource("blur output surface", "out of memory").is_device_fatal());
        assert!(!RenderError::ShaderCompile {
            stage: "horizontal blur",
            diagnostics: "syntax error".into(),
        }
        .is_device_fatal());
    }

    #[test]
    fn shader_errors_carry_diagnostics() {
        let err = RenderError::ShaderCompile {
            stage: "vertical blur",
            diagnostics: "0:12: 'texel' : undeclared identifier".into(),
        };
        let message = err.to_string();
        assert!(message.starts_with("vertical blur shader failed to compile"));
        assert!(message.contains("undeclared identifier"));
    }
}
