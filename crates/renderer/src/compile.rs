use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::error::RenderError;
use crate::gpu::with_error_scope;

/// The four programs that make up the blur pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlurStage {
    FullscreenVertex,
    HorizontalBlur,
    VerticalBlur,
    Passthrough,
}

impl BlurStage {
    #[cfg(test)]
    pub(crate) const ALL: [BlurStage; 4] = [
        BlurStage::FullscreenVertex,
        BlurStage::HorizontalBlur,
        BlurStage::VerticalBlur,
        BlurStage::Passthrough,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            BlurStage::FullscreenVertex => "fullscreen vertex",
            BlurStage::HorizontalBlur => "horizontal blur",
            BlurStage::VerticalBlur => "vertical blur",
            BlurStage::Passthrough => "passthrough",
        }
    }

    pub(crate) fn naga_stage(self) -> ShaderStage {
        match self {
            BlurStage::FullscreenVertex => ShaderStage::Vertex,
            _ => ShaderStage::Fragment,
        }
    }

    /// Full GLSL text for the stage; fragment stages share [`FRAGMENT_PRELUDE`].
    pub(crate) fn source(self) -> Cow<'static, str> {
        match self {
            BlurStage::FullscreenVertex => Cow::Borrowed(VERTEX_SHADER_GLSL),
            BlurStage::HorizontalBlur => Cow::Owned(format!(
                "{FRAGMENT_PRELUDE}{GAUSSIAN_KERNEL}{HORIZONTAL_MAIN}"
            )),
            BlurStage::VerticalBlur => Cow::Owned(format!(
                "{FRAGMENT_PRELUDE}{GAUSSIAN_KERNEL}{VERTICAL_MAIN}"
            )),
            BlurStage::Passthrough => Cow::Owned(format!("{FRAGMENT_PRELUDE}{PASSTHROUGH_MAIN}")),
        }
    }
}

/// Compiles one stage, returning the compiler diagnostics on failure.
pub(crate) fn compile_stage(
    device: &wgpu::Device,
    stage: BlurStage,
) -> Result<wgpu::ShaderModule, RenderError> {
    with_error_scope(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage.label()),
            source: wgpu::ShaderSource::Glsl {
                shader: stage.source(),
                stage: stage.naga_stage(),
                defines: &[],
            },
        })
    })
    .map_err(|err| RenderError::ShaderCompile {
        stage: stage.label(),
        diagnostics: err.to_string(),
    })
}

/// Pass-through vertex stage for the fullscreen triangle vertex buffer.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Declarations shared by every fragment stage.
///
/// The uniform block layout must match [`BlurSettings`](crate::gpu::BlurSettings).
const FRAGMENT_PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform BlurSettings {
    vec2 texel_size;
    float radius;
    float _padding;
} settings;

layout(set = 0, binding = 1) uniform texture2D source_texture;
layout(set = 0, binding = 2) uniform sampler source_sampler;

#define SOURCE sampler2D(source_texture, source_sampler)
";

/// One-dimensional Gaussian over `ceil(radius)` taps per side.
///
/// Sigma is a third of the radius so the outermost taps sit at three standard
/// deviations. Weights are normalised by their sum, so the kernel integrates to
/// one for every radius and a flat field stays flat.
const GAUSSIAN_KERNEL: &str = r"
const int MAX_TAPS = 128;

vec4 blur_along(vec2 direction) {
    vec4 center = texture(SOURCE, v_uv);
    float radius = max(settings.radius, 0.0);
    int taps = min(int(ceil(radius)), MAX_TAPS);
    if (taps == 0) {
        return center;
    }

    float sigma = max(radius / 3.0, 0.0001);
    float denom = 2.0 * sigma * sigma;
    vec4 sum = center;
    float weight_sum = 1.0;
    for (int i = 1; i <= taps; ++i) {
        float offset = float(i);
        float weight = exp(-(offset * offset) / denom);
        vec2 delta = direction * settings.texel_size * offset;
        sum += weight * (texture(SOURCE, v_uv + delta) + texture(SOURCE, v_uv - delta));
        weight_sum += 2.0 * weight;
    }
    return sum / weight_sum;
}
";

const HORIZONTAL_MAIN: &str = r"
void main() {
    out_color = blur_along(vec2(1.0, 0.0));
}
";

const VERTICAL_MAIN: &str = r"
void main() {
    out_color = blur_along(vec2(0.0, 1.0));
}
";

const PASSTHROUGH_MAIN: &str = r"
void main() {
    out_color = texture(SOURCE, v_uv);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

    fn parse(stage: BlurStage) -> wgpu::naga::Module {
        let mut frontend = Frontend::default();
        frontend
            .parse(&Options::from(stage.naga_stage()), &stage.source())
            .unwrap_or_else(|err| panic!("{} failed to parse: {err:?}", stage.label()))
    }

    #[test]
    fn every_stage_parses_and_validates() {
        for stage in BlurStage::ALL {
            let module = parse(stage);
            Validator::new(ValidationFlags::all(), Capabilities::empty())
                .validate(&module)
                .unwrap_or_else(|err| panic!("{} failed validation: {err:?}", stage.label()));
        }
    }

    #[test]
    fn vertex_stage_consumes_position_and_uv() {
        let module = parse(BlurStage::FullscreenVertex);
        assert!(module.entry_points.iter().any(|entry| entry.name == "main"
            && entry.stage == ShaderStage::Vertex));
        let source = BlurStage::FullscreenVertex.source();
        assert!(source.contains("layout(location = 0) in vec2 a_position"));
        assert!(source.contains("layout(location = 1) in vec2 a_uv"));
    }

    #[test]
    fn blur_stages_differ_only_in_direction() {
        let horizontal = BlurStage::HorizontalBlur.source();
        let vertical = BlurStage::VerticalBlur.source();
        assert!(horizontal.contains("blur_along(vec2(1.0, 0.0))"));
        assert!(vertical.contains("blur_along(vec2(0.0, 1.0))"));
        assert!(!BlurStage::Passthrough.source().contains("blur_along"));
    }
}
