use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Smallest radius the controls allow.
pub const RADIUS_MIN: f32 = 0.001;
/// Largest radius the controls allow.
pub const RADIUS_MAX: f32 = 120.0;

/// Clamps a requested radius into the supported range; NaN maps to the minimum.
pub fn clamp_radius(radius: f32) -> f32 {
    if radius.is_nan() {
        RADIUS_MIN
    } else {
        radius.clamp(RADIUS_MIN, RADIUS_MAX)
    }
}

/// CPU mirror of the `BlurSettings` uniform block declared in the fragment prelude.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurSettings {
    pub texel_size: [f32; 2],
    pub radius: f32,
    pub padding: f32,
}

unsafe impl Zeroable for BlurSettings {}
unsafe impl Pod for BlurSettings {}

impl BlurSettings {
    pub const SIZE: u64 = std::mem::size_of::<BlurSettings>() as u64;

    pub fn new(width: u32, height: u32, radius: f32) -> Self {
        Self {
            texel_size: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            radius: radius.max(0.0),
            padding: 0.0,
        }
    }

    /// Records a copy of these values into `target` ahead of the next pass.
    ///
    /// The upload goes through a staging buffer on the encoder so each pass sees
    /// the values written immediately before it, in submission order.
    pub(crate) fn encode_upload(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::Buffer,
    ) {
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blur settings staging"),
            contents: bytemuck::bytes_of(self),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(&staging, 0, target, 0, Self::SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn settings_follow_std140_layout() {
        let settings = BlurSettings::new(1280, 720, 5.0);
        let base = &settings as *const _ as usize;

        assert_eq!(size_of::<BlurSettings>(), 16);
        assert_eq!(align_of::<BlurSettings>(), 16);
        assert_eq!((&settings.texel_size as *const _ as usize) - base, 0);
        assert_eq!((&settings.radius as *const _ as usize) - base, 8);
        assert_eq!((&settings.padding as *const _ as usize) - base, 12);
    }

    #[test]
    fn texel_size_is_inverse_dimensions() {
        let settings = BlurSettings::new(640, 480, 12.5);
        assert!((settings.texel_size[0] - 1.0 / 640.0).abs() < f32::EPSILON);
        assert!((settings.texel_size[1] - 1.0 / 480.0).abs() < f32::EPSILON);
        assert_eq!(settings.radius, 12.5);
    }

    #[test]
    fn degenerate_dimensions_do_not_divide_by_zero() {
        let settings = BlurSettings::new(0, 0, -3.0);
        assert_eq!(settings.texel_size, [1.0, 1.0]);
        assert_eq!(settings.radius, 0.0);
    }

    #[test]
    fn radius_clamps_to_control_range() {
        assert_eq!(clamp_radius(0.0), RADIUS_MIN);
        assert_eq!(clamp_radius(500.0), RADIUS_MAX);
        assert_eq!(clamp_radius(f32::NAN), RADIUS_MIN);
        assert_eq!(clamp_radius(42.0), 42.0);
    }
}
