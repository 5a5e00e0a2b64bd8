use std::path::PathBuf;

use clap::Parser;
use renderer::{RendererConfig, DEFAULT_RADIUS, RADIUS_MAX, RADIUS_MIN};

#[derive(Parser, Debug)]
#[command(
    name = "blurview",
    author,
    version,
    about = "Image viewer with a real-time GPU Gaussian blur"
)]
pub struct Cli {
    /// Image to open at startup (PNG, JPEG, BMP or TIFF).
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Blur radius in pixels, clamped to 0.001-120.
    #[arg(
        long,
        value_name = "RADIUS",
        value_parser = parse_radius,
        default_value_t = DEFAULT_RADIUS
    )]
    pub radius: f32,

    /// Index of the GPU adapter to use (see `--list-adapters`).
    #[arg(long, value_name = "INDEX", env = "BLURVIEW_ADAPTER", default_value_t = 0)]
    pub adapter: usize,

    /// Initial window size (e.g. `1280x720`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_surface_size,
        default_value = "1280x720"
    )]
    pub size: (u32, u32),

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,

    /// Print the available GPU adapters and exit.
    #[arg(long)]
    pub list_adapters: bool,

    /// Blur IMAGE at its native size, write the result as PNG to PATH and exit.
    #[arg(long, value_name = "PATH", requires = "image")]
    pub export: Option<PathBuf>,
}

impl Cli {
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            surface_size: self.size,
            image: self.image.clone(),
            radius: self.radius,
            adapter_index: self.adapter,
            vsync: !self.no_vsync,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size specification '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size specification '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_radius(value: &str) -> Result<f32, String> {
    let radius: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid radius '{value}'"))?;
    if !radius.is_finite() {
        return Err("radius must be a finite number".to_string());
    }
    Ok(radius.clamp(RADIUS_MIN, RADIUS_MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
        assert!(parse_surface_size("1280").is_err());
        assert!(parse_surface_size("0x720").is_err());
        assert!(parse_surface_size("wide x tall").is_err());
    }

    #[test]
    fn radius_is_clamped_to_control_range() {
        assert_eq!(parse_radius("12.5").unwrap(), 12.5);
        assert_eq!(parse_radius("0").unwrap(), RADIUS_MIN);
        assert_eq!(parse_radius("500").unwrap(), RADIUS_MAX);
        assert!(parse_radius("NaN").is_err());
        assert!(parse_radius("soft").is_err());
    }

    #[test]
    fn defaults_build_expected_config() {
        let cli = Cli::try_parse_from(["blurview"]).unwrap();
        let config = cli.renderer_config();
        assert_eq!(config.surface_size, (1280, 720));
        assert_eq!(config.radius, DEFAULT_RADIUS);
        assert!(config.vsync);
        assert!(config.image.is_none());
    }

    #[test]
    fn flags_reach_config() {
        let cli = Cli::try_parse_from([
            "blurview",
            "photo.png",
            "--radius",
            "30",
            "--adapter",
            "1",
            "--size",
            "800x600",
            "--no-vsync",
        ])
        .unwrap();
        let config = cli.renderer_config();
        assert_eq!(config.image, Some(PathBuf::from("photo.png")));
        assert_eq!(config.radius, 30.0);
        assert_eq!(config.adapter_index, 1);
        assert_eq!(config.surface_size, (800, 600));
        assert!(!config.vsync);
    }

    #[test]
    fn export_requires_an_image() {
        assert!(Cli::try_parse_from(["blurview", "--export", "out.png"]).is_err());
        assert!(Cli::try_parse_from(["blurview", "in.png", "--export", "out.png"]).is_ok());
    }
}
