use std::process::Command;

use tempfile::TempDir;

fn blurview() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_blurview"));
    command.env("RUST_LOG", "warn").env_remove("BLURVIEW_ADAPTER");
    command
}

#[test]
fn help_lists_controls() {
    let output = blurview()
        .arg("--help")
        .output()
        .expect("failed to run blurview --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--radius", "--adapter", "--size", "--export", "--list-adapters"] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn rejects_zero_size() {
    let status = blurview()
        .args(["--size", "0x0", "--list-adapters"])
        .status()
        .expect("failed to run blurview");
    assert!(!status.success());
}

#[test]
fn export_fails_for_missing_image() {
    let dir = TempDir::new().unwrap();
    let output_path = dir.path().join("out.png");
    let output = blurview()
        .arg(dir.path().join("missing.png"))
        .arg("--export")
        .arg(&output_path)
        .output()
        .expect("failed to run blurview export");

    assert!(!output.status.success());
    assert!(!output_path.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.png"), "stderr: {stderr}");
}

#[test]
fn export_writes_blurred_png() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("flat.png");
    let output_path = dir.path().join("flat-blurred.png");
    image::RgbaImage::from_pixel(12, 9, image::Rgba([255, 255, 255, 255]))
        .save(&input)
        .unwrap();

    let output = blurview()
        .arg(&input)
        .args(["--radius", "8", "--export"])
        .arg(&output_path)
        .output()
        .expect("failed to run blurview export");

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no GPU adapters") || stderr.contains("could not be initialised") {
            eprintln!("skipping: no usable GPU adapter");
            return;
        }
        panic!("export failed: {stderr}");
    }

    let blurred = image::open(&output_path).unwrap().to_rgba8();
    assert_eq!(blurred.dimensions(), (12, 9));
    assert!(blurred.pixels().all(|pixel| pixel.0[0] >= 254));
}
