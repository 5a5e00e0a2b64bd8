use std::path::Path;

use anyhow::Result;
use renderer::{enumerate_adapters, Renderer};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    if cli.list_adapters {
        list_adapters();
        return Ok(());
    }

    let renderer = Renderer::new(cli.renderer_config());
    match cli.export.as_deref() {
        Some(output) => export(&renderer, output),
        None => {
            tracing::info!(
                radius = renderer.config().radius,
                adapter = renderer.config().adapter_index,
                "opening viewer window"
            );
            renderer.run()
        }
    }
}

fn export(renderer: &Renderer, output: &Path) -> Result<()> {
    renderer.export(output)?;
    println!("{}", output.display());
    Ok(())
}

fn list_adapters() {
    let adapters = enumerate_adapters();
    if adapters.is_empty() {
        println!("No GPU adapters found.");
        return;
    }
    for adapter in adapters {
        let software = if adapter.is_software() {
            " [software]"
        } else {
            ""
        };
        println!("{adapter}{software}");
    }
}
