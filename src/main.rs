mod engine;
mod utils;

use anyhow::Context;
use clap::Parser;

use engine::cli::Cli;
use engine::{DriveConfig, Universe};

fn main() -> anyhow::Result<()> {
    utils::logger::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DriveConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DriveConfig::default(),
    };

    if cli.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let mut universe = Universe::new(&config);

    if let Some(frames) = cli.headless {
        let report =
            engine::animation_loop::run_headless(&mut universe, &cli.held_input(), frames);
        let position = report
            .final_pose
            .map(|pose| pose.translation.vector)
            .unwrap_or_default();
        tracing::info!(
            frames = report.frames,
            x = position.x,
            y = position.y,
            z = position.z,
            speed_kmh = report.speed_kmh,
            "headless run finished"
        );
        return Ok(());
    }

    let renderer = engine::graphics::Renderer::new(config.lighting.shadow_map_size);
    let user_input = engine::user_input::UserInput::new();

    engine::Windowing::run_app(universe, renderer, user_input)
        .map_err(|e| anyhow::anyhow!("windowed run failed: {e}"))
}
