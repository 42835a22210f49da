//! Headless hero-and-walls collision demo
//!
//! Runs the demo scene for the configured number of frames and logs
//! collision statistics along the way.

use silica::config::AppConfig;
use silica::scene::SceneBuilder;
use silica::systems::SimulationSystem;
use silica_core::TreeConfig;

fn main() {
    let loaded = AppConfig::load();
    let log_level = loaded
        .as_ref()
        .map(|c| c.debug.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
    log::info!("Starting Silica");

    let config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    let demo = SceneBuilder::new(&config.demo)
        .with_tree_config(TreeConfig::from(&config.collision))
        .build();
    let mut demo = match demo {
        Ok(demo) => demo,
        Err(e) => {
            log::error!("Failed to build demo scene: {}", e);
            std::process::exit(1);
        }
    };

    let mut simulation = SimulationSystem::new(config.simulation.timestep, config.debug.stats_interval);
    match simulation.run(&mut demo.scene, &mut demo.collider, config.simulation.frames) {
        Ok(totals) => {
            log::info!(
                "Finished {} frames: {} contacts, {} callbacks ({} failed), {} re-insertions, {} overlap tests",
                totals.frames,
                totals.contacts,
                totals.callbacks,
                totals.callback_failures,
                totals.reinserted,
                totals.overlap_tests
            );
        }
        Err(e) => {
            log::error!("Collision check failed: {}", e);
            std::process::exit(1);
        }
    }
}
