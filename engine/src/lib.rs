use std::sync::Arc;

use anyhow::Context;

use crate::{
    config::{
        config_manager::{Config, ConfigManager},
        streamer_config::StreamerConfig,
    },
    regions::persistence::DirectoryPersistence,
    world_streamer::WorldStreamer,
    worldgen::WorldGenerator,
};

pub mod chunk_worker;
pub mod config;
pub mod error;
pub mod limits;
pub mod mesh_generation;
pub mod regions;
pub mod transfer;
pub mod view_shells;
pub mod voxels;
pub mod work_order;
pub mod work_queue;
pub mod world_stats;
pub mod world_streamer;
pub mod worldgen;

pub struct StreamerContext {
    pub config: ConfigManager<StreamerConfig>,
    pub streamer: WorldStreamer,
}

/// Loads `voxel_world.ron` and starts a streamer saving into the configured directory.
/// The generator is built from the loaded config so it can pick up the seed.
pub fn init_streamer(
    create_generator: impl FnOnce(&StreamerConfig) -> Arc<dyn WorldGenerator>,
) -> anyhow::Result<StreamerContext> {
    let config = StreamerConfig::create_manager()?;
    let snapshot = config.snapshot();
    let generator = create_generator(&snapshot);
    let persistence = DirectoryPersistence::new(&snapshot.save_directory);

    let streamer = WorldStreamer::new(snapshot, generator, Box::new(persistence))
        .context("Failed to start world streamer")?;

    Ok(StreamerContext { config, streamer })
}
