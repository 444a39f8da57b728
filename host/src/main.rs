use std::{sync::Arc, time::Duration};

use cubic_engine::{
    StreamerContext,
    config::config_manager::Config,
    error::WorldError,
    init_streamer,
    voxels::coord::WorldPos,
    world_streamer::{StreamerEvent, WorldStreamer},
    worldgen::NoiseWorldGenerator,
};
use glam::Vec3;
use log::{debug, info, warn};

use crate::{config::HostConfig, viewer_path::ViewerPath};

mod config;
mod viewer_path;

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();
    log::info!("Starting headless world host...");

    let host_config = HostConfig::create_manager()?.snapshot();
    let StreamerContext {
        config: streamer_config,
        mut streamer,
    } = init_streamer(|config| Arc::new(NoiseWorldGenerator::new(config.seed)))?;
    info!(
        "Streaming world from {} with settings in {}",
        streamer.config().save_directory.display(),
        streamer_config.path().display()
    );

    let mut path = ViewerPath::new(&host_config.path);
    let viewer = streamer.add_viewer(to_world_pos(path.position()))?;
    let tick_interval = Duration::from_millis(host_config.tick_interval_ms);

    let mut uploaded_faces = 0usize;

    for tick in 0..host_config.ticks {
        let position = path.advance(host_config.path_step);
        streamer.update_viewer_f(viewer, position)?;
        streamer.tick()?;

        uploaded_faces += consume_events(&mut streamer);

        if host_config.dig_at_tick == Some(tick) {
            dig_below(&mut streamer, position)?;
        }

        if tick % 200 == 0 {
            let stats = streamer.statistics();
            info!(
                "Tick {}: {} chunks ({} loading, {} loaded), ~{} KiB of voxel data, {} deferred geometry batches",
                tick,
                stats.total_chunks,
                stats.loading,
                stats.loaded,
                stats.approximate_memory_usage_bytes / 1024,
                stats.deferred_geometry
            );
        }

        profiling::finish_frame!();
        std::thread::sleep(tick_interval);
    }

    info!("Built meshes for {} faces in total", uploaded_faces);

    let written = streamer.save_world()?;
    info!("Saved {} regions", written);

    streamer.shutdown();
    Ok(())
}

fn to_world_pos(position: Vec3) -> WorldPos {
    WorldPos(position.floor().as_ivec3())
}

/// Stands in for the renderer: rebuilds mesh sections for every chunk whose geometry changed.
/// Returns the number of faces meshed.
fn consume_events(streamer: &mut WorldStreamer) -> usize {
    let mut faces = 0;

    for event in streamer.drain_events() {
        match event {
            StreamerEvent::ChunkLoaded(pos) => debug!("Chunk {:?} loaded", pos),
            StreamerEvent::ChunkUnloaded(pos) => debug!("Chunk {:?} unloaded", pos),
            StreamerEvent::GeometryChanged(pos) => {
                if let Some(sections) = streamer.mesh_sections(pos, 1.0) {
                    faces += sections.iter().map(|section| section.face_count()).sum::<usize>();
                }
            }
        }
    }

    faces
}

fn dig_below(streamer: &mut WorldStreamer, position: Vec3) -> anyhow::Result<()> {
    let target = to_world_pos(position - Vec3::Z);

    match streamer.destroy_block(target) {
        Ok(()) => {
            info!("Dug out block at {:?}", target.0);
            Ok(())
        }
        Err(WorldError::ChunkBusy(chunk)) => {
            warn!("Chunk {:?} is still loading, skipping the dig", chunk);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
