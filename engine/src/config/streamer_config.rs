use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    config::config_manager::Config,
    limits::{DEFAULT_VERTICAL_VIEW_DISTANCE, DEFAULT_VIEW_DISTANCE, DEFAULT_WORKER_IDLE_BACKOFF_MS},
    voxels::registry::VoxelTypeDefinition,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerMode {
    /// Every viewer gets a dedicated worker thread
    PerViewer,
    /// A fixed number of workers, viewers assigned round-robin
    Pool(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamerConfig {
    pub view_distance: u32,
    pub vertical_view_distance: u32,
    pub worker_mode: WorkerMode,
    pub worker_idle_backoff_ms: u64,
    pub autosave: bool,
    pub save_directory: PathBuf,
    pub seed: u32,
    pub voxel_types: Vec<VoxelTypeDefinition>,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        StreamerConfig {
            view_distance: DEFAULT_VIEW_DISTANCE,
            vertical_view_distance: DEFAULT_VERTICAL_VIEW_DISTANCE,
            worker_mode: WorkerMode::PerViewer,
            worker_idle_backoff_ms: DEFAULT_WORKER_IDLE_BACKOFF_MS,
            autosave: false,
            save_directory: PathBuf::from("saves/world"),
            seed: 123_456,
            voxel_types: Vec::new(),
        }
    }
}

impl StreamerConfig {
    pub fn worker_idle_backoff(&self) -> Duration {
        Duration::from_millis(self.worker_idle_backoff_ms)
    }
}

impl Config for StreamerConfig {
    fn get_path() -> &'static str {
        "voxel_world.ron"
    }

    fn is_valid(&self) -> bool {
        if self.vertical_view_distance == 0 {
            return false;
        }

        !matches!(self.worker_mode, WorkerMode::Pool(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StreamerConfig =
            ron::from_str("(view_distance: 9, worker_mode: Pool(3))").unwrap();
        assert_eq!(config.view_distance, 9);
        assert_eq!(config.worker_mode, WorkerMode::Pool(3));
        assert_eq!(config.vertical_view_distance, DEFAULT_VERTICAL_VIEW_DISTANCE);
        assert!(config.is_valid());
    }

    #[test]
    fn test_invalid_configs() {
        let empty_pool = StreamerConfig {
            worker_mode: WorkerMode::Pool(0),
            ..Default::default()
        };
        assert!(!empty_pool.is_valid());

        let flat = StreamerConfig {
            vertical_view_distance: 0,
            ..Default::default()
        };
        assert!(!flat.is_valid());
    }
}
