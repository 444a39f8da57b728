use cubic_engine::config::config_manager::Config;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// One point the viewer passes through, `time` in path units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PathKey {
    pub time: f32,
    pub position: Vec3,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    pub ticks: u32,
    pub tick_interval_ms: u64,
    /// How far along the path the viewer moves each tick
    pub path_step: f32,
    pub path: Vec<PathKey>,
    /// Tick at which a block is dug out below the viewer, if any
    pub dig_at_tick: Option<u32>,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            ticks: 2000,
            tick_interval_ms: 5,
            path_step: 0.05,
            path: vec![
                PathKey {
                    time: 0.0,
                    position: Vec3::new(0.0, 0.0, 16.0),
                },
                PathKey {
                    time: 30.0,
                    position: Vec3::new(600.0, 200.0, 24.0),
                },
                PathKey {
                    time: 70.0,
                    position: Vec3::new(900.0, -400.0, 20.0),
                },
                PathKey {
                    time: 100.0,
                    position: Vec3::new(0.0, -50.0, 16.0),
                },
            ],
            dig_at_tick: Some(500),
        }
    }
}

impl Config for HostConfig {
    fn get_path() -> &'static str {
        "host.ron"
    }

    fn is_valid(&self) -> bool {
        if self.path.is_empty() || self.path_step < 0.0 {
            return false;
        }

        self.path.windows(2).all(|keys| keys[0].time < keys[1].time)
    }
}
