use glam::Vec3;
use splines::{Interpolation, Key, Spline};

use crate::config::PathKey;

/// Loops a viewer along a spline through the configured keys
pub struct ViewerPath {
    spline: Spline<f32, Vec3>,
    progress: f32,
    start: f32,
    end: f32,
    fallback: Vec3,
}

impl ViewerPath {
    pub fn new(keys: &[PathKey]) -> Self {
        let last = keys.len().saturating_sub(1);
        let spline = Spline::from_vec(
            keys.iter()
                .enumerate()
                .map(|(i, key)| {
                    // Catmull-Rom needs a key on each side, so the ends are linear
                    let interpolation = if i == 0 || i >= last.saturating_sub(1) {
                        Interpolation::Linear
                    } else {
                        Interpolation::CatmullRom
                    };
                    Key::new(key.time, key.position, interpolation)
                })
                .collect(),
        );

        let start = keys.first().map_or(0.0, |key| key.time);
        let end = keys.last().map_or(0.0, |key| key.time);

        ViewerPath {
            spline,
            progress: start,
            start,
            end,
            fallback: keys.first().map_or(Vec3::ZERO, |key| key.position),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.spline
            .clamped_sample(self.progress)
            .unwrap_or(self.fallback)
    }

    /// Moves `step` along the path, starting over after the last key
    pub fn advance(&mut self, step: f32) -> Vec3 {
        self.progress += step;

        if self.progress >= self.end {
            self.progress = self.start;
        }

        self.position()
    }
}
