use ahash::AHashSet;
use glam::IVec3;

use crate::voxels::{coord::ChunkPos, face::Face};

/// Chunk offsets around a viewer grouped by L1 distance. Shell 0 is the viewer's own chunk,
/// shell i+1 extends shell i by one axis step outward, never reaching `vertical_limit` chunks up or down.
#[derive(Debug, Clone)]
pub struct ViewShells {
    shells: Vec<Vec<IVec3>>,
}

impl ViewShells {
    pub fn new(view_distance: u32, vertical_limit: u32) -> Self {
        let mut shells = vec![vec![IVec3::ZERO]];
        let mut seen: AHashSet<IVec3> = AHashSet::from_iter([IVec3::ZERO]);
        let vertical_limit = vertical_limit as i32;

        for i in 0..view_distance as usize {
            let mut next = Vec::new();

            for &offset in &shells[i] {
                let length = offset.abs().element_sum();
                for face in Face::all() {
                    let candidate = offset + face.to_ivec3();
                    if candidate.abs().element_sum() <= length
                        || candidate.z.abs() >= vertical_limit
                    {
                        continue;
                    }

                    if seen.insert(candidate) {
                        next.push(candidate);
                    }
                }
            }

            shells.push(next);
        }

        ViewShells { shells }
    }

    pub fn shells(&self) -> &[Vec<IVec3>] {
        &self.shells
    }

    pub fn chunk_count(&self) -> usize {
        self.shells.iter().map(Vec::len).sum()
    }

    /// Every chunk in range of `center`, nearest shells first
    pub fn iter_around(&self, center: ChunkPos) -> impl Iterator<Item = ChunkPos> + '_ {
        self.shells
            .iter()
            .flatten()
            .map(move |offset| ChunkPos(center.0 + *offset))
    }
}
