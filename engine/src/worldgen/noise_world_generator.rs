use glam::DVec2;
use noise::{NoiseFn, SuperSimplex};

use crate::{
    limits::{CHUNK_SIZE, CHUNK_VOLUME},
    voxels::{
        chunk_data::ChunkData,
        coord::{ChunkPos, LocalPos, WorldPos},
        voxel::Voxel,
    },
    worldgen::world_generator::WorldGenerator,
};

const HORIZONTAL_SCALE: f64 = 0.01;
const HEIGHT_AMPLITUDE: f64 = 32.0;
const DIRT_DEPTH: i32 = 3;
const SEA_LEVEL: i32 = -4;

/// Rolling terrain with z as the vertical axis: stone, a few layers of dirt,
/// grass on top and water filling everything below sea level.
pub struct NoiseWorldGenerator {
    noise: SuperSimplex,
}

impl NoiseWorldGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: SuperSimplex::new(seed),
        }
    }

    fn surface_height(&self, x: i32, y: i32) -> i32 {
        let pos = DVec2::new(x as f64, y as f64) * HORIZONTAL_SCALE;
        (self.noise.get(pos.to_array()) * HEIGHT_AMPLITUDE) as i32
    }

    fn voxel_in_column(world_z: i32, height: i32) -> Voxel {
        if world_z < height - DIRT_DEPTH {
            Voxel::STONE
        } else if world_z < height {
            Voxel::DIRT
        } else if world_z == height {
            Voxel::GRASS
        } else if world_z < SEA_LEVEL {
            Voxel::WATER
        } else {
            Voxel::AIR
        }
    }
}

impl WorldGenerator for NoiseWorldGenerator {
    fn generate_voxel(&self, pos: WorldPos) -> Voxel {
        Self::voxel_in_column(pos.0.z, self.surface_height(pos.0.x, pos.0.y))
    }

    // Samples the height once per column instead of once per voxel
    fn generate_chunk(&self, chunk_pos: ChunkPos) -> ChunkData {
        let origin = chunk_pos.origin();
        let mut voxels = vec![Voxel::AIR; CHUNK_VOLUME].into_boxed_slice();

        for x in 0..CHUNK_SIZE as u8 {
            for y in 0..CHUNK_SIZE as u8 {
                let height = self.surface_height(origin.0.x + x as i32, origin.0.y + y as i32);

                for z in 0..CHUNK_SIZE as u8 {
                    let world_z = origin.0.z + z as i32;
                    voxels[LocalPos::new(x, y, z).to_index()] =
                        Self::voxel_in_column(world_z, height);
                }
            }
        }

        let mut data = ChunkData::from_voxels(voxels);
        data.compress();
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_matches_per_voxel_generation() {
        let generator = NoiseWorldGenerator::new(123_456);
        let chunk_pos = ChunkPos::new(3, -2, 0);
        let data = generator.generate_chunk(chunk_pos);

        for index in (0..CHUNK_VOLUME).step_by(97) {
            let local = LocalPos::from_index(index);
            let world = WorldPos::from_chunk_and_voxel(chunk_pos, local);
            assert_eq!(data.get(local), generator.generate_voxel(world));
        }
    }

    #[test]
    fn test_deep_chunks_are_stone() {
        let generator = NoiseWorldGenerator::new(7);
        let data = generator.generate_chunk(ChunkPos::new(0, 0, -4));
        assert_eq!(data.uniform_voxel(), Some(Voxel::STONE));

        let sky = generator.generate_chunk(ChunkPos::new(0, 0, 4));
        assert_eq!(sky.uniform_voxel(), Some(Voxel::AIR));
    }
}
