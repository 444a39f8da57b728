use crate::{
    voxels::{coord::WorldPos, voxel::Voxel},
    worldgen::world_generator::WorldGenerator,
};

/// Every position holds the same voxel
pub struct FilledWorldGenerator(pub Voxel);

impl WorldGenerator for FilledWorldGenerator {
    fn generate_voxel(&self, _pos: WorldPos) -> Voxel {
        self.0
    }
}

/// Solid ground below `ground_level`, air from there up
pub struct FlatWorldGenerator {
    pub ground_level: i32,
    pub ground: Voxel,
}

impl WorldGenerator for FlatWorldGenerator {
    fn generate_voxel(&self, pos: WorldPos) -> Voxel {
        if pos.0.z < self.ground_level {
            self.ground
        } else {
            Voxel::AIR
        }
    }
}

/// Every other voxel filled, the worst case for face counts
pub struct TortureTestWorldGenerator(pub Voxel);

impl WorldGenerator for TortureTestWorldGenerator {
    fn generate_voxel(&self, pos: WorldPos) -> Voxel {
        if (pos.0.x + pos.0.y + pos.0.z).rem_euclid(2) == 0 {
            self.0
        } else {
            Voxel::AIR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        limits::{CHUNK_AREA, CHUNK_VOLUME},
        mesh_generation::mesher::{generate_boundary_geometry, generate_interior_geometry},
        voxels::{coord::ChunkPos, face::Face},
    };

    #[test]
    fn test_torture_chunk_face_counts() {
        let generator = TortureTestWorldGenerator(Voxel::STONE);
        let data = generator.generate_chunk(ChunkPos::new(0, 0, 0));
        let interior = generate_interior_geometry(&data);

        // Each filled voxel shows every in-bounds face; half the voxels are filled
        let in_bounds_neighbors = 6 * CHUNK_VOLUME - 6 * CHUNK_AREA;
        assert_eq!(interior.len(), in_bounds_neighbors / 2);

        let neighbor = generator.generate_chunk(ChunkPos::new(1, 0, 0));
        let side = generate_boundary_geometry(&data, &neighbor, Face::PosX);
        assert_eq!(side.len(), CHUNK_AREA / 2);
    }

    #[test]
    fn test_flat_world_splits_at_ground_level() {
        let generator = FlatWorldGenerator {
            ground_level: 0,
            ground: Voxel::DIRT,
        };
        assert_eq!(generator.generate_voxel(WorldPos::new(5, 5, -1)), Voxel::DIRT);
        assert_eq!(generator.generate_voxel(WorldPos::new(5, 5, 0)), Voxel::AIR);
        assert_eq!(
            generator.generate_chunk(ChunkPos::new(0, 0, -1)).uniform_voxel(),
            Some(Voxel::DIRT)
        );
    }
}
