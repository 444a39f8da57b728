use crate::{
    limits::CHUNK_VOLUME,
    voxels::{
        chunk_data::ChunkData,
        coord::{ChunkPos, LocalPos, WorldPos},
        voxel::Voxel,
    },
};

/// Procedural source of voxels. Injected into the streamer and shared by every worker.
pub trait WorldGenerator: Send + Sync + 'static {
    fn generate_voxel(&self, pos: WorldPos) -> Voxel;

    fn generate_chunk(&self, chunk_pos: ChunkPos) -> ChunkData {
        let origin = chunk_pos.origin();
        let voxels: Box<[Voxel]> = (0..CHUNK_VOLUME)
            .map(|index| self.generate_voxel(origin + LocalPos::from_index(index)))
            .collect();

        let mut data = ChunkData::from_voxels(voxels);
        data.compress();
        data
    }
}

/// Adapts a plain closure into a generator
pub struct FnGenerator<F>(pub F);

impl<F> WorldGenerator for FnGenerator<F>
where
    F: Fn(WorldPos) -> Voxel + Send + Sync + 'static,
{
    fn generate_voxel(&self, pos: WorldPos) -> Voxel {
        (self.0)(pos)
    }
}

/// Fills every `Null` cell of an additive overlay from the generator, keeping the overrides
pub fn generate_with_overlay(
    generator: &dyn WorldGenerator,
    chunk_pos: ChunkPos,
    overlay: &ChunkData,
) -> ChunkData {
    let origin = chunk_pos.origin();
    let mut voxels = overlay.to_voxels();

    for (index, voxel) in voxels.iter_mut().enumerate() {
        if voxel.is_null() {
            *voxel = generator.generate_voxel(origin + LocalPos::from_index(index));
        }
    }

    let mut data = ChunkData::from_voxels(voxels);
    data.compress();
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_chunk_uses_world_positions() {
        let generator = FnGenerator(|pos: WorldPos| {
            if pos.0.z < 40 { Voxel::STONE } else { Voxel::AIR }
        });

        let data = generator.generate_chunk(ChunkPos::new(0, 0, 1));
        assert!(data.is_compressed());
        assert_eq!(data.get(LocalPos::new(0, 0, 7)), Voxel::STONE);
        assert_eq!(data.get(LocalPos::new(31, 31, 8)), Voxel::AIR);
    }

    #[test]
    fn test_overlay_replay_keeps_overrides() {
        let generator = FnGenerator(|_: WorldPos| Voxel::WATER);
        let override_pos = LocalPos::new(5, 6, 7);
        let mut overlay = ChunkData::new_additive();
        overlay.set(override_pos, Voxel::STONE);

        let data = generate_with_overlay(&generator, ChunkPos::new(2, -1, 0), &overlay);
        assert!(!data.is_additive());
        assert_eq!(data.get(override_pos), Voxel::STONE);
        assert_eq!(
            data.runs().map(|runs| runs.len()),
            Some(3),
            "everything but the override should be water"
        );
        for index in 0..CHUNK_VOLUME {
            let pos = LocalPos::from_index(index);
            let expected = if pos == override_pos { Voxel::STONE } else { Voxel::WATER };
            assert_eq!(data.get(pos), expected);
        }
    }
}
