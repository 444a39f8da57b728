use std::{
    mem::size_of,
    sync::{Arc, RwLock},
};

use crate::{
    limits::CHUNK_VOLUME,
    voxels::{
        coord::LocalPos,
        runs::{self, VoxelRun},
        voxel::Voxel,
    },
};

/// Chunk data shared between the coordinator and worker threads.
/// Only the pipeline stage currently owning the chunk writes to it.
pub type SharedChunkData = Arc<RwLock<ChunkData>>;

#[derive(Debug, Clone)]
enum Storage {
    Uncompressed(Box<[Voxel]>),
    Compressed(Vec<VoxelRun>),
}

/// Voxels of one chunk, either as a flat array or as run-length encoded runs.
/// Exactly one representation is live at a time.
#[derive(Debug, Clone)]
pub struct ChunkData {
    storage: Storage,
    is_additive: bool,
}

impl Default for ChunkData {
    fn default() -> Self {
        Self::filled(Voxel::AIR)
    }
}

impl ChunkData {
    pub fn filled(voxel: Voxel) -> Self {
        ChunkData {
            storage: Storage::Compressed(vec![VoxelRun::new(voxel, CHUNK_VOLUME as u32)]),
            is_additive: false,
        }
    }

    /// An overlay with no overrides; every cell defers to the generator
    pub fn new_additive() -> Self {
        ChunkData {
            storage: Storage::Compressed(vec![VoxelRun::new(Voxel::NULL, CHUNK_VOLUME as u32)]),
            is_additive: true,
        }
    }

    pub fn from_voxels(voxels: Box<[Voxel]>) -> Self {
        assert!(
            voxels.len() == CHUNK_VOLUME,
            "Voxel slice must have exactly {} elements",
            CHUNK_VOLUME
        );

        ChunkData {
            storage: Storage::Uncompressed(voxels),
            is_additive: false,
        }
    }

    pub fn from_runs(runs: Vec<VoxelRun>, is_additive: bool) -> Self {
        assert!(
            runs::total_length(&runs) == CHUNK_VOLUME,
            "Runs must cover exactly {} voxels",
            CHUNK_VOLUME
        );

        ChunkData {
            storage: Storage::Compressed(runs),
            is_additive,
        }
    }

    pub fn share(self) -> SharedChunkData {
        Arc::new(RwLock::new(self))
    }

    pub fn is_additive(&self) -> bool {
        self.is_additive
    }

    pub fn set_additive(&mut self, is_additive: bool) {
        self.is_additive = is_additive;
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.storage, Storage::Compressed(_))
    }

    pub fn get(&self, pos: LocalPos) -> Voxel {
        let index = pos.to_index();
        match &self.storage {
            Storage::Uncompressed(voxels) => voxels[index],
            Storage::Compressed(runs) => runs::get(runs, index),
        }
    }

    pub fn set(&mut self, pos: LocalPos, voxel: Voxel) {
        let index = pos.to_index();
        match &mut self.storage {
            Storage::Uncompressed(voxels) => voxels[index] = voxel,
            Storage::Compressed(runs) => runs::set(runs, index, voxel),
        }
    }

    pub fn remove(&mut self, pos: LocalPos) {
        self.set(pos, Voxel::AIR);
    }

    /// Switches to the run-length form. Idempotent.
    pub fn compress(&mut self) {
        if let Storage::Uncompressed(voxels) = &self.storage {
            self.storage = Storage::Compressed(runs::compress(voxels));
        }
    }

    pub fn decompress(&mut self) {
        if let Storage::Compressed(runs) = &self.storage {
            let voxels = runs::decompress(runs).into_boxed_slice();
            self.storage = Storage::Uncompressed(voxels);
        }
    }

    pub fn runs(&self) -> Option<&[VoxelRun]> {
        match &self.storage {
            Storage::Compressed(runs) => Some(runs.as_slice()),
            Storage::Uncompressed(_) => None,
        }
    }

    /// Canonical runs regardless of the live representation
    pub fn to_runs(&self) -> Vec<VoxelRun> {
        match &self.storage {
            Storage::Compressed(runs) => runs.clone(),
            Storage::Uncompressed(voxels) => runs::compress(voxels),
        }
    }

    /// Flat copy of the voxels in index order
    pub fn to_voxels(&self) -> Box<[Voxel]> {
        match &self.storage {
            Storage::Uncompressed(voxels) => voxels.clone(),
            Storage::Compressed(runs) => runs::decompress(runs).into_boxed_slice(),
        }
    }

    /// The single voxel filling the whole chunk, if there is one
    pub fn uniform_voxel(&self) -> Option<Voxel> {
        match &self.storage {
            Storage::Compressed(runs) if runs.len() == 1 => Some(runs[0].voxel),
            Storage::Compressed(_) => None,
            Storage::Uncompressed(voxels) => {
                let first = voxels[0];
                voxels.iter().all(|&v| v == first).then_some(first)
            }
        }
    }

    pub fn is_empty_air(&self) -> bool {
        self.uniform_voxel().is_some_and(|voxel| voxel.is_air())
    }

    pub fn same_voxels(&self, other: &ChunkData) -> bool {
        self.to_runs() == other.to_runs()
    }

    pub fn approximate_size(&self) -> usize {
        size_of::<Self>()
            + match &self.storage {
                Storage::Uncompressed(voxels) => voxels.len() * size_of::<Voxel>(),
                Storage::Compressed(runs) => runs.capacity() * size_of::<VoxelRun>(),
            }
    }
}
