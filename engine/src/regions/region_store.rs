use ahash::{AHashMap, AHashSet};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::{
    error::RegionError,
    regions::{
        persistence::{RegionPersistence, WorldIndex},
        region_file::{RegionData, decode_region, encode_region},
    },
    voxels::{
        chunk_data::ChunkData,
        coord::{ChunkPos, LocalPos, RegionPos},
        registry::VoxelRegistry,
        voxel::Voxel,
    },
};

/// Disk-backed region cache. Regions are hydrated lazily on first access and
/// written back only when dirty.
pub struct RegionStore {
    persistence: Box<dyn RegionPersistence>,
    registry: VoxelRegistry,
    cache: AHashMap<RegionPos, RegionData>,
    // Regions known to have nothing saved, so lookups don't hit persistence again
    absent: AHashSet<RegionPos>,
    dirty: AHashSet<RegionPos>,
    corrupt: AHashMap<RegionPos, String>,
    index: WorldIndex,
}

impl RegionStore {
    pub fn new(persistence: Box<dyn RegionPersistence>, registry: VoxelRegistry) -> Self {
        let index = match persistence.load_world_index() {
            Ok(Some(index)) => index,
            Ok(None) => WorldIndex::default(),
            Err(err) => {
                warn!("Failed to read world index, starting with an empty one: {:?}", err);
                WorldIndex::default()
            }
        };

        RegionStore {
            persistence,
            registry,
            cache: AHashMap::new(),
            absent: AHashSet::new(),
            dirty: AHashSet::new(),
            corrupt: AHashMap::new(),
            index,
        }
    }

    pub fn registry(&self) -> &VoxelRegistry {
        &self.registry
    }

    pub fn persistence(&self) -> &dyn RegionPersistence {
        self.persistence.as_ref()
    }

    fn corrupt_error(&self, region: RegionPos) -> Option<RegionError> {
        self.corrupt.get(&region).map(|reason| RegionError::Corrupt {
            region,
            reason: reason.clone(),
        })
    }

    /// Makes sure the region is in the cache if it exists anywhere.
    /// Returns whether it does.
    fn hydrate(&mut self, region: RegionPos) -> Result<bool, RegionError> {
        if self.cache.contains_key(&region) {
            return Ok(true);
        }
        if let Some(err) = self.corrupt_error(region) {
            return Err(err);
        }
        if self.absent.contains(&region) {
            return Ok(false);
        }

        let name = region.name();
        if !self.persistence.region_exists(&name) {
            self.absent.insert(region);
            return Ok(false);
        }

        let Some(bytes) = self.persistence.load_region(&name)? else {
            self.absent.insert(region);
            return Ok(false);
        };

        match decode_region(&bytes, region, &mut self.registry) {
            Ok(data) => {
                debug!("Loaded region {} with {} chunks", region, data.len());
                self.cache.insert(region, data);
                Ok(true)
            }
            Err(err) if err.is_unreadable() => {
                warn!("Region {} could not be parsed, treating it as absent: {}", region, err);
                self.absent.insert(region);
                Ok(false)
            }
            Err(err) => {
                error!("Region {} is corrupt and will not be overwritten: {}", region, err);
                self.corrupt.insert(region, err.to_string());
                Err(RegionError::Corrupt {
                    region,
                    reason: err.to_string(),
                })
            }
        }
    }

    pub fn get_region(&mut self, region: RegionPos) -> Result<Option<&RegionData>, RegionError> {
        if self.hydrate(region)? {
            Ok(self.cache.get(&region))
        } else {
            Ok(None)
        }
    }

    /// A copy of the saved data for a chunk, if its region holds any
    pub fn saved_chunk(&mut self, chunk: ChunkPos) -> Result<Option<ChunkData>, RegionError> {
        Ok(self
            .get_region(chunk.region())?
            .and_then(|region| region.get(chunk))
            .cloned())
    }

    /// Stores full chunk data, replacing any overlay or older copy
    pub fn set_chunk(&mut self, chunk: ChunkPos, data: ChunkData) -> Result<(), RegionError> {
        let region = chunk.region();
        if !self.hydrate(region)? {
            self.absent.remove(&region);
            self.cache.insert(region, RegionData::new(region));
        }

        if let Some(region_data) = self.cache.get_mut(&region) {
            region_data.insert(chunk, data);
        }
        self.dirty.insert(region);
        Ok(())
    }

    /// Records an edit to a chunk that is not loaded. Saved chunks are edited in place,
    /// otherwise the edit lands in an additive overlay replayed over the generator on load.
    pub fn apply_unloaded_edit(
        &mut self,
        chunk: ChunkPos,
        pos: LocalPos,
        voxel: Voxel,
    ) -> Result<(), RegionError> {
        let region = chunk.region();
        if !self.hydrate(region)? {
            self.absent.remove(&region);
            self.cache.insert(region, RegionData::new(region));
        }

        let Some(region_data) = self.cache.get_mut(&region) else {
            return Ok(());
        };

        match region_data.get_mut(chunk) {
            Some(data) => data.set(pos, voxel),
            None => {
                let mut overlay = ChunkData::new_additive();
                overlay.set(pos, voxel);
                region_data.insert(chunk, overlay);
            }
        }

        self.dirty.insert(region);
        Ok(())
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn saved_regions(&self) -> impl Iterator<Item = RegionPos> + '_ {
        self.index
            .saved_regions
            .iter()
            .filter_map(|name| RegionPos::parse_name(name))
    }

    /// Writes every dirty region and the world index. Regions are encoded in parallel.
    /// Returns the number of regions written.
    pub fn flush(&mut self) -> Result<usize, RegionError> {
        if self.dirty.is_empty() {
            return Ok(0);
        }

        let mut dirty: Vec<RegionPos> = self.dirty.iter().copied().collect();
        dirty.sort_unstable_by_key(|pos| pos.0.to_array());

        let cache = &self.cache;
        let registry = &self.registry;
        let encoded: Vec<(RegionPos, Result<Vec<u8>, RegionError>)> = dirty
            .par_iter()
            .filter_map(|pos| cache.get(pos).map(|data| (*pos, encode_region(data, registry))))
            .collect();

        let mut written = 0;
        let mut first_error = None;

        for (pos, result) in encoded {
            let saved = result.and_then(|bytes| {
                self.persistence
                    .save_region(&pos.name(), &bytes)
                    .map_err(RegionError::from)
            });

            match saved {
                Ok(()) => {
                    self.dirty.remove(&pos);
                    self.index.saved_regions.insert(pos.name());
                    written += 1;
                }
                Err(err) => {
                    error!("Failed to save region {}: {}", pos, err);
                    first_error.get_or_insert(err);
                }
            }
        }

        if written > 0 {
            self.persistence.save_world_index(&self.index)?;
            info!("Saved {} regions", written);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::persistence::MemoryPersistence;

    fn store(persistence: &MemoryPersistence) -> RegionStore {
        RegionStore::new(Box::new(persistence.clone()), VoxelRegistry::new())
    }

    #[test]
    fn test_missing_region_is_absent() {
        let persistence = MemoryPersistence::new();
        let mut store = store(&persistence);
        assert!(store.get_region(RegionPos::new(0, 0, 0)).unwrap().is_none());
        assert!(store.saved_chunk(ChunkPos::new(3, 3, 3)).unwrap().is_none());
        assert!(!store.has_dirty());
    }

    #[test]
    fn test_set_chunk_flush_and_reload() {
        let persistence = MemoryPersistence::new();
        let chunk = ChunkPos::new(-1, 0, 9);
        let mut data = ChunkData::filled(Voxel::AIR);
        data.set(LocalPos::new(0, 0, 0), Voxel::GRASS);

        let mut first = store(&persistence);
        first.set_chunk(chunk, data.clone()).unwrap();
        assert_eq!(first.dirty_count(), 1);
        assert_eq!(first.flush().unwrap(), 1);
        assert!(!first.has_dirty());
        assert_eq!(first.flush().unwrap(), 0);

        let mut second = store(&persistence);
        assert_eq!(second.saved_regions().collect::<Vec<_>>(), vec![chunk.region()]);
        let restored = second.saved_chunk(chunk).unwrap().unwrap();
        assert!(!restored.is_additive());
        assert!(restored.same_voxels(&data));
    }

    #[test]
    fn test_unloaded_edit_creates_overlay() {
        let persistence = MemoryPersistence::new();
        let mut store = store(&persistence);
        let chunk = ChunkPos::new(2, 2, 2);

        store
            .apply_unloaded_edit(chunk, LocalPos::new(4, 5, 6), Voxel::STONE)
            .unwrap();
        store
            .apply_unloaded_edit(chunk, LocalPos::new(4, 5, 7), Voxel::AIR)
            .unwrap();

        let overlay = store.saved_chunk(chunk).unwrap().unwrap();
        assert!(overlay.is_additive());
        assert_eq!(overlay.get(LocalPos::new(4, 5, 6)), Voxel::STONE);
        assert_eq!(overlay.get(LocalPos::new(4, 5, 7)), Voxel::AIR);
        assert_eq!(overlay.get(LocalPos::new(0, 0, 0)), Voxel::NULL);
    }

    #[test]
    fn test_unloaded_edit_patches_saved_chunk() {
        let persistence = MemoryPersistence::new();
        let mut store = store(&persistence);
        let chunk = ChunkPos::new(0, 0, 0);
        store.set_chunk(chunk, ChunkData::filled(Voxel::DIRT)).unwrap();

        store
            .apply_unloaded_edit(chunk, LocalPos::new(1, 1, 1), Voxel::AIR)
            .unwrap();
        let saved = store.saved_chunk(chunk).unwrap().unwrap();
        assert!(!saved.is_additive());
        assert_eq!(saved.get(LocalPos::new(1, 1, 1)), Voxel::AIR);
        assert_eq!(saved.get(LocalPos::new(1, 1, 2)), Voxel::DIRT);
    }

    #[test]
    fn test_unparseable_region_counts_as_absent() {
        let persistence = MemoryPersistence::new();
        persistence.overwrite_region("0,0,0", b"garbage".to_vec());

        let mut store = store(&persistence);
        assert!(store.get_region(RegionPos::new(0, 0, 0)).unwrap().is_none());

        // Saving over an unreadable blob is allowed
        store
            .set_chunk(ChunkPos::new(0, 0, 0), ChunkData::filled(Voxel::STONE))
            .unwrap();
        assert_eq!(store.flush().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_region_is_never_overwritten() {
        let persistence = MemoryPersistence::new();
        let mut writer = store(&persistence);
        writer
            .set_chunk(ChunkPos::new(0, 0, 0), ChunkData::filled(Voxel::STONE))
            .unwrap();
        writer.flush().unwrap();

        // Valid header and body, but stored under another region's name
        let bytes = persistence.load_region("0,0,0").unwrap().unwrap();
        persistence.overwrite_region("1,0,0", bytes.clone());

        let mut store = store(&persistence);
        let region = RegionPos::new(1, 0, 0);
        assert!(matches!(
            store.get_region(region),
            Err(RegionError::Corrupt { .. })
        ));
        assert!(store.set_chunk(ChunkPos::new(8, 0, 0), ChunkData::default()).is_err());
        assert!(
            store
                .apply_unloaded_edit(ChunkPos::new(8, 0, 0), LocalPos::new(0, 0, 0), Voxel::AIR)
                .is_err()
        );
        assert!(!store.has_dirty());
        assert_eq!(persistence.load_region("1,0,0").unwrap(), Some(bytes));
    }
}
