use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::TransferError,
    regions::persistence::RegionPersistence,
    voxels::coord::RegionPos,
};

const ARCHIVE_MAGIC: [u8; 4] = *b"CVWA";
const ARCHIVE_FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = ARCHIVE_MAGIC.len() + 1;

/// Default payload size of one stream slice
pub const DEFAULT_SLICE_SIZE: usize = 16 * 1024;

#[derive(Serialize, Deserialize)]
struct ArchivedRegion {
    name: String,
    blob: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WorldArchive {
    regions: Vec<ArchivedRegion>,
}

/// Packs every region recorded in the world index into a single buffer.
/// Region blobs are copied as stored, without decoding them.
pub fn export_world(persistence: &dyn RegionPersistence) -> Result<Vec<u8>, TransferError> {
    let index = persistence.load_world_index()?.unwrap_or_default();

    let mut regions = Vec::with_capacity(index.saved_regions.len());
    for name in index.saved_regions {
        match persistence.load_region(&name)? {
            Some(blob) => regions.push(ArchivedRegion { name, blob }),
            None => warn!("Region {} is in the world index but was never written", name),
        }
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&ARCHIVE_MAGIC);
    bytes.push(ARCHIVE_FORMAT_VERSION);
    bincode::serialize_into(&mut bytes, &WorldArchive { regions })?;
    Ok(bytes)
}

/// Writes every region of an archive into `persistence` and merges them into its world index.
/// Returns the number of regions imported.
pub fn import_world(bytes: &[u8], persistence: &dyn RegionPersistence) -> Result<usize, TransferError> {
    if bytes.len() < HEADER_LEN {
        return Err(TransferError::Truncated);
    }
    if bytes[..ARCHIVE_MAGIC.len()] != ARCHIVE_MAGIC {
        return Err(TransferError::InvalidMagic);
    }
    let version = bytes[ARCHIVE_MAGIC.len()];
    if version != ARCHIVE_FORMAT_VERSION {
        return Err(TransferError::UnsupportedVersion(version));
    }

    let archive: WorldArchive = bincode::deserialize(&bytes[HEADER_LEN..])?;
    let mut index = persistence.load_world_index()?.unwrap_or_default();
    let mut imported = 0;

    for region in archive.regions {
        if RegionPos::parse_name(&region.name).is_none() {
            warn!("Skipping archived region with invalid name {:?}", region.name);
            continue;
        }

        persistence.save_region(&region.name, &region.blob)?;
        index.saved_regions.insert(region.name);
        imported += 1;
    }

    persistence.save_world_index(&index)?;
    info!("Imported {} regions", imported);
    Ok(imported)
}

/// A piece of a serialized buffer in flight. `end_of_stream_index` is the full buffer length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSlice {
    pub start_index: usize,
    pub data: Vec<u8>,
    pub end_of_stream_index: usize,
}

/// Cuts a buffer into consecutive slices of at most `slice_size` bytes.
/// An empty buffer still produces one (empty) slice so the receiver learns the stream ended.
pub struct StreamSlicer<'a> {
    data: &'a [u8],
    slice_size: usize,
    position: usize,
    sent_any: bool,
}

impl<'a> StreamSlicer<'a> {
    pub fn new(data: &'a [u8], slice_size: usize) -> Self {
        assert!(slice_size > 0, "Slice size must be positive");

        StreamSlicer {
            data,
            slice_size,
            position: 0,
            sent_any: false,
        }
    }

    pub fn slice_count(&self) -> usize {
        self.data.len().div_ceil(self.slice_size).max(1)
    }
}

impl Iterator for StreamSlicer<'_> {
    type Item = StreamSlice;

    fn next(&mut self) -> Option<StreamSlice> {
        if self.position >= self.data.len() && self.sent_any {
            return None;
        }

        let end = (self.position + self.slice_size).min(self.data.len());
        let slice = StreamSlice {
            start_index: self.position,
            data: self.data[self.position..end].to_vec(),
            end_of_stream_index: self.data.len(),
        };

        self.position = end;
        self.sent_any = true;
        Some(slice)
    }
}

/// Reassembles slices produced by [`StreamSlicer`]. Slices must arrive in order.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    buffer: Vec<u8>,
    expected_length: Option<usize>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    /// Adds the next slice. Returns the whole buffer once the last byte has arrived,
    /// after which the assembler is ready for a new stream.
    pub fn push(&mut self, slice: StreamSlice) -> Result<Option<Vec<u8>>, TransferError> {
        let expected_length = *self.expected_length.get_or_insert(slice.end_of_stream_index);

        if slice.end_of_stream_index != expected_length {
            return Err(TransferError::LengthMismatch {
                expected: expected_length,
                got: slice.end_of_stream_index,
            });
        }
        if slice.start_index != self.buffer.len() {
            return Err(TransferError::SliceOutOfOrder {
                expected: self.buffer.len(),
                got: slice.start_index,
            });
        }
        if slice.start_index + slice.data.len() > expected_length {
            return Err(TransferError::SliceOverrun {
                end: expected_length,
            });
        }

        self.buffer.extend_from_slice(&slice.data);

        if self.buffer.len() == expected_length {
            self.expected_length = None;
            Ok(Some(std::mem::take(&mut self.buffer)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        regions::{
            persistence::{MemoryPersistence, WorldIndex},
            region_store::RegionStore,
        },
        voxels::{
            chunk_data::ChunkData, coord::ChunkPos, registry::VoxelRegistry, voxel::Voxel,
        },
    };

    #[test]
    fn test_slicing_and_reassembly() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let slicer = StreamSlicer::new(&data, 64);
        assert_eq!(slicer.slice_count(), 16);

        let slices: Vec<StreamSlice> = slicer.collect();
        assert_eq!(slices.len(), 16);
        assert_eq!(slices.last().unwrap().data.len(), 1000 - 15 * 64);
        assert!(slices.iter().all(|s| s.end_of_stream_index == 1000));

        let mut assembler = StreamAssembler::new();
        let mut result = None;
        for slice in slices {
            assert!(result.is_none());
            result = assembler.push(slice).unwrap();
        }
        assert_eq!(result, Some(data));
        assert_eq!(assembler.received(), 0);
    }

    #[test]
    fn test_empty_stream_is_one_slice() {
        let slices: Vec<StreamSlice> = StreamSlicer::new(&[], 8).collect();
        assert_eq!(slices.len(), 1);
        assert!(slices[0].data.is_empty());

        let mut assembler = StreamAssembler::new();
        assert_eq!(assembler.push(slices[0].clone()).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_assembler_rejects_bad_slices() {
        let data = vec![7u8; 20];
        let slices: Vec<StreamSlice> = StreamSlicer::new(&data, 8).collect();

        let mut assembler = StreamAssembler::new();
        assert!(matches!(
            assembler.push(slices[1].clone()),
            Err(TransferError::SliceOutOfOrder { expected: 0, got: 8 })
        ));

        assembler.push(slices[0].clone()).unwrap();
        let mut wrong_length = slices[1].clone();
        wrong_length.end_of_stream_index = 99;
        assert!(matches!(
            assembler.push(wrong_length),
            Err(TransferError::LengthMismatch { expected: 20, got: 99 })
        ));

        let mut overrun = slices[1].clone();
        overrun.data = vec![0; 30];
        assert!(matches!(
            assembler.push(overrun),
            Err(TransferError::SliceOverrun { end: 20 })
        ));
    }

    #[test]
    fn test_world_export_import() {
        let source = MemoryPersistence::new();
        let mut store = RegionStore::new(Box::new(source.clone()), VoxelRegistry::new());
        store
            .set_chunk(ChunkPos::new(0, 0, 0), ChunkData::filled(Voxel::GRASS))
            .unwrap();
        store
            .set_chunk(ChunkPos::new(-9, 0, 0), ChunkData::filled(Voxel::DIRT))
            .unwrap();
        assert_eq!(store.flush().unwrap(), 2);

        let archive = export_world(&source).unwrap();
        assert_eq!(&archive[..4], b"CVWA");

        // Ship it through the slicer like a network transfer would
        let mut assembler = StreamAssembler::new();
        let mut received = None;
        for slice in StreamSlicer::new(&archive, 100) {
            received = assembler.push(slice).unwrap();
        }

        let target = MemoryPersistence::new();
        assert_eq!(import_world(&received.unwrap(), &target).unwrap(), 2);
        assert_eq!(target.region_count(), 2);

        let index: WorldIndex = target.load_world_index().unwrap().unwrap();
        assert_eq!(index, source.load_world_index().unwrap().unwrap());

        let mut reopened = RegionStore::new(Box::new(target), VoxelRegistry::new());
        let chunk = reopened.saved_chunk(ChunkPos::new(-9, 0, 0)).unwrap().unwrap();
        assert_eq!(chunk.uniform_voxel(), Some(Voxel::DIRT));
    }

    #[test]
    fn test_import_rejects_foreign_data() {
        let target = MemoryPersistence::new();
        assert!(matches!(import_world(b"CV", &target), Err(TransferError::Truncated)));
        assert!(matches!(
            import_world(b"CVRG\x01", &target),
            Err(TransferError::InvalidMagic)
        ));
        assert!(matches!(
            import_world(b"CVWA\x02", &target),
            Err(TransferError::UnsupportedVersion(2))
        ));
        assert_eq!(target.region_count(), 0);
    }
}
