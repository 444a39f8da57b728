use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{RegionError, RegionFormatError},
    limits::CHUNK_VOLUME,
    voxels::{
        chunk_data::ChunkData,
        coord::{ChunkPos, RegionPos},
        registry::{VoxelRegistry, VoxelTypeDefinition},
        runs::VoxelRun,
        voxel::Voxel,
    },
};

const REGION_MAGIC: [u8; 4] = *b"CVRG";
const REGION_FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = REGION_MAGIC.len() + 1;

/// Saved chunks of one region, always in compressed form
#[derive(Debug, Clone)]
pub struct RegionData {
    pos: RegionPos,
    chunks: AHashMap<ChunkPos, ChunkData>,
}

impl RegionData {
    pub fn new(pos: RegionPos) -> Self {
        RegionData {
            pos,
            chunks: AHashMap::new(),
        }
    }

    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    pub fn get(&self, chunk: ChunkPos) -> Option<&ChunkData> {
        self.chunks.get(&chunk)
    }

    pub fn get_mut(&mut self, chunk: ChunkPos) -> Option<&mut ChunkData> {
        self.chunks.get_mut(&chunk)
    }

    pub fn insert(&mut self, chunk: ChunkPos, mut data: ChunkData) {
        assert!(
            self.pos.contains(chunk),
            "Chunk {:?} does not belong to region {}",
            chunk,
            self.pos
        );
        data.compress();
        self.chunks.insert(chunk, data);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredChunk {
    pos: [i32; 3],
    additive: bool,
    runs: Vec<(u16, u32)>,
}

#[derive(Serialize, Deserialize)]
struct RegionBody {
    region: [i32; 3],
    palette: Vec<VoxelTypeDefinition>,
    chunks: Vec<StoredChunk>,
}

/// Serializes a region as magic, version byte, then a bincode body with a voxel name palette
pub fn encode_region(region: &RegionData, registry: &VoxelRegistry) -> Result<Vec<u8>, RegionError> {
    let mut palette: Vec<VoxelTypeDefinition> = Vec::new();
    let mut palette_indices: AHashMap<Voxel, u16> = AHashMap::new();

    let mut positions: Vec<ChunkPos> = region.chunk_positions().collect();
    positions.sort_unstable_by_key(|pos| pos.to_array());

    let mut chunks = Vec::with_capacity(positions.len());
    for pos in positions {
        let data = &region.chunks[&pos];
        let mut runs = Vec::new();

        for run in data.to_runs() {
            let index = match palette_indices.get(&run.voxel) {
                Some(&index) => index,
                None => {
                    let definition = if run.voxel.is_null() {
                        VoxelTypeDefinition::new(
                            crate::voxels::registry::NULL_VOXEL_NAME,
                            true,
                            false,
                        )
                    } else {
                        registry
                            .definition(run.voxel)
                            .cloned()
                            .ok_or(RegionError::UnknownVoxelType(run.voxel.block_type()))?
                    };
                    let index = palette.len() as u16;
                    palette.push(definition);
                    palette_indices.insert(run.voxel, index);
                    index
                }
            };
            runs.push((index, run.length));
        }

        chunks.push(StoredChunk {
            pos: pos.to_array(),
            additive: data.is_additive(),
            runs,
        });
    }

    let body = RegionBody {
        region: region.pos.0.to_array(),
        palette,
        chunks,
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN);
    bytes.extend_from_slice(&REGION_MAGIC);
    bytes.push(REGION_FORMAT_VERSION);
    bincode::serialize_into(&mut bytes, &body).map_err(|source| RegionError::Encode {
        region: region.pos,
        source,
    })?;
    Ok(bytes)
}

/// Parses and validates a region blob. Unknown voxel names are registered on the fly.
pub fn decode_region(
    bytes: &[u8],
    expected: RegionPos,
    registry: &mut VoxelRegistry,
) -> Result<RegionData, RegionFormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(RegionFormatError::Truncated);
    }
    if bytes[..REGION_MAGIC.len()] != REGION_MAGIC {
        return Err(RegionFormatError::InvalidMagic);
    }
    let version = bytes[REGION_MAGIC.len()];
    if version != REGION_FORMAT_VERSION {
        return Err(RegionFormatError::UnsupportedVersion(version));
    }

    let body: RegionBody = bincode::deserialize(&bytes[HEADER_LEN..])?;
    let invalid = |reason: String| RegionFormatError::Invalid(reason);

    if RegionPos::new(body.region[0], body.region[1], body.region[2]) != expected {
        return Err(invalid(format!(
            "blob is for region {:?}, expected {}",
            body.region, expected
        )));
    }

    let palette = body
        .palette
        .iter()
        .map(|definition| registry.resolve(definition))
        .collect::<Result<Vec<Voxel>, _>>()
        .map_err(|err| invalid(err.to_string()))?;

    let mut region = RegionData::new(expected);
    for stored in body.chunks {
        let pos = ChunkPos::new(stored.pos[0], stored.pos[1], stored.pos[2]);
        if !expected.contains(pos) {
            return Err(invalid(format!("chunk {:?} lies outside the region", pos)));
        }
        if region.chunks.contains_key(&pos) {
            return Err(invalid(format!("chunk {:?} is stored twice", pos)));
        }

        let mut runs: Vec<VoxelRun> = Vec::with_capacity(stored.runs.len());
        let mut total = 0usize;
        for (index, length) in stored.runs {
            let voxel = *palette
                .get(index as usize)
                .ok_or_else(|| invalid(format!("palette index {} out of range", index)))?;
            if length == 0 {
                return Err(invalid(format!("empty run in chunk {:?}", pos)));
            }
            total += length as usize;
            runs.push(VoxelRun::new(voxel, length));
        }

        if total != CHUNK_VOLUME {
            return Err(invalid(format!(
                "chunk {:?} covers {} voxels instead of {}",
                pos, total, CHUNK_VOLUME
            )));
        }
        if !stored.additive && runs.iter().any(|run| run.voxel.is_null()) {
            return Err(invalid(format!("non-additive chunk {:?} contains Null", pos)));
        }

        region
            .chunks
            .insert(pos, ChunkData::from_runs(runs, stored.additive));
    }

    Ok(region)
}
