use std::{
    fmt,
    ops::{Add, Sub},
};

use glam::{IVec3, U8Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    limits::{CHUNK_SIZE, CHUNK_SIZE_I32, CHUNK_VOLUME, REGION_SIZE},
    voxels::face::Face,
};

/// Wraps a coordinate one step outside a chunk into the neighbor chunk's local space.
pub fn normalize_cyclic(value: i32) -> u8 {
    value.rem_euclid(CHUNK_SIZE_I32) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A position of a voxel within a chunk
pub struct LocalPos(pub U8Vec3);

impl LocalPos {
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        let size = CHUNK_SIZE as u8;
        if x >= size || y >= size || z >= size {
            panic!("LocalPos out of bounds: ({}, {}, {})", x, y, z);
        }
        LocalPos(U8Vec3 { x, y, z })
    }

    /// Flat index into chunk storage, z varies fastest
    pub fn to_index(&self) -> usize {
        let LocalPos(U8Vec3 { x, y, z }) = *self;
        (x as usize * CHUNK_SIZE * CHUNK_SIZE) + (y as usize * CHUNK_SIZE) + z as usize
    }

    pub fn from_index(index: usize) -> Self {
        if index >= CHUNK_VOLUME {
            panic!("Voxel index out of bounds: {}", index);
        }

        let z = (index % CHUNK_SIZE) as u8;
        let y = ((index / CHUNK_SIZE) % CHUNK_SIZE) as u8;
        let x = (index / (CHUNK_SIZE * CHUNK_SIZE)) as u8;
        LocalPos(U8Vec3 { x, y, z })
    }

    pub fn offset(&self, face: Face) -> Option<LocalPos> {
        let new_pos = self.0.as_ivec3() + face.to_ivec3();

        if new_pos.cmplt(IVec3::ZERO).any() || new_pos.cmpge(IVec3::splat(CHUNK_SIZE_I32)).any() {
            None
        } else {
            Some(LocalPos(new_pos.as_u8vec3()))
        }
    }

    /// The cell one step across the chunk boundary, expressed in the neighbor chunk's local space
    pub fn across_boundary(&self, face: Face) -> LocalPos {
        let across = self.0.as_ivec3() + face.to_ivec3();
        LocalPos(U8Vec3::new(
            normalize_cyclic(across.x),
            normalize_cyclic(across.y),
            normalize_cyclic(across.z),
        ))
    }

    pub fn x(&self) -> u8 {
        self.0.x
    }

    pub fn y(&self) -> u8 {
        self.0.y
    }

    pub fn z(&self) -> u8 {
        self.0.z
    }
}

impl From<U8Vec3> for LocalPos {
    fn from(value: U8Vec3) -> Self {
        LocalPos::new(value.x, value.y, value.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Coordinates identifying a chunk in chunk space (world coordinates divided by chunk size and floored)
pub struct ChunkPos(pub IVec3);

impl ChunkPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        ChunkPos(IVec3 { x, y, z })
    }

    pub fn x(&self) -> i32 {
        self.0.x
    }

    pub fn y(&self) -> i32 {
        self.0.y
    }

    pub fn z(&self) -> i32 {
        self.0.z
    }

    pub fn origin(&self) -> WorldPos {
        WorldPos(self.0 * IVec3::splat(CHUNK_SIZE_I32))
    }

    pub fn neighbor(&self, face: Face) -> ChunkPos {
        ChunkPos(self.0 + face.to_ivec3())
    }

    pub fn region(&self) -> RegionPos {
        RegionPos(self.0.div_euclid(IVec3::splat(REGION_SIZE)))
    }

    pub fn manhattan_distance(&self, other: ChunkPos) -> u32 {
        self.0.manhattan_distance(other.0)
    }

    pub fn to_array(&self) -> [i32; 3] {
        self.0.to_array()
    }
}

impl Add for ChunkPos {
    type Output = ChunkPos;

    fn add(self, other: ChunkPos) -> ChunkPos {
        ChunkPos(self.0 + other.0)
    }
}

impl Sub for ChunkPos {
    type Output = ChunkPos;

    fn sub(self, other: ChunkPos) -> ChunkPos {
        ChunkPos(self.0 - other.0)
    }
}

/// Coordinates of a region, the unit of persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionPos(pub IVec3);

impl RegionPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        RegionPos(IVec3 { x, y, z })
    }

    /// Storage key, "x,y,z"
    pub fn name(&self) -> String {
        format!("{},{},{}", self.0.x, self.0.y, self.0.z)
    }

    pub fn parse_name(name: &str) -> Option<RegionPos> {
        let mut parts = name.split(',').map(|part| part.trim().parse::<i32>());
        let x = parts.next()?.ok()?;
        let y = parts.next()?.ok()?;
        let z = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(RegionPos::new(x, y, z))
    }

    pub fn contains(&self, chunk: ChunkPos) -> bool {
        chunk.region() == *self
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0.x, self.0.y, self.0.z)
    }
}

/// A position of a voxel in world space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldPos(pub IVec3);

impl WorldPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        WorldPos(IVec3 { x, y, z })
    }

    pub fn to_chunk_pos(&self) -> ChunkPos {
        ChunkPos(self.0.div_euclid(IVec3::splat(CHUNK_SIZE_I32)))
    }

    pub fn to_local_pos(&self) -> LocalPos {
        LocalPos(self.0.rem_euclid(IVec3::splat(CHUNK_SIZE_I32)).as_u8vec3())
    }

    pub fn from_chunk_and_voxel(chunk_pos: ChunkPos, local_pos: LocalPos) -> Self {
        chunk_pos.origin() + local_pos
    }
}

impl From<IVec3> for WorldPos {
    fn from(value: IVec3) -> Self {
        WorldPos(value)
    }
}

impl From<[i32; 3]> for WorldPos {
    fn from(value: [i32; 3]) -> Self {
        WorldPos(IVec3::from(value))
    }
}

impl Add for WorldPos {
    type Output = WorldPos;

    fn add(self, other: WorldPos) -> WorldPos {
        WorldPos(self.0 + other.0)
    }
}

impl Sub for WorldPos {
    type Output = WorldPos;

    fn sub(self, other: WorldPos) -> WorldPos {
        WorldPos(self.0 - other.0)
    }
}

impl Add<LocalPos> for WorldPos {
    type Output = WorldPos;

    fn add(self, other: LocalPos) -> WorldPos {
        WorldPos(self.0 + other.0.as_ivec3())
    }
}
