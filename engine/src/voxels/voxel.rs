use std::hash::{Hash, Hasher};

use bitfield_struct::bitfield;

/// A single voxel. Identity is the interned block type alone; the flags are
/// cached copies of the type's registry definition so hot loops never need a lookup.
#[bitfield(u16, default = false)]
pub struct Voxel {
    #[bits(14)]
    pub block_type: u16,
    pub transparent: bool,
    pub solid: bool,
}

impl Voxel {
    pub const NULL_TYPE: u16 = (1 << 14) - 1;
    pub const MAX_TYPE: u16 = Self::NULL_TYPE - 1;

    pub const fn from_parts(block_type: u16, transparent: bool, solid: bool) -> Self {
        Voxel::new()
            .with_block_type(block_type)
            .with_transparent(transparent)
            .with_solid(solid)
    }

    pub const AIR: Voxel = Voxel::from_parts(0, true, false);
    pub const STONE: Voxel = Voxel::from_parts(1, false, true);
    pub const DIRT: Voxel = Voxel::from_parts(2, false, true);
    pub const GRASS: Voxel = Voxel::from_parts(3, false, true);
    pub const WATER: Voxel = Voxel::from_parts(4, true, false);
    /// "Not overridden" marker, only meaningful inside additive chunks
    pub const NULL: Voxel = Voxel::from_parts(Self::NULL_TYPE, true, false);

    pub const fn is_transparent(&self) -> bool {
        self.transparent()
    }

    pub const fn is_solid(&self) -> bool {
        self.solid()
    }

    pub const fn is_air(&self) -> bool {
        self.block_type() == Self::AIR.block_type()
    }

    pub const fn is_null(&self) -> bool {
        self.block_type() == Self::NULL_TYPE
    }
}

impl Default for Voxel {
    fn default() -> Self {
        Voxel::AIR
    }
}

impl PartialEq for Voxel {
    fn eq(&self, other: &Self) -> bool {
        self.block_type() == other.block_type()
    }
}

impl Eq for Voxel {}

impl Hash for Voxel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.block_type().hash(state);
    }
}
