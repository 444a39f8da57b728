pub mod chunk_data;
pub mod coord;
pub mod face;
pub mod registry;
pub mod runs;
pub mod voxel;
