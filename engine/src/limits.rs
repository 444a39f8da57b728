// Edge length of a chunk, in voxels
pub const CHUNK_SIZE: usize = 32;
pub const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

// Edge length of a region, in chunks. A region holds REGION_SIZE³ chunks.
pub const REGION_SIZE: i32 = 8;

// View distance from a viewer's chunk, in L1 (Manhattan) steps
pub const DEFAULT_VIEW_DISTANCE: u32 = 4;
// Shells never grow past this many chunks up or down (exclusive)
pub const DEFAULT_VERTICAL_VIEW_DISTANCE: u32 = 3;

// Chunks further than view distance + this margin from every viewer get unloaded
pub const UNLOAD_MARGIN: u32 = 2;

pub const DEFAULT_WORKER_IDLE_BACKOFF_MS: u64 = 2;
