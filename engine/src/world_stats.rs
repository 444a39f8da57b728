use std::sync::atomic::{AtomicU32, Ordering};

use crate::world_streamer::ChunkState;

/// Chunk counts per state. Shared with observers outside the coordinator thread.
#[derive(Debug, Default)]
pub struct ChunksByState([AtomicU32; ChunkState::TOTAL_STATES]);

impl ChunksByState {
    pub fn increment(&self, state: ChunkState) {
        self.0[state as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self, state: ChunkState) {
        self.0[state as usize].fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self, state: ChunkState) -> u32 {
        self.0[state as usize].load(Ordering::Relaxed)
    }

    pub fn transition(&self, from: ChunkState, to: ChunkState) {
        self.decrement(from);
        self.increment(to);
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|count| count.load(Ordering::Relaxed)).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldStatistics {
    pub viewers: usize,
    pub total_chunks: usize,
    pub loading: u32,
    pub loaded: u32,
    pub approximate_memory_usage_bytes: usize,
    /// Geometry batches waiting for their chunk to finish loading
    pub deferred_geometry: usize,
    pub dirty_regions: usize,
}
