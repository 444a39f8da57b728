use std::path::PathBuf;

use thiserror::Error;

use crate::{
    voxels::coord::{ChunkPos, RegionPos},
    work_order::WorkOrderKind,
    world_streamer::ViewerId,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("voxel registry is full")]
    Full,
    #[error("voxel type {name:?} is already registered with different flags")]
    Conflict { name: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse world index")]
    ParseIndex(#[from] ron::error::SpannedError),
    #[error("failed to serialize world index")]
    SerializeIndex(#[from] ron::Error),
}

/// Reasons a region blob cannot be turned back into chunks
#[derive(Debug, Error)]
pub enum RegionFormatError {
    #[error("region blob is truncated")]
    Truncated,
    #[error("region blob has an invalid magic number")]
    InvalidMagic,
    #[error("unsupported region format version {0}")]
    UnsupportedVersion(u8),
    #[error("region body could not be decoded")]
    Malformed(#[from] bincode::Error),
    #[error("{0}")]
    Invalid(String),
}

impl RegionFormatError {
    /// Unreadable blobs are treated as absent; only structurally valid but
    /// inconsistent data counts as corruption.
    pub fn is_unreadable(&self) -> bool {
        !matches!(self, RegionFormatError::Invalid(_))
    }
}

#[derive(Debug, Error)]
pub enum RegionError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("region {region} is corrupt: {reason}")]
    Corrupt { region: RegionPos, reason: String },
    #[error("voxel type {0} has no registry entry and cannot be saved")]
    UnknownVoxelType(u16),
    #[error("failed to encode region {region}")]
    Encode {
        region: RegionPos,
        #[source]
        source: bincode::Error,
    },
}

#[derive(Debug, Error)]
pub enum WorkOrderError {
    #[error("{kind:?} order for chunk {chunk:?} is missing its {handle}")]
    MissingHandle {
        kind: WorkOrderKind,
        chunk: ChunkPos,
        handle: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("chunk {0:?} is still loading, retry the edit later")]
    ChunkBusy(ChunkPos),
    #[error("unknown viewer {0:?}")]
    UnknownViewer(ViewerId),
    #[error("streamer has been shut down")]
    ShutDown,
    #[error("chunk worker {0} stopped unexpectedly")]
    WorkerDied(String),
    #[error("failed to spawn chunk worker thread")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("world archive is truncated")]
    Truncated,
    #[error("world archive has an invalid magic number")]
    InvalidMagic,
    #[error("unsupported world archive version {0}")]
    UnsupportedVersion(u8),
    #[error("world archive could not be encoded or decoded")]
    Codec(#[from] bincode::Error),
    #[error("stream slice starts at {got}, expected {expected}")]
    SliceOutOfOrder { expected: usize, got: usize },
    #[error("stream slice overruns the announced stream length {end}")]
    SliceOverrun { end: usize },
    #[error("stream length changed from {expected} to {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
