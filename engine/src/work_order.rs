use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::{
    error::WorkOrderError,
    mesh_generation::{
        chunk_geometry::ChunkGeometry,
        mesher::{generate_boundary_geometry, generate_interior_geometry},
    },
    voxels::{
        chunk_data::{ChunkData, SharedChunkData},
        coord::ChunkPos,
        face::Face,
    },
    worldgen::{WorldGenerator, generate_with_overlay},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOrderKind {
    GenerateAndMesh,
    MeshFromExistingData,
    GenerateWithAdditiveOverlay,
    GenerateBoundaryFaces,
}

/// Chunk data produced by a worker, handed over to the coordinator
pub struct ChunkResult {
    pub pos: ChunkPos,
    pub data: SharedChunkData,
    pub revision: u64,
}

/// A geometry batch for one chunk, tagged with the data revisions it was built from
pub struct GeometryResult {
    pub pos: ChunkPos,
    pub geometry: ChunkGeometry,
    pub revision: u64,
    /// Set for boundary batches: the neighbor across the seam and its revision
    pub neighbor: Option<(ChunkPos, u64)>,
}

/// Queues a work order writes its results into. Cloning shares the queues.
#[derive(Clone, Default)]
pub struct OrderOutputs {
    pub chunks: Arc<SegQueue<ChunkResult>>,
    pub geometry: Arc<SegQueue<GeometryResult>>,
}

impl OrderOutputs {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A job for a chunk worker. Which handles must be present depends on `kind`.
pub struct WorkOrder {
    pub kind: WorkOrderKind,
    pub chunk_pos: ChunkPos,
    pub target: Option<SharedChunkData>,
    pub neighbor: Option<SharedChunkData>,
    pub direction: Option<Face>,
    pub revision: u64,
    pub neighbor_revision: u64,
    pub outputs: OrderOutputs,
}

impl WorkOrder {
    fn new(kind: WorkOrderKind, chunk_pos: ChunkPos, outputs: OrderOutputs) -> Self {
        WorkOrder {
            kind,
            chunk_pos,
            target: None,
            neighbor: None,
            direction: None,
            revision: 0,
            neighbor_revision: 0,
            outputs,
        }
    }

    pub fn generate_and_mesh(chunk_pos: ChunkPos, outputs: OrderOutputs) -> Self {
        Self::new(WorkOrderKind::GenerateAndMesh, chunk_pos, outputs)
    }

    pub fn mesh_existing(chunk_pos: ChunkPos, data: ChunkData, outputs: OrderOutputs) -> Self {
        WorkOrder {
            target: Some(data.share()),
            ..Self::new(WorkOrderKind::MeshFromExistingData, chunk_pos, outputs)
        }
    }

    pub fn additive_overlay(chunk_pos: ChunkPos, overlay: ChunkData, outputs: OrderOutputs) -> Self {
        WorkOrder {
            target: Some(overlay.share()),
            ..Self::new(WorkOrderKind::GenerateWithAdditiveOverlay, chunk_pos, outputs)
        }
    }

    /// Faces of `target` toward `neighbor`, which lies across `face`
    pub fn boundary_faces(
        chunk_pos: ChunkPos,
        face: Face,
        target: (SharedChunkData, u64),
        neighbor: (SharedChunkData, u64),
        outputs: OrderOutputs,
    ) -> Self {
        WorkOrder {
            target: Some(target.0),
            neighbor: Some(neighbor.0),
            direction: Some(face),
            revision: target.1,
            neighbor_revision: neighbor.1,
            ..Self::new(WorkOrderKind::GenerateBoundaryFaces, chunk_pos, outputs)
        }
    }

    /// Tags the order's results with the data revision the coordinator expects
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    fn require<T>(&self, handle: Option<T>, name: &'static str) -> Result<T, WorkOrderError> {
        handle.ok_or(WorkOrderError::MissingHandle {
            kind: self.kind,
            chunk: self.chunk_pos,
            handle: name,
        })
    }

    pub fn validate(&self) -> Result<(), WorkOrderError> {
        match self.kind {
            WorkOrderKind::GenerateAndMesh => {}
            WorkOrderKind::MeshFromExistingData | WorkOrderKind::GenerateWithAdditiveOverlay => {
                self.require(self.target.as_ref(), "target data")?;
            }
            WorkOrderKind::GenerateBoundaryFaces => {
                self.require(self.target.as_ref(), "target data")?;
                self.require(self.neighbor.as_ref(), "neighbor data")?;
                self.require(self.direction, "direction")?;
            }
        }
        Ok(())
    }

    #[profiling::function]
    pub fn execute(self, generator: &dyn WorldGenerator) -> Result<(), WorkOrderError> {
        self.validate()?;

        match self.kind {
            WorkOrderKind::GenerateAndMesh => {
                let data = generator.generate_chunk(self.chunk_pos);
                self.emit_loaded(data.share());
            }
            WorkOrderKind::GenerateWithAdditiveOverlay => {
                let overlay = self.require(self.target.clone(), "target data")?;
                let data = generate_with_overlay(generator, self.chunk_pos, &overlay.read().unwrap());
                self.emit_loaded(data.share());
            }
            WorkOrderKind::MeshFromExistingData => {
                let data = self.require(self.target.clone(), "target data")?;
                self.emit_loaded(data);
            }
            WorkOrderKind::GenerateBoundaryFaces => {
                let target = self.require(self.target.as_ref(), "target data")?;
                let neighbor = self.require(self.neighbor.as_ref(), "neighbor data")?;
                let face = self.require(self.direction, "direction")?;

                let geometry = {
                    let target = target.read().unwrap();
                    let neighbor = neighbor.read().unwrap();
                    generate_boundary_geometry(&target, &neighbor, face)
                };

                self.outputs.geometry.push(GeometryResult {
                    pos: self.chunk_pos,
                    geometry,
                    revision: self.revision,
                    neighbor: Some((self.chunk_pos.neighbor(face), self.neighbor_revision)),
                });
            }
        }

        Ok(())
    }

    // Data goes out before its geometry so the coordinator sees the chunk first
    fn emit_loaded(&self, data: SharedChunkData) {
        let geometry = generate_interior_geometry(&data.read().unwrap());

        self.outputs.chunks.push(ChunkResult {
            pos: self.chunk_pos,
            data,
            revision: self.revision,
        });
        self.outputs.geometry.push(GeometryResult {
            pos: self.chunk_pos,
            geometry,
            revision: self.revision,
            neighbor: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        limits::CHUNK_AREA,
        mesh_generation::chunk_geometry::GeometryScope,
        voxels::{
            coord::{LocalPos, WorldPos},
            voxel::Voxel,
        },
        worldgen::{FnGenerator, test_world_generators::FilledWorldGenerator},
    };

    fn pop_all(outputs: &OrderOutputs) -> (Vec<ChunkResult>, Vec<GeometryResult>) {
        let mut chunks = Vec::new();
        let mut geometry = Vec::new();
        while let Some(result) = outputs.chunks.pop() {
            chunks.push(result);
        }
        while let Some(result) = outputs.geometry.pop() {
            geometry.push(result);
        }
        (chunks, geometry)
    }

    #[test]
    fn test_generate_and_mesh_emits_data_and_interior() {
        let outputs = OrderOutputs::new();
        let pos = ChunkPos::new(1, 2, 3);
        WorkOrder::generate_and_mesh(pos, outputs.clone())
            .with_revision(5)
            .execute(&FilledWorldGenerator(Voxel::STONE))
            .unwrap();

        let (chunks, geometry) = pop_all(&outputs);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].pos, pos);
        assert_eq!(chunks[0].revision, 5);
        assert_eq!(geometry[0].revision, 5);
        assert_eq!(chunks[0].data.read().unwrap().uniform_voxel(), Some(Voxel::STONE));
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].geometry.scope, GeometryScope::Interior);
        assert!(geometry[0].geometry.is_empty());
        assert!(geometry[0].neighbor.is_none());
    }

    #[test]
    fn test_additive_overlay_replays_generator() {
        let outputs = OrderOutputs::new();
        let mut overlay = ChunkData::new_additive();
        overlay.set(LocalPos::new(0, 0, 0), Voxel::STONE);

        WorkOrder::additive_overlay(ChunkPos::new(0, 0, 0), overlay, outputs.clone())
            .execute(&FnGenerator(|_: WorldPos| Voxel::WATER))
            .unwrap();

        let (chunks, geometry) = pop_all(&outputs);
        let data = chunks[0].data.read().unwrap();
        assert!(!data.is_additive());
        assert_eq!(data.get(LocalPos::new(0, 0, 0)), Voxel::STONE);
        assert_eq!(data.get(LocalPos::new(0, 0, 1)), Voxel::WATER);
        // Stone in a corner of water shows its three inward faces
        assert_eq!(geometry[0].geometry.len(), 3);
    }

    #[test]
    fn test_mesh_existing_passes_data_through() {
        let outputs = OrderOutputs::new();
        let mut data = ChunkData::filled(Voxel::AIR);
        data.set(LocalPos::new(9, 9, 9), Voxel::DIRT);

        WorkOrder::mesh_existing(ChunkPos::new(0, 0, 0), data, outputs.clone())
            .execute(&FilledWorldGenerator(Voxel::STONE))
            .unwrap();

        let (chunks, geometry) = pop_all(&outputs);
        assert_eq!(
            chunks[0].data.read().unwrap().get(LocalPos::new(9, 9, 9)),
            Voxel::DIRT
        );
        assert_eq!(geometry[0].geometry.len(), 6);
    }

    #[test]
    fn test_boundary_order_emits_geometry_only() {
        let outputs = OrderOutputs::new();
        let stone = ChunkData::filled(Voxel::STONE).share();
        let air = ChunkData::filled(Voxel::AIR).share();
        let pos = ChunkPos::new(0, 0, 0);

        WorkOrder::boundary_faces(pos, Face::PosY, (stone, 3), (air, 7), outputs.clone())
            .execute(&FilledWorldGenerator(Voxel::STONE))
            .unwrap();

        let (chunks, geometry) = pop_all(&outputs);
        assert!(chunks.is_empty());
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].geometry.len(), CHUNK_AREA);
        assert_eq!(geometry[0].geometry.direction_index(), 1);
        assert_eq!(geometry[0].revision, 3);
        assert_eq!(geometry[0].neighbor, Some((ChunkPos::new(0, 1, 0), 7)));
    }

    #[test]
    fn test_malformed_order_is_rejected() {
        let outputs = OrderOutputs::new();
        let mut order = WorkOrder::boundary_faces(
            ChunkPos::new(0, 0, 0),
            Face::PosX,
            (ChunkData::default().share(), 0),
            (ChunkData::default().share(), 0),
            outputs.clone(),
        );
        order.neighbor = None;

        let err = order.validate().unwrap_err();
        assert!(matches!(
            err,
            WorkOrderError::MissingHandle {
                kind: WorkOrderKind::GenerateBoundaryFaces,
                handle: "neighbor data",
                ..
            }
        ));
        assert!(order.execute(&FilledWorldGenerator(Voxel::AIR)).is_err());
        assert!(outputs.geometry.is_empty());
    }
}
