use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use ahash::AHashMap;
use dashmap::DashMap;
use glam::Vec3;
use log::{debug, error, info, trace, warn};

use crate::{
    chunk_worker::{ChunkWorkerHandle, ViewerPositions, distance_to_nearest_viewer},
    config::streamer_config::{StreamerConfig, WorkerMode},
    error::{RegionError, WorldError},
    limits::UNLOAD_MARGIN,
    mesh_generation::{
        chunk_geometry::{ChunkSurface, FaceKey, GeometryScope},
        mesh_sections::{MeshSection, build_mesh_sections},
        mesher::{face_owner, generate_boundary_geometry, generate_interior_geometry},
    },
    regions::{persistence::RegionPersistence, region_store::RegionStore},
    transfer,
    view_shells::ViewShells,
    voxels::{
        chunk_data::{ChunkData, SharedChunkData},
        coord::{ChunkPos, LocalPos, WorldPos},
        face::Face,
        registry::VoxelRegistry,
        voxel::Voxel,
    },
    work_order::{ChunkResult, GeometryResult, OrderOutputs, WorkOrder},
    world_stats::{ChunksByState, WorldStatistics},
    worldgen::WorldGenerator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub u32);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Work order issued, data not yet materialized
    Loading = 0,
    Loaded = 1,
    /// Being removed during the current tick
    Unloading = 2,
}

impl ChunkState {
    pub const TOTAL_STATES: usize = 3;
}

/// A materialized chunk. Present in the arena exactly while its state is `Loaded`.
pub struct LoadedChunk {
    pub data: SharedChunkData,
    pub surface: ChunkSurface,
    /// Changes on every edit, and is unique across load cycles of the same position
    pub revision: u64,
    pub dirty: bool,
}

pub type WorldChunks = Arc<DashMap<ChunkPos, LoadedChunk>>;

/// Cloneable read access to loaded chunks, usable from any thread
#[derive(Clone)]
pub struct WorldView {
    chunks: WorldChunks,
}

impl WorldView {
    pub fn get_voxel(&self, pos: WorldPos) -> Option<Voxel> {
        self.chunks
            .get(&pos.to_chunk_pos())
            .map(|chunk| chunk.data.read().unwrap().get(pos.to_local_pos()))
    }

    pub fn is_loaded(&self, chunk: ChunkPos) -> bool {
        self.chunks.contains_key(&chunk)
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Notifications for the rendering side, in the order things happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamerEvent {
    ChunkLoaded(ChunkPos),
    GeometryChanged(ChunkPos),
    ChunkUnloaded(ChunkPos),
}

enum Workers {
    PerViewer(AHashMap<ViewerId, ChunkWorkerHandle>),
    Pool {
        handles: Vec<ChunkWorkerHandle>,
        next: usize,
    },
}

impl Workers {
    fn all_mut(&mut self) -> Box<dyn Iterator<Item = &mut ChunkWorkerHandle> + '_> {
        match self {
            Workers::PerViewer(handles) => Box::new(handles.values_mut()),
            Workers::Pool { handles, .. } => Box::new(handles.iter_mut()),
        }
    }
}

/// Drives chunks through Loading, Loaded and Unloading around a set of viewers.
/// Lives on one coordinating thread; generation and meshing happen on worker threads.
pub struct WorldStreamer {
    config: StreamerConfig,
    shells: ViewShells,
    generator: Arc<dyn WorldGenerator>,
    regions: RegionStore,
    chunk_states: AHashMap<ChunkPos, ChunkState>,
    chunks: WorldChunks,
    viewers: BTreeMap<ViewerId, ChunkPos>,
    viewer_positions: ViewerPositions,
    next_viewer_id: u32,
    workers: Workers,
    outputs: OrderOutputs,
    // Orders created while no worker was available
    backlog: Vec<WorkOrder>,
    deferred_geometry: Vec<GeometryResult>,
    events: Vec<StreamerEvent>,
    counts: Arc<ChunksByState>,
    revision_counter: u64,
    is_shut_down: bool,
}

impl WorldStreamer {
    pub fn new(
        config: StreamerConfig,
        generator: Arc<dyn WorldGenerator>,
        persistence: Box<dyn RegionPersistence>,
    ) -> Result<Self, WorldError> {
        let registry = VoxelRegistry::with_definitions(&config.voxel_types)?;
        let shells = ViewShells::new(config.view_distance, config.vertical_view_distance);
        let viewer_positions = ViewerPositions::default();

        let workers = match config.worker_mode {
            WorkerMode::PerViewer => Workers::PerViewer(AHashMap::new()),
            WorkerMode::Pool(count) => {
                let handles = (0..count.max(1))
                    .map(|index| {
                        ChunkWorkerHandle::spawn(
                            format!("Chunk worker {}", index),
                            generator.clone(),
                            viewer_positions.clone(),
                            config.worker_idle_backoff(),
                        )
                    })
                    .collect::<std::io::Result<Vec<_>>>()
                    .map_err(WorldError::Spawn)?;
                Workers::Pool { handles, next: 0 }
            }
        };

        info!(
            "World streamer started: view distance {}, vertical limit {}, {} chunks per viewer, {:?}",
            config.view_distance,
            config.vertical_view_distance,
            shells.chunk_count(),
            config.worker_mode
        );

        Ok(WorldStreamer {
            regions: RegionStore::new(persistence, registry),
            config,
            shells,
            generator,
            chunk_states: AHashMap::new(),
            chunks: WorldChunks::default(),
            viewers: BTreeMap::new(),
            viewer_positions,
            next_viewer_id: 0,
            workers,
            outputs: OrderOutputs::new(),
            backlog: Vec::new(),
            deferred_geometry: Vec::new(),
            events: Vec::new(),
            counts: Arc::new(ChunksByState::default()),
            revision_counter: 0,
            is_shut_down: false,
        })
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn registry(&self) -> &VoxelRegistry {
        self.regions.registry()
    }

    pub fn world_view(&self) -> WorldView {
        WorldView {
            chunks: self.chunks.clone(),
        }
    }

    pub fn chunk_counts(&self) -> Arc<ChunksByState> {
        self.counts.clone()
    }

    fn ensure_running(&self) -> Result<(), WorldError> {
        if self.is_shut_down {
            Err(WorldError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn next_revision(&mut self) -> u64 {
        self.revision_counter += 1;
        self.revision_counter
    }

    fn set_state(&mut self, pos: ChunkPos, state: ChunkState) {
        match self.chunk_states.insert(pos, state) {
            Some(previous) => self.counts.transition(previous, state),
            None => self.counts.increment(state),
        }
    }

    fn clear_state(&mut self, pos: ChunkPos) {
        if let Some(previous) = self.chunk_states.remove(&pos) {
            self.counts.decrement(previous);
        }
    }

    // Viewers

    pub fn add_viewer(&mut self, position: WorldPos) -> Result<ViewerId, WorldError> {
        self.ensure_running()?;

        let id = ViewerId(self.next_viewer_id);
        self.next_viewer_id += 1;

        if let Workers::PerViewer(handles) = &mut self.workers {
            let handle = ChunkWorkerHandle::spawn(
                format!("Chunk worker {}", id.0),
                self.generator.clone(),
                self.viewer_positions.clone(),
                self.config.worker_idle_backoff(),
            )
            .map_err(WorldError::Spawn)?;
            handles.insert(id, handle);
        }

        self.viewers.insert(id, position.to_chunk_pos());
        self.publish_viewer_positions();

        info!("Added viewer {} at chunk {:?}", id.0, position.to_chunk_pos());
        Ok(id)
    }

    pub fn update_viewer(&mut self, id: ViewerId, position: WorldPos) -> Result<(), WorldError> {
        self.ensure_running()?;

        let chunk = self
            .viewers
            .get_mut(&id)
            .ok_or(WorldError::UnknownViewer(id))?;
        *chunk = position.to_chunk_pos();
        Ok(())
    }

    /// Moves a viewer to a fractional voxel-space position
    pub fn update_viewer_f(&mut self, id: ViewerId, position: Vec3) -> Result<(), WorldError> {
        self.update_viewer(id, WorldPos(position.floor().as_ivec3()))
    }

    /// Stops tracking a viewer. In per-viewer mode its worker finishes its queue and exits.
    pub fn remove_viewer(&mut self, id: ViewerId) -> Result<(), WorldError> {
        self.viewers
            .remove(&id)
            .ok_or(WorldError::UnknownViewer(id))?;

        if let Workers::PerViewer(handles) = &mut self.workers {
            if let Some(mut handle) = handles.remove(&id) {
                handle.join();
            }
        }

        self.publish_viewer_positions();
        info!("Removed viewer {}", id.0);
        Ok(())
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    fn publish_viewer_positions(&self) {
        *self.viewer_positions.lock().unwrap() =
            self.viewers.iter().map(|(id, pos)| (*id, *pos)).collect();
    }

    fn viewer_chunks(&self) -> Vec<ChunkPos> {
        self.viewers.values().copied().collect()
    }

    fn nearest_viewer(&self, chunk: ChunkPos) -> Option<ViewerId> {
        self.viewers
            .iter()
            .min_by_key(|(_, pos)| chunk.manhattan_distance(**pos))
            .map(|(id, _)| *id)
    }

    // Dispatch

    fn dispatch(&mut self, viewer: Option<ViewerId>, orders: Vec<WorkOrder>) {
        if orders.is_empty() {
            return;
        }

        match &mut self.workers {
            Workers::PerViewer(handles) => {
                let handle = viewer
                    .and_then(|id| handles.get(&id))
                    .or_else(|| handles.values().next());

                match handle {
                    Some(handle) => handle.submit_batch(orders),
                    None => self.backlog.extend(orders),
                }
            }
            Workers::Pool { handles, next } => {
                if handles.is_empty() {
                    self.backlog.extend(orders);
                    return;
                }

                for order in orders {
                    handles[*next].submit(order);
                    *next = (*next + 1) % handles.len();
                }
            }
        }
    }

    fn dispatch_backlog(&mut self) {
        if self.backlog.is_empty() {
            return;
        }

        let backlog = std::mem::take(&mut self.backlog);
        let viewer = self.viewers.keys().next().copied();
        self.dispatch(viewer, backlog);
    }

    // Ticking

    /// Advances the streamer by one step: requests chunks around every viewer, applies
    /// finished work, and unloads chunks no viewer can see anymore.
    #[profiling::function]
    pub fn tick(&mut self) -> Result<(), WorldError> {
        self.ensure_running()?;
        self.ensure_workers_alive()?;

        self.publish_viewer_positions();
        self.dispatch_backlog();
        self.request_missing_chunks();
        self.drain_chunk_results();
        self.drain_geometry_results();
        self.unload_distant_chunks();

        if self.config.autosave && self.regions.has_dirty() {
            if let Err(err) = self.regions.flush() {
                error!("Autosave failed: {}", err);
            }
        }

        Ok(())
    }

    /// A worker only exits early when an order panicked. Its queue would never drain again.
    fn ensure_workers_alive(&mut self) -> Result<(), WorldError> {
        let dead = self
            .workers
            .all_mut()
            .find(|worker| !worker.is_alive())
            .map(|worker| worker.name().to_string());

        match dead {
            Some(name) => {
                error!("Chunk worker {} exited while the streamer is running", name);
                Err(WorldError::WorkerDied(name))
            }
            None => Ok(()),
        }
    }

    fn request_missing_chunks(&mut self) {
        let viewers: Vec<(ViewerId, ChunkPos)> =
            self.viewers.iter().map(|(id, pos)| (*id, *pos)).collect();

        for (viewer, center) in viewers {
            let missing: Vec<ChunkPos> = self
                .shells
                .iter_around(center)
                .filter(|pos| !self.chunk_states.contains_key(pos))
                .collect();

            if missing.is_empty() {
                continue;
            }

            let mut orders = Vec::with_capacity(missing.len());
            for pos in missing {
                orders.push(self.create_load_order(pos));
                self.set_state(pos, ChunkState::Loading);
            }

            trace!("Requesting {} chunks for viewer {}", orders.len(), viewer.0);
            self.dispatch(Some(viewer), orders);
        }
    }

    fn create_load_order(&mut self, pos: ChunkPos) -> WorkOrder {
        let saved = match self.regions.saved_chunk(pos) {
            Ok(saved) => saved,
            Err(err) => {
                warn!("Ignoring saved data for chunk {:?}: {}", pos, err);
                None
            }
        };

        let outputs = self.outputs.clone();
        let order = match saved {
            None => WorkOrder::generate_and_mesh(pos, outputs),
            Some(data) if data.is_additive() => WorkOrder::additive_overlay(pos, data, outputs),
            Some(data) => WorkOrder::mesh_existing(pos, data, outputs),
        };

        order.with_revision(self.next_revision())
    }

    #[profiling::function]
    fn drain_chunk_results(&mut self) {
        let mut results = Vec::new();
        while let Some(result) = self.outputs.chunks.pop() {
            results.push(result);
        }

        if results.is_empty() {
            return;
        }

        let viewers = self.viewer_chunks();
        results.sort_by_cached_key(|result| distance_to_nearest_viewer(result.pos, &viewers));

        for result in results {
            self.materialize(result);
        }
    }

    fn materialize(&mut self, result: ChunkResult) {
        let pos = result.pos;
        if self.chunk_states.get(&pos) != Some(&ChunkState::Loading) {
            warn!(
                "Dropping chunk data for {:?} in state {:?}",
                pos,
                self.chunk_states.get(&pos)
            );
            return;
        }

        self.chunks.insert(
            pos,
            LoadedChunk {
                data: result.data.clone(),
                surface: ChunkSurface::default(),
                revision: result.revision,
                dirty: false,
            },
        );
        self.set_state(pos, ChunkState::Loaded);
        self.events.push(StreamerEvent::ChunkLoaded(pos));
        debug!("Chunk {:?} loaded", pos);

        // Stitch every seam with an already loaded neighbor, from both sides
        let mut orders = Vec::new();
        for face in Face::all() {
            let neighbor_pos = pos.neighbor(face);
            if self.chunk_states.get(&neighbor_pos) != Some(&ChunkState::Loaded) {
                continue;
            }

            let Some(neighbor) = self
                .chunks
                .get(&neighbor_pos)
                .map(|chunk| (chunk.data.clone(), chunk.revision))
            else {
                error!("Chunk {:?} is marked loaded but has no data", neighbor_pos);
                continue;
            };

            let this = (result.data.clone(), result.revision);
            orders.push(WorkOrder::boundary_faces(
                pos,
                face,
                this.clone(),
                neighbor.clone(),
                self.outputs.clone(),
            ));
            orders.push(WorkOrder::boundary_faces(
                neighbor_pos,
                face.opposite(),
                neighbor,
                this,
                self.outputs.clone(),
            ));
        }

        let viewer = self.nearest_viewer(pos);
        self.dispatch(viewer, orders);
    }

    #[profiling::function]
    fn drain_geometry_results(&mut self) {
        let mut pending = std::mem::take(&mut self.deferred_geometry);
        while let Some(result) = self.outputs.geometry.pop() {
            pending.push(result);
        }

        for result in pending {
            match self.chunk_states.get(&result.pos) {
                Some(ChunkState::Loading) => {
                    trace!("Deferring geometry for loading chunk {:?}", result.pos);
                    self.deferred_geometry.push(result);
                }
                Some(ChunkState::Loaded) => self.apply_geometry(result),
                _ => trace!("Discarding geometry for unloaded chunk {:?}", result.pos),
            }
        }
    }

    /// Installs a geometry batch. Batches built from data that has changed since are rebuilt here.
    fn apply_geometry(&mut self, result: GeometryResult) {
        let pos = result.pos;
        let Some((data, revision)) = self
            .chunks
            .get(&pos)
            .map(|chunk| (chunk.data.clone(), chunk.revision))
        else {
            error!("Chunk {:?} is marked loaded but has no data", pos);
            return;
        };

        let geometry = match (result.geometry.scope, result.neighbor) {
            (GeometryScope::Interior, _) => {
                if result.revision == revision {
                    result.geometry
                } else {
                    trace!("Rebuilding stale interior geometry of {:?}", pos);
                    generate_interior_geometry(&data.read().unwrap())
                }
            }
            (GeometryScope::Side(face), Some((neighbor_pos, neighbor_revision))) => {
                let Some((neighbor_data, current_neighbor_revision)) = self
                    .chunks
                    .get(&neighbor_pos)
                    .map(|chunk| (chunk.data.clone(), chunk.revision))
                else {
                    trace!("Neighbor {:?} of {:?} unloaded before stitching", neighbor_pos, pos);
                    return;
                };

                if result.revision == revision && neighbor_revision == current_neighbor_revision {
                    result.geometry
                } else {
                    trace!("Rebuilding stale {:?} side of {:?}", face, pos);
                    let target = data.read().unwrap();
                    let neighbor = neighbor_data.read().unwrap();
                    generate_boundary_geometry(&target, &neighbor, face)
                }
            }
            (GeometryScope::Side(face), None) => {
                error!("{:?} side geometry of {:?} names no neighbor", face, pos);
                return;
            }
        };

        if let Some(mut chunk) = self.chunks.get_mut(&pos) {
            chunk.surface.apply(geometry);
        }
        self.events.push(StreamerEvent::GeometryChanged(pos));
    }

    /// A chunk unloads once every viewer has voted it out of range; with no viewers left everything goes
    #[profiling::function]
    fn unload_distant_chunks(&mut self) {
        let limit = self.config.view_distance + UNLOAD_MARGIN;
        let viewers = self.viewer_chunks();

        let mut distant: Vec<ChunkPos> = self
            .chunk_states
            .iter()
            .filter(|(_, state)| **state == ChunkState::Loaded)
            .map(|(pos, _)| *pos)
            .filter(|pos| {
                let votes = viewers
                    .iter()
                    .filter(|viewer| pos.manhattan_distance(**viewer) > limit)
                    .count();
                votes == viewers.len()
            })
            .collect();

        if distant.is_empty() {
            return;
        }

        distant.sort_unstable_by_key(|pos| pos.to_array());
        debug!("Unloading {} chunks", distant.len());

        for pos in distant {
            self.unload_chunk(pos);
        }
    }

    fn unload_chunk(&mut self, pos: ChunkPos) {
        self.set_state(pos, ChunkState::Unloading);

        match self.chunks.remove(&pos) {
            Some((_, chunk)) if chunk.dirty => {
                let data = chunk.data.read().unwrap().clone();
                if let Err(err) = self.regions.set_chunk(pos, data) {
                    error!("Edits to chunk {:?} could not be stored and are lost: {}", pos, err);
                }
            }
            Some(_) => {}
            None => error!("Chunk {:?} is marked loaded but has no data", pos),
        }

        self.clear_state(pos);

        // Neighbors lose their seam with this chunk until it loads again
        for face in Face::all() {
            let neighbor_pos = pos.neighbor(face);
            let unstitched = self
                .chunks
                .get_mut(&neighbor_pos)
                .is_some_and(|mut chunk| chunk.surface.clear_side(face.opposite()));
            if unstitched {
                self.events.push(StreamerEvent::GeometryChanged(neighbor_pos));
            }
        }

        self.events.push(StreamerEvent::ChunkUnloaded(pos));
    }

    // Queries

    pub fn chunk_state(&self, pos: ChunkPos) -> Option<ChunkState> {
        self.chunk_states.get(&pos).copied()
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunk_state(pos) == Some(ChunkState::Loaded)
    }

    /// A copy of a loaded chunk's voxels
    pub fn chunk_data(&self, pos: ChunkPos) -> Option<ChunkData> {
        self.chunks
            .get(&pos)
            .map(|chunk| chunk.data.read().unwrap().clone())
    }

    /// A copy of a loaded chunk's current faces
    pub fn chunk_surface(&self, pos: ChunkPos) -> Option<ChunkSurface> {
        self.chunks.get(&pos).map(|chunk| chunk.surface.clone())
    }

    pub fn mesh_sections(&self, pos: ChunkPos, voxel_size: f32) -> Option<Vec<MeshSection>> {
        self.chunks
            .get(&pos)
            .map(|chunk| build_mesh_sections(chunk.surface.faces(), voxel_size))
    }

    pub fn drain_events(&mut self) -> Vec<StreamerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn statistics(&self) -> WorldStatistics {
        let approximate_memory_usage_bytes: usize = self
            .chunks
            .iter()
            .map(|chunk| chunk.data.read().unwrap().approximate_size())
            .sum();

        WorldStatistics {
            viewers: self.viewers.len(),
            total_chunks: self.chunk_states.len(),
            loading: self.counts.get(ChunkState::Loading),
            loaded: self.counts.get(ChunkState::Loaded),
            approximate_memory_usage_bytes,
            deferred_geometry: self.deferred_geometry.len(),
            dirty_regions: self.regions.dirty_count(),
        }
    }

    // Editing

    /// Voxel at a world position, if its chunk is loaded
    pub fn get_block(&self, pos: WorldPos) -> Option<Voxel> {
        self.voxel_at(pos.to_chunk_pos(), pos.to_local_pos())
    }

    /// Places a voxel. Loaded chunks are edited and re-meshed around the cell, unloaded chunks
    /// record the edit in their region. Chunks still loading reject the edit.
    pub fn set_block(&mut self, pos: WorldPos, voxel: Voxel) -> Result<(), WorldError> {
        self.ensure_running()?;

        let chunk_pos = pos.to_chunk_pos();
        let local = pos.to_local_pos();

        match self.chunk_state(chunk_pos) {
            Some(ChunkState::Loading) => Err(WorldError::ChunkBusy(chunk_pos)),
            Some(ChunkState::Loaded) => {
                if !self.edit_loaded(chunk_pos, local, voxel) {
                    error!("Chunk {:?} is marked loaded but has no data", chunk_pos);
                    self.regions.apply_unloaded_edit(chunk_pos, local, voxel)?;
                }
                Ok(())
            }
            Some(ChunkState::Unloading) | None => {
                self.regions.apply_unloaded_edit(chunk_pos, local, voxel)?;
                Ok(())
            }
        }
    }

    pub fn destroy_block(&mut self, pos: WorldPos) -> Result<(), WorldError> {
        self.set_block(pos, Voxel::AIR)
    }

    fn voxel_at(&self, chunk: ChunkPos, local: LocalPos) -> Option<Voxel> {
        self.chunks
            .get(&chunk)
            .map(|chunk| chunk.data.read().unwrap().get(local))
    }

    fn edit_loaded(&mut self, chunk_pos: ChunkPos, local: LocalPos, voxel: Voxel) -> bool {
        let revision = self.next_revision();
        {
            let Some(mut chunk) = self.chunks.get_mut(&chunk_pos) else {
                return false;
            };

            let mut data = chunk.data.write().unwrap();
            if data.get(local) == voxel {
                return true;
            }
            data.set(local, voxel);
            drop(data);

            chunk.revision = revision;
            chunk.dirty = true;
        }

        self.refresh_faces_around(chunk_pos, local);
        true
    }

    /// Recomputes the faces of an edited cell and the facing sides of its six neighbors
    fn refresh_faces_around(&mut self, chunk_pos: ChunkPos, local: LocalPos) {
        let Some(voxel) = self.voxel_at(chunk_pos, local) else {
            return;
        };

        let mut updates = Vec::with_capacity(Face::COUNT * 2);
        for face in Face::all() {
            let (neighbor_chunk, neighbor_local) = match local.offset(face) {
                Some(inner) => (chunk_pos, inner),
                None => (chunk_pos.neighbor(face), local.across_boundary(face)),
            };

            let Some(neighbor) = self.voxel_at(neighbor_chunk, neighbor_local) else {
                continue;
            };

            updates.push((chunk_pos, FaceKey::new(local, face), face_owner(voxel, neighbor)));
            updates.push((
                neighbor_chunk,
                FaceKey::new(neighbor_local, face.opposite()),
                face_owner(neighbor, voxel),
            ));
        }

        let mut changed = BTreeSet::new();
        for (pos, key, owner) in updates {
            if let Some(mut chunk) = self.chunks.get_mut(&pos) {
                if chunk.surface.set_face(key, owner) {
                    changed.insert(pos.to_array());
                }
            }
        }

        for pos in changed {
            self.events
                .push(StreamerEvent::GeometryChanged(ChunkPos::new(pos[0], pos[1], pos[2])));
        }
    }

    // Persistence

    /// Stores every edited loaded chunk into its region, then writes all dirty regions.
    /// Returns the number of regions written.
    pub fn save_world(&mut self) -> Result<usize, WorldError> {
        let dirty: Vec<(ChunkPos, SharedChunkData)> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.dirty)
            .map(|chunk| (*chunk.key(), chunk.data.clone()))
            .collect();

        let mut first_error: Option<RegionError> = None;
        for (pos, data) in dirty {
            let snapshot = data.read().unwrap().clone();
            match self.regions.set_chunk(pos, snapshot) {
                Ok(()) => {
                    if let Some(mut chunk) = self.chunks.get_mut(&pos) {
                        chunk.dirty = false;
                    }
                }
                Err(err) => {
                    error!("Failed to store chunk {:?}: {}", pos, err);
                    first_error.get_or_insert(err);
                }
            }
        }

        let written = self.regions.flush()?;
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(written),
        }
    }

    /// Saves, then packs every saved region into one archive for transfer
    pub fn export_world(&mut self) -> Result<Vec<u8>, WorldError> {
        self.save_world()?;
        Ok(transfer::export_world(self.regions.persistence())?)
    }

    // Shutdown

    /// Stops and joins every worker, then discards whatever they produced. Idempotent.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;

        for worker in self.workers.all_mut() {
            worker.request_shutdown();
        }
        for worker in self.workers.all_mut() {
            worker.join();
        }

        let mut discarded = 0;
        while self.outputs.chunks.pop().is_some() {
            discarded += 1;
        }
        while self.outputs.geometry.pop().is_some() {
            discarded += 1;
        }
        discarded += self.backlog.len() + self.deferred_geometry.len();
        self.backlog.clear();
        self.deferred_geometry.clear();

        info!("World streamer shut down, discarded {} pending results", discarded);
    }
}

impl Drop for WorldStreamer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
