use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use ahash::AHashMap;
use log::{debug, error, trace};

use crate::{
    voxels::coord::ChunkPos,
    work_order::WorkOrder,
    work_queue::WorkQueue,
    world_streamer::ViewerId,
    worldgen::WorldGenerator,
};

/// Chunk position of every tracked viewer. Written by the coordinator once per tick,
/// copied by workers before each batch.
pub type ViewerPositions = Arc<Mutex<AHashMap<ViewerId, ChunkPos>>>;

/// L1 distance from `chunk` to the closest viewer, 0 when nobody is watching
pub fn distance_to_nearest_viewer(chunk: ChunkPos, viewers: &[ChunkPos]) -> u32 {
    viewers
        .iter()
        .map(|viewer| chunk.manhattan_distance(*viewer))
        .min()
        .unwrap_or(0)
}

/// Owning handle of a worker thread. Dropping the handle shuts the worker down and joins it.
pub struct ChunkWorkerHandle {
    name: String,
    queue: Arc<WorkQueue>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ChunkWorkerHandle {
    pub fn spawn(
        name: impl Into<String>,
        generator: Arc<dyn WorldGenerator>,
        viewers: ViewerPositions,
        idle_backoff: Duration,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let queue = Arc::new(WorkQueue::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut worker = ChunkWorker {
            queue: queue.clone(),
            shutdown: shutdown.clone(),
            generator,
            viewers,
            idle_backoff,
            buffer: Vec::new(),
        };

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run())?;

        Ok(ChunkWorkerHandle {
            name,
            queue,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn submit(&self, order: WorkOrder) {
        self.queue.push(order);
    }

    pub fn submit_batch(&self, orders: impl IntoIterator<Item = WorkOrder>) {
        self.queue.push_batch(orders);
    }

    /// Orders queued but not yet picked up by the worker
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// False once the thread has exited, either after a shutdown or because an order panicked
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.queue.notify();
    }

    /// Requests shutdown and waits until the worker has executed everything queued before the request
    pub fn join(&mut self) {
        self.request_shutdown();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Chunk worker {} panicked", self.name);
            }
        }
    }
}

impl Drop for ChunkWorkerHandle {
    fn drop(&mut self) {
        self.join();
    }
}

struct ChunkWorker {
    queue: Arc<WorkQueue>,
    shutdown: Arc<AtomicBool>,
    generator: Arc<dyn WorldGenerator>,
    viewers: ViewerPositions,
    idle_backoff: Duration,
    buffer: Vec<WorkOrder>,
}

impl ChunkWorker {
    fn run(&mut self) {
        debug!("Chunk worker started");

        loop {
            // Read the flag before draining: anything queued before shutdown was requested
            // is picked up by this drain.
            let stopping = self.shutdown.load(Ordering::Acquire);

            self.queue.drain_into(&mut self.buffer);
            if !self.buffer.is_empty() {
                self.process_batch();
            }

            if stopping {
                break;
            }

            if self.queue.is_empty() {
                self.queue.wait_for_work(self.idle_backoff);
            }
        }

        debug!("Chunk worker stopped");
    }

    #[profiling::function]
    fn process_batch(&mut self) {
        let viewers: Vec<ChunkPos> = self.viewers.lock().unwrap().values().copied().collect();

        let mut batch = std::mem::take(&mut self.buffer);
        batch.sort_by_cached_key(|order| distance_to_nearest_viewer(order.chunk_pos, &viewers));

        trace!("Executing batch of {} work orders", batch.len());

        for order in batch.drain(..) {
            if let Err(err) = order.execute(self.generator.as_ref()) {
                error!("Refusing malformed work order: {}", err);
                panic!("malformed work order: {}", err);
            }
        }

        // Keep the allocation for the next batch
        self.buffer = batch;
    }
}
