use std::time::Duration;

use crossbeam::queue::SegQueue;
use crossbeam_channel::{Receiver, Sender};

use crate::work_order::WorkOrder;

/// Unbounded inbound queue of a chunk worker. Producers never block; the consumer
/// drains everything available at once and orders it itself, so FIFO order is irrelevant.
pub struct WorkQueue {
    orders: SegQueue<WorkOrder>,
    work_available_sender: Sender<()>,
    work_available_receiver: Receiver<()>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        // Capacity 1: coalesce multiple pushes into a single wakeup.
        let (work_available_sender, work_available_receiver) = crossbeam_channel::bounded(1);

        WorkQueue {
            orders: SegQueue::new(),
            work_available_sender,
            work_available_receiver,
        }
    }

    pub fn push(&self, order: WorkOrder) {
        self.orders.push(order);
        self.notify();
    }

    pub fn push_batch(&self, orders: impl IntoIterator<Item = WorkOrder>) {
        let mut pushed_any = false;

        for order in orders {
            self.orders.push(order);
            pushed_any = true;
        }

        if pushed_any {
            self.notify();
        }
    }

    /// Wakes a waiting consumer without queueing anything
    pub fn notify(&self) {
        let _ = self.work_available_sender.try_send(());
    }

    /// Moves every queued order into `buffer` without blocking. Returns how many were moved.
    pub fn drain_into(&self, buffer: &mut Vec<WorkOrder>) -> usize {
        let mut drained = 0;
        while let Some(order) = self.orders.pop() {
            buffer.push(order);
            drained += 1;
        }
        drained
    }

    /// Sleeps until something is pushed or the timeout passes
    pub fn wait_for_work(&self, timeout: Duration) {
        let _ = self.work_available_receiver.recv_timeout(timeout);
    }

    /// Drains all orders and returns the number of removed orders.
    pub fn clear(&self) -> usize {
        let mut removed = 0usize;
        while let Some(_order) = self.orders.pop() {
            removed += 1;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{voxels::coord::ChunkPos, work_order::OrderOutputs};

    #[test]
    fn test_drain_is_loss_free() {
        let queue = WorkQueue::new();
        let outputs = OrderOutputs::new();
        queue.push(WorkOrder::generate_and_mesh(ChunkPos::new(0, 0, 0), outputs.clone()));
        queue.push_batch(
            (1..5).map(|x| WorkOrder::generate_and_mesh(ChunkPos::new(x, 0, 0), outputs.clone())),
        );
        assert_eq!(queue.len(), 5);

        let mut buffer = Vec::new();
        assert_eq!(queue.drain_into(&mut buffer), 5);
        assert_eq!(buffer.len(), 5);
        assert!(queue.is_empty());
        assert_eq!(queue.drain_into(&mut buffer), 0);
    }

    #[test]
    fn test_wakeup_is_coalesced() {
        let queue = WorkQueue::new();
        queue.notify();
        queue.notify();

        // The first wait consumes the single pending wakeup
        let start = Instant::now();
        queue.wait_for_work(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));

        let start = Instant::now();
        queue.wait_for_work(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_clear() {
        let queue = WorkQueue::new();
        let outputs = OrderOutputs::new();
        for x in 0..3 {
            queue.push(WorkOrder::generate_and_mesh(ChunkPos::new(x, 0, 0), outputs.clone()));
        }
        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
    }
}
