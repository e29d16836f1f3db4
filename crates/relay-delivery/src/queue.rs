//! Bounded FIFO queue decoupling ingestion from delivery.
//!
//! Producers block while the queue is full and consumers block while it is
//! empty; both waits are interruptible through a [`CancellationToken`].
//!
//! # Close barrier
//!
//! Every enqueue holds shared access to the sender for its whole blocking
//! duration and [`BoundedQueue::close`] takes exclusive access before dropping
//! the sender. Close first fires an internal "closing" token so blocked
//! producers give up their shared access with [`QueueError::Closed`] instead of
//! keeping close waiting for a free slot. Once close returns, no enqueue is
//! in flight and every later call fails fast.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{error::QueueError, DEFAULT_QUEUE_CAPACITY};

/// Fixed-capacity multi-producer multi-consumer FIFO queue.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    sender: RwLock<Option<mpsc::Sender<T>>>,
    receiver: Mutex<mpsc::Receiver<T>>,
    closing: CancellationToken,
    depth: AtomicUsize,
    capacity: usize,
}

impl<T: Send> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// A capacity of zero falls back to [`DEFAULT_QUEUE_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_QUEUE_CAPACITY } else { capacity };
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(receiver),
            closing: CancellationToken::new(),
            depth: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Adds `item` to the back of the queue, waiting for a free slot.
    ///
    /// Dropping the returned future before it completes never inserts the
    /// item.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Closed`] if the queue is closed or closing begins while
    ///   waiting.
    /// - [`QueueError::Cancelled`] if `cancel` fires first.
    pub async fn enqueue(&self, item: T, cancel: &CancellationToken) -> Result<(), QueueError> {
        if self.closing.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let guard = tokio::select! {
            biased;
            () = self.closing.cancelled() => return Err(QueueError::Closed),
            () = cancel.cancelled() => return Err(QueueError::Cancelled),
            guard = self.sender.read() => guard,
        };

        let Some(sender) = guard.as_ref() else {
            return Err(QueueError::Closed);
        };

        // Reserve first so the item is only moved once a slot is held.
        let permit = tokio::select! {
            biased;
            () = self.closing.cancelled() => return Err(QueueError::Closed),
            () = cancel.cancelled() => return Err(QueueError::Cancelled),
            permit = sender.reserve() => permit.map_err(|_| QueueError::Closed)?,
        };

        self.depth.fetch_add(1, Ordering::AcqRel);
        permit.send(item);
        Ok(())
    }

    /// Removes the item at the front of the queue, waiting if it is empty.
    ///
    /// Returns `None` once the queue is closed and drained, or when `cancel`
    /// fires. Each item is handed to exactly one caller.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<T> {
        let mut receiver = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            receiver = self.receiver.lock() => receiver,
        };

        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            item = receiver.recv() => item,
        };

        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    /// Stops accepting new items.
    ///
    /// Idempotent. Buffered items stay available to [`dequeue`](Self::dequeue)
    /// until drained. Returns after every in-flight enqueue has finished or
    /// been rejected.
    pub async fn close(&self) {
        self.closing.cancel();

        let mut sender = self.sender.write().await;
        if sender.take().is_some() {
            debug!(buffered = self.len(), "queue closed");
        }
    }

    /// Approximate number of buffered items.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether the queue currently holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let queue = BoundedQueue::new(4);
        let cancel = CancellationToken::new();

        for i in 0..4 {
            queue.enqueue(i, &cancel).await.unwrap();
        }
        assert_eq!(queue.len(), 4);

        for expected in 0..4 {
            assert_eq!(queue.dequeue(&cancel).await, Some(expected));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn zero_capacity_uses_default() {
        let queue = BoundedQueue::<u8>::new(0);
        assert_eq!(queue.capacity(), DEFAULT_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn enqueue_after_close_fails_fast() {
        let queue = BoundedQueue::new(1);
        let cancel = CancellationToken::new();

        queue.close().await;

        assert_eq!(queue.enqueue(1, &cancel).await, Err(QueueError::Closed));
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_keeps_buffered_items() {
        let queue = BoundedQueue::new(2);
        let cancel = CancellationToken::new();
        queue.enqueue("a", &cancel).await.unwrap();
        queue.enqueue("b", &cancel).await.unwrap();

        queue.close().await;
        queue.close().await;

        assert_eq!(queue.dequeue(&cancel).await, Some("a"));
        assert_eq!(queue.dequeue(&cancel).await, Some("b"));
        assert_eq!(queue.dequeue(&cancel).await, None);
    }

    #[tokio::test]
    async fn blocked_enqueue_is_woken_by_close() {
        let queue = Arc::new(BoundedQueue::new(1));
        let cancel = CancellationToken::new();
        queue.enqueue(1, &cancel).await.unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.enqueue(2, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), queue.close()).await.unwrap();

        assert_eq!(producer.await.unwrap(), Err(QueueError::Closed));
        assert_eq!(queue.dequeue(&cancel).await, Some(1));
        assert_eq!(queue.dequeue(&cancel).await, None);
    }

    #[tokio::test]
    async fn blocked_enqueue_honors_cancellation() {
        let queue = BoundedQueue::new(1);
        let cancel = CancellationToken::new();
        queue.enqueue(1, &cancel).await.unwrap();

        let request = CancellationToken::new();
        let trigger = request.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        assert_eq!(queue.enqueue(2, &request).await, Err(QueueError::Cancelled));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn dequeue_returns_none_on_cancel() {
        let queue = BoundedQueue::<u32>::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(queue.dequeue(&cancel).await, None);
    }

    #[tokio::test]
    async fn dropped_enqueue_never_inserts() {
        let queue = BoundedQueue::new(1);
        let cancel = CancellationToken::new();
        queue.enqueue(1, &cancel).await.unwrap();

        let attempt =
            tokio::time::timeout(Duration::from_millis(20), queue.enqueue(2, &cancel)).await;
        assert!(attempt.is_err());

        assert_eq!(queue.dequeue(&cancel).await, Some(1));
        assert_eq!(queue.len(), 0);
        queue.close().await;
        assert_eq!(queue.dequeue(&cancel).await, None);
    }
}
