//! FIFO work queue with completion tracking
//!
//! Items are pushed once, the queue is closed, and workers drain it. Every popped
//! item must be acknowledged with [`WorkQueue::task_done`]; [`WorkQueue::join`]
//! resolves once nothing is queued or in flight.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    unfinished: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    item_ready: Notify,
    all_done: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                unfinished: 0,
                closed: false,
            }),
            item_ready: Notify::new(),
            all_done: Notify::new(),
        }
    }

    /// Builds a closed queue holding `items`
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        let queue = Self::new();
        for item in items {
            queue.push(item);
        }
        queue.close();
        queue
    }

    /// Enqueues an item. Returns false (and drops the item) once the queue is closed.
    pub fn push(&self, item: T) -> bool {
        {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            state.items.push_back(item);
            state.unfinished += 1;
        }
        self.item_ready.notify_one();
        true
    }

    /// Stops accepting items; waiting poppers see the end once the backlog is gone
    pub fn close(&self) {
        self.state().closed = true;
        self.item_ready.notify_waiters();
    }

    /// Takes the next item, waiting for one if the queue is still open
    ///
    /// Returns None when the queue is closed and empty.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.item_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Acknowledges one popped item
    pub fn task_done(&self) {
        let mut state = self.state();
        state.unfinished = state.unfinished.saturating_sub(1);
        if state.unfinished == 0 {
            self.all_done.notify_waiters();
        }
    }

    /// Waits until every pushed item has been acknowledged
    pub async fn join(&self) {
        loop {
            let notified = self.all_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state().unfinished == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Items waiting to be popped
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items queued or in flight
    pub fn unfinished(&self) -> usize {
        self.state().unfinished
    }

    fn state(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order_then_end() {
        let queue = WorkQueue::from_items(vec![1, 2, 3]);

        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, Some(3));
        assert_eq!(queue.pop().await, None);
        assert!(!queue.push(4));
    }

    #[tokio::test]
    async fn test_join_waits_for_task_done() {
        let queue = Arc::new(WorkQueue::from_items(vec!["a", "b"]));
        assert_eq!(queue.unfinished(), 2);

        let _ = queue.pop().await;
        let _ = queue.pop().await;
        queue.task_done();

        let joined = tokio::time::timeout(Duration::from_millis(50), queue.join()).await;
        assert!(joined.is_err());

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.join().await })
        };
        queue.task_done();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push_and_close() {
        let queue = Arc::new(WorkQueue::new());

        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let first = queue.pop().await;
                let second = queue.pop().await;
                (first, second)
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(7);
        queue.close();

        let (first, second) = tokio::time::timeout(Duration::from_secs(1), popper)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, Some(7));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_empty_queue_joins_immediately() {
        let queue: WorkQueue<u8> = WorkQueue::from_items(Vec::new());
        assert!(queue.is_empty());
        tokio::time::timeout(Duration::from_millis(50), queue.join())
            .await
            .unwrap();
    }
}
