//! Bounded FIFO queue shared by producers and delivery workers.
//!
//! The queue is a plain data structure with async blocking on top: a
//! `parking_lot` mutex guards the buffer and two `Notify`s wake suspended
//! producers and consumers. No lock is ever held across an `.await`.
//!
//! Capacity counts pending items *and* items currently leased to a worker.
//! A slot is released only when the lease is settled, so a worker can always
//! put a failed item back at the tail without waiting for space.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{QueueError, Rejected};

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    leased: usize,
    closed: bool,
}

impl<T> State<T> {
    fn occupied(&self) -> usize {
        self.items.len() + self.leased
    }
}

/// Fixed-capacity, thread-safe FIFO queue.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> BoundedQueue<T> {
    /// Create an open queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.max(1)),
                leased: 0,
                closed: false,
            }),
            capacity: capacity.max(1),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    /// Maximum number of pending plus leased items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// `true` if no item is waiting to be dequeued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Number of items currently leased to consumers.
    pub fn in_flight(&self) -> usize {
        self.state.lock().leased
    }

    /// `true` once the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Append `item` at the tail, waiting for a free slot while the queue is full.
    ///
    /// Fails with [`QueueError::Closed`] if the queue is closed before or while
    /// waiting; the item is handed back in either case.
    pub async fn enqueue(&self, item: T) -> Result<(), Rejected<T>> {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            // Register interest before inspecting state so a release between
            // the check and the await is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(Rejected::new(item, QueueError::Closed));
                }
                if state.occupied() < self.capacity {
                    state.items.push_back(item);
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Append `item` at the tail without waiting.
    ///
    /// Fails with [`QueueError::Full`] at capacity and [`QueueError::Closed`]
    /// after close.
    pub fn try_enqueue(&self, item: T) -> Result<(), Rejected<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Rejected::new(item, QueueError::Closed));
        }
        if state.occupied() >= self.capacity {
            return Err(Rejected::new(item, QueueError::Full));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the head item, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and every pending item has been
    /// handed out. That is exhaustion, not an error.
    pub async fn dequeue(&self) -> Option<Lease<'_, T>> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(item) = state.items.pop_front() {
                    state.leased += 1;
                    return Some(Lease {
                        queue: self,
                        item: Some(item),
                    });
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stop accepting items and wake every waiter.
    ///
    /// Pending items stay queued and can still be dequeued. Returns `true` if
    /// this call closed the queue, `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
        }
        self.wake_all();
        true
    }

    /// Close the queue and remove every pending item, oldest first.
    ///
    /// Leased items are unaffected; their holders still settle them.
    pub(crate) fn close_and_drain(&self) -> Vec<T> {
        let backlog = {
            let mut state = self.state.lock();
            state.closed = true;
            state.items.drain(..).collect()
        };
        self.wake_all();
        backlog
    }

    fn wake_all(&self) {
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    fn release(&self) {
        {
            let mut state = self.state.lock();
            state.leased = state.leased.saturating_sub(1);
        }
        self.not_full.notify_one();
    }
}

/// An item checked out of a [`BoundedQueue`].
///
/// The item keeps its queue slot until the lease is settled with
/// [`ack`](Lease::ack), [`requeue`](Lease::requeue), or by being dropped
/// (which acts like `ack`).
#[derive(Debug)]
pub struct Lease<'a, T> {
    queue: &'a BoundedQueue<T>,
    item: Option<T>,
}

impl<T> Lease<'_, T> {
    /// The leased item.
    pub fn item(&self) -> &T {
        self.item
            .as_ref()
            .unwrap_or_else(|| unreachable!("lease item is present until settled"))
    }

    /// Mark the item done and release its slot.
    pub fn ack(mut self) -> T {
        let item = self.take();
        self.queue.release();
        item
    }

    /// Put the item back at the tail of the queue, keeping its slot.
    ///
    /// Fails with [`QueueError::Closed`] once the queue is closed; the slot is
    /// released and the item handed back.
    pub fn requeue(mut self) -> Result<(), Rejected<T>> {
        let item = self.take();
        let queue = self.queue;

        let mut state = queue.state.lock();
        state.leased = state.leased.saturating_sub(1);
        if state.closed {
            drop(state);
            queue.not_full.notify_one();
            return Err(Rejected::new(item, QueueError::Closed));
        }
        state.items.push_back(item);
        drop(state);
        queue.not_empty.notify_one();
        Ok(())
    }

    fn take(&mut self) -> T {
        self.item
            .take()
            .unwrap_or_else(|| unreachable!("lease settled twice"))
    }
}

impl<T> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        if self.item.take().is_some() {
            self.queue.release();
        }
    }
}
