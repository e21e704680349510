// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out to UI observers.
//!
//! Every subscriber owns a bounded queue guarded by its own lock; broadcasts
//! touch no global lock beyond a snapshot of the subscriber list. Enqueue
//! policy under back-pressure:
//!
//! - `task_updated` is never dropped; a newer version replaces a queued
//!   older one for the same task.
//! - `task_output` chunks for the same (task, command, stream) arriving
//!   within the batch window are merged in place. When the queue is full the
//!   oldest output chunk is dropped and coalesced into one
//!   `task_output_truncated` sentinel per task.
//! - Anything else is dropped with a warning when the queue is full.

use drover_core::{Event, TaskId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Default bound on a subscriber's outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Consecutive output chunks within this window are merged.
pub const OUTPUT_BATCH_WINDOW: Duration = Duration::from_millis(50);

struct QueueState {
    items: VecDeque<Event>,
    /// When the tail `task_output` chunk was enqueued (batching).
    tail_output_at: Option<Instant>,
    closed: bool,
}

struct SubscriberQueue {
    inner: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(SubscriberQueue {
            inner: Mutex::new(QueueState {
                items: VecDeque::new(),
                tail_output_at: None,
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        })
    }

    fn push(&self, event: Event) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        match event {
            Event::TaskOutput { task_id, command_index, stream, content } => {
                self.push_output(&mut state, task_id, command_index, stream, content);
            }
            Event::TaskUpdated { task } => {
                self.push_task_updated(&mut state, task);
            }
            other => {
                if state.items.len() >= self.capacity {
                    tracing::warn!(event = other.name(), "observer queue full, dropping event");
                } else {
                    state.items.push_back(other);
                }
            }
        }
        drop(state);
        self.notify.notify_one();
    }

    fn push_output(
        &self,
        state: &mut QueueState,
        task_id: TaskId,
        command_index: usize,
        stream: drover_core::OutputStream,
        content: String,
    ) {
        let now = Instant::now();

        // Batch: merge into the tail chunk when it matches and is fresh.
        if let Some(Event::TaskOutput {
            task_id: tail_task,
            command_index: tail_index,
            stream: tail_stream,
            content: tail_content,
        }) = state.items.back_mut()
        {
            let fresh = state
                .tail_output_at
                .is_some_and(|at| now.duration_since(at) < OUTPUT_BATCH_WINDOW);
            if fresh && *tail_task == task_id && *tail_index == command_index && *tail_stream == stream
            {
                tail_content.push_str(&content);
                state.tail_output_at = Some(now);
                return;
            }
        }

        if state.items.len() >= self.capacity {
            // Drop the oldest output chunk; if none exists the queue is full
            // of undroppable events and the incoming chunk is the casualty.
            let dropped_task = match state.items.iter().position(|e| matches!(e, Event::TaskOutput { .. })) {
                Some(pos) => match state.items.remove(pos) {
                    Some(Event::TaskOutput { task_id, .. }) => task_id,
                    _ => task_id.clone(),
                },
                None => {
                    Self::record_truncation(state, task_id);
                    return;
                }
            };
            Self::record_truncation(state, dropped_task);
        }

        state.items.push_back(Event::TaskOutput { task_id, command_index, stream, content });
        state.tail_output_at = Some(now);
    }

    fn push_task_updated(&self, state: &mut QueueState, task: Box<drover_core::Task>) {
        // Supersede a queued older version of the same task. The stale entry
        // is removed and the newer one appended at the tail, so a command's
        // chunks and result still precede the update that records them.
        let queued_pos = state.items.iter().position(|item| {
            matches!(item, Event::TaskUpdated { task: queued } if queued.id == task.id)
        });
        if let Some(pos) = queued_pos {
            let stale_is_newer = matches!(
                &state.items[pos],
                Event::TaskUpdated { task: queued } if queued.version >= task.version
            );
            if stale_is_newer {
                return;
            }
            state.items.remove(pos);
        }
        // Never dropped, even over capacity: coalescing bounds the overshoot
        // by the number of live tasks.
        state.items.push_back(Event::TaskUpdated { task });
    }

    fn record_truncation(state: &mut QueueState, task_id: TaskId) {
        for item in state.items.iter_mut() {
            if let Event::TaskOutputTruncated { task_id: existing, dropped } = item {
                if *existing == task_id {
                    *dropped += 1;
                    return;
                }
            }
        }
        state.items.push_front(Event::TaskOutputTruncated { task_id, dropped: 1 });
    }

    fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_one();
    }
}

struct Subscriber {
    id: u64,
    queue: Arc<SubscriberQueue>,
}

/// Broadcast hub for UI observers.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EventBus {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Register an observer; its stream sees every event published after
    /// this call, in publish order.
    pub fn subscribe(self: &Arc<Self>) -> EventStream {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = SubscriberQueue::new(self.capacity);
        self.subscribers.lock().push(Subscriber { id, queue: Arc::clone(&queue) });
        EventStream { id, queue, bus: Arc::clone(self) }
    }

    /// Fan an event out to every subscriber.
    pub fn publish(&self, event: Event) {
        let queues: Vec<Arc<SubscriberQueue>> = {
            let subscribers = self.subscribers.lock();
            subscribers.iter().map(|s| Arc::clone(&s.queue)).collect()
        };
        for queue in queues {
            queue.push(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
            let subscriber = subscribers.swap_remove(pos);
            subscriber.queue.close();
        }
    }
}

/// One observer's view of the bus. Dropping it unsubscribes.
pub struct EventStream {
    id: u64,
    queue: Arc<SubscriberQueue>,
    bus: Arc<EventBus>,
}

impl EventStream {
    /// Receive the next event; `None` once the stream is closed and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            let notified = self.queue.notify.notified();
            {
                let mut state = self.queue.inner.lock();
                if let Some(event) = state.items.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking pop, for tests and drain loops.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.queue.inner.lock().items.pop_front()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
