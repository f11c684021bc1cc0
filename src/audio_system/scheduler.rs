/// Delayed task queue
///
/// Tasks are keyed by the engine time at which they fall due and drained
/// once per tick. Ties run in scheduling order.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::channel::ChannelHandle;

/// Work deferred to a later tick
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledTask {
    /// An event instance ran its clip to the end
    EventFinished { event: String, handle: ChannelHandle },
}

struct Entry<T> {
    due: f64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap pops the earliest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct Scheduler<T = ScheduledTask> {
    queue: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Queue `task` to run once engine time reaches `due`
    pub fn schedule(&mut self, due: f64, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry { due, seq, task });
    }

    /// Remove and return every task due at or before `now`, earliest first
    pub fn drain_due(&mut self, now: f64) -> Vec<T> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|e| e.due <= now) {
            if let Some(entry) = self.queue.pop() {
                due.push(entry.task);
            }
        }
        due
    }

    pub fn next_due(&self) -> Option<f64> {
        self.queue.peek().map(|e| e.due)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
