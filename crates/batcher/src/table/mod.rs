use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::queue::RingQueue;

/// Group key to pending-item queue. Not synchronized; the owner keeps it
/// behind a single lock.
#[derive(Debug)]
pub struct GroupTable<T> {
    queues: HashMap<String, RingQueue<T>>,
    item_cap: NonZeroUsize,
}

impl<T> GroupTable<T> {
    pub fn new(item_cap: NonZeroUsize) -> Self {
        Self {
            queues: HashMap::new(),
            item_cap,
        }
    }

    pub fn item_cap(&self) -> NonZeroUsize {
        self.item_cap
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Number of groups currently present, drained or not.
    pub fn groups(&self) -> usize {
        self.queues.len()
    }

    /// Items pending for `group`.
    pub fn pending(&self, group: &str) -> usize {
        self.queues.get(group).map_or(0, RingQueue::len)
    }

    /// Append `items` to `group`, creating its queue on first use.
    pub fn insert<I>(&mut self, group: &str, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let item_cap = self.item_cap;
        let queue = self
            .queues
            .entry(group.to_owned())
            .or_insert_with(|| RingQueue::new(item_cap));
        for item in items {
            queue.push(item);
        }
    }

    /// Take every full-size sub-batch, leaving remainders (and the groups
    /// themselves) in place.
    pub fn drain_filled(&mut self) -> Vec<(String, Vec<T>)> {
        let cap = self.item_cap.get();
        let mut batches = Vec::new();
        for (group, queue) in &mut self.queues {
            while queue.len() >= cap {
                batches.push((group.clone(), queue.take_up_to(cap)));
            }
        }
        batches
    }

    /// Swap in an empty table and split everything the old one held into
    /// sub-batches of at most `item_cap` items.
    pub fn drain_all(&mut self) -> Vec<(String, Vec<T>)> {
        let cap = self.item_cap.get();
        let snapshot = std::mem::take(&mut self.queues);
        let mut batches = Vec::new();
        for (group, mut queue) in snapshot {
            while !queue.is_empty() {
                batches.push((group.clone(), queue.take_up_to(cap)));
            }
        }
        batches
    }
}
