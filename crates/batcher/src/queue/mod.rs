use std::num::NonZeroUsize;

/// Growable circular buffer holding one group's pending items in FIFO order.
///
/// Storage is a fixed arena of slots indexed by `head`/`tail`. When every slot
/// is occupied a push grows the arena by `grow_by` slots, re-laying the items
/// out in logical order. Nothing is ever evicted.
#[derive(Debug)]
pub struct RingQueue<T> {
    slots: Vec<Option<T>>,
    grow_by: usize,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T> RingQueue<T> {
    /// Create a queue with `grow_by` initial slots that grows by the same step.
    pub fn new(grow_by: NonZeroUsize) -> Self {
        let grow_by = grow_by.get();
        let mut slots = Vec::with_capacity(grow_by);
        slots.resize_with(grow_by, || None);
        Self {
            slots,
            grow_by,
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of slots currently allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn push(&mut self, item: T) {
        if self.count == self.slots.len() {
            self.grow();
        }
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.slots.len();
        self.count += 1;
    }

    /// Remove and return the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        item
    }

    /// Remove up to `n` of the oldest items, returned oldest first.
    pub fn take_up_to(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.count);
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.pop() {
                Some(item) => out.push(item),
                None => break,
            }
        }
        out
    }

    /// Full arena: `head == tail`. Rotating puts the oldest item at index 0,
    /// after which the new slots are appended past the newest item.
    fn grow(&mut self) {
        let old_len = self.slots.len();
        self.slots.rotate_left(self.head);
        self.slots.resize_with(old_len + self.grow_by, || None);
        self.head = 0;
        self.tail = old_len;
    }
}
