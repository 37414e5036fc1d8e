//! Array-backed binary heap ordered by a caller supplied key.
//!
//! Items with equal keys come out in insertion order, which keeps rankings
//! built on top of the heap reproducible.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapOrder {
    /// Smallest key is dequeued first.
    MinFirst,
    /// Largest key is dequeued first.
    MaxFirst,
}

pub struct PriorityQueue<T, K>
where
    K: Fn(&T) -> f64,
{
    items: Vec<(u64, T)>,
    key: K,
    order: HeapOrder,
    next_seq: u64,
}

impl<T, K> PriorityQueue<T, K>
where
    K: Fn(&T) -> f64,
{
    pub fn new(order: HeapOrder, key: K) -> Self {
        Self {
            items: Vec::new(),
            key,
            order,
            next_seq: 0,
        }
    }

    pub fn enqueue(&mut self, item: T) {
        self.items.push((self.next_seq, item));
        self.next_seq += 1;
        self.sift_up(self.items.len() - 1);
    }

    pub fn dequeue(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let (_, item) = self.items.pop()?;
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        Some(item)
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.first().map(|(_, item)| item)
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains the queue in priority order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.items.len());
        while let Some(item) = self.dequeue() {
            out.push(item);
        }
        out
    }

    /// True if the item at `a` must come out before the item at `b`.
    fn precedes(&self, a: usize, b: usize) -> bool {
        let (seq_a, item_a) = &self.items[a];
        let (seq_b, item_b) = &self.items[b];
        let by_key = (self.key)(item_a).total_cmp(&(self.key)(item_b));
        let by_key = match self.order {
            HeapOrder::MinFirst => by_key,
            HeapOrder::MaxFirst => by_key.reverse(),
        };
        match by_key {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => seq_a < seq_b,
        }
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.precedes(index, parent) {
                break;
            }
            self.items.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut best = index;
            if left < len && self.precedes(left, best) {
                best = left;
            }
            if right < len && self.precedes(right, best) {
                best = right;
            }
            if best == index {
                break;
            }
            self.items.swap(index, best);
            index = best;
        }
    }
}
