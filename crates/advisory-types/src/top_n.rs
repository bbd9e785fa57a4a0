//! Bounded top-K selection over a streamed collection.
//!
//! Keeps the `limit` largest items by key in a min-heap of size `limit`,
//! so working memory stays O(limit) regardless of how many items are pushed.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

struct Entry<K, T> {
    key: K,
    seq: u64,
    value: T,
}

// Ordering is by key, with insertion sequence as a deterministic tie-break.
// Equal-key ordering between calls or code paths is not a guarantee.
impl<K: Ord, T> Ord for Entry<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.seq.cmp(&other.seq))
    }
}

impl<K: Ord, T> PartialOrd for Entry<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> PartialEq for Entry<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord, T> Eq for Entry<K, T> {}

/// Size-capped min-heap that keeps the `limit` largest items by key.
pub struct BoundedMinHeap<K: Ord, T> {
    limit: usize,
    seq: u64,
    heap: BinaryHeap<Reverse<Entry<K, T>>>,
}

impl<K: Ord, T> BoundedMinHeap<K, T> {
    /// Create a heap that retains at most `limit` items (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            seq: 0,
            heap: BinaryHeap::with_capacity(limit + 1),
        }
    }

    /// Push an item, evicting the current minimum if the cap is exceeded.
    pub fn push(&mut self, key: K, value: T) {
        self.seq += 1;
        self.heap.push(Reverse(Entry {
            key,
            seq: self.seq,
            value,
        }));
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain the heap into a vector ordered by key, largest first.
    pub fn into_descending(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(Reverse(entry)) = self.heap.pop() {
            out.push(entry.value);
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_largest_by_key() {
        let mut heap = BoundedMinHeap::new(3);
        for key in [5, 1, 9, 3, 7, 2] {
            heap.push(key, key * 10);
        }
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.into_descending(), vec![90, 70, 50]);
    }

    #[test]
    fn fewer_items_than_limit() {
        let mut heap = BoundedMinHeap::new(10);
        heap.push(2, "b");
        heap.push(1, "a");
        assert_eq!(heap.into_descending(), vec!["b", "a"]);
    }

    #[test]
    fn zero_limit_keeps_one() {
        let mut heap = BoundedMinHeap::new(0);
        heap.push(1, "a");
        heap.push(2, "b");
        assert_eq!(heap.into_descending(), vec!["b"]);
    }

    #[test]
    fn empty_heap() {
        let heap: BoundedMinHeap<i64, ()> = BoundedMinHeap::new(5);
        assert!(heap.is_empty());
        assert!(heap.into_descending().is_empty());
    }

    #[test]
    fn equal_keys_are_all_retained_up_to_limit() {
        let mut heap = BoundedMinHeap::new(2);
        heap.push(1, "first");
        heap.push(1, "second");
        heap.push(1, "third");
        assert_eq!(heap.len(), 2);
    }
}
