//! Bounded FIFO of admitted tasks waiting for a worker slot.
//!
//! The queue owns no locking; the dispatcher mutates it only while holding
//! the pool state lock.

use std::collections::VecDeque;

/// Returned by [`TaskQueue::enqueue`] when the queue is at capacity. Hands the
/// rejected item back to the caller.
#[derive(Debug)]
pub struct QueueFull<T>(pub T);

/// Strict FIFO with a fixed capacity. `capacity == 0` accepts nothing.
#[derive(Debug)]
pub struct TaskQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> TaskQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            // Unbounded queues report usize::MAX; don't try to preallocate that.
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append `item`, or give it back if the queue is full.
    pub fn enqueue(&mut self, item: T) -> Result<(), QueueFull<T>> {
        if self.items.len() >= self.capacity {
            return Err(QueueFull(item));
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Remove and return the oldest item.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Put an item back at the head. Only used when a dequeued item could not
    /// be placed, so its position is restored rather than lost.
    pub(crate) fn requeue_front(&mut self, item: T) {
        self.items.push_front(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest without removing.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Remove every item, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut q = TaskQueue::new(4);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        q.enqueue(4).unwrap();
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), Some(4));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn rejects_when_full_and_returns_item() {
        let mut q = TaskQueue::new(2);
        q.enqueue("a").unwrap();
        q.enqueue("b").unwrap();
        assert!(q.is_full());
        let QueueFull(item) = q.enqueue("c").unwrap_err();
        assert_eq!(item, "c");
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn zero_capacity_accepts_nothing() {
        let mut q = TaskQueue::new(0);
        assert!(q.is_full());
        assert!(q.enqueue(()).is_err());
        assert!(q.is_empty());
    }

    #[test]
    fn unbounded_capacity() {
        let mut q = TaskQueue::new(usize::MAX);
        for i in 0..1000 {
            q.enqueue(i).unwrap();
        }
        assert_eq!(q.len(), 1000);
        assert!(!q.is_full());
    }

    #[test]
    fn requeue_front_restores_head() {
        let mut q = TaskQueue::new(3);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        let head = q.dequeue().unwrap();
        q.requeue_front(head);
        assert_eq!(q.dequeue(), Some(1));
    }

    #[test]
    fn drain_empties_in_order() {
        let mut q = TaskQueue::new(3);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        let drained: Vec<_> = q.drain().collect();
        assert_eq!(drained, vec![1, 2]);
        assert!(q.is_empty());
    }
}
