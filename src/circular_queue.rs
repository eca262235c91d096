use std::collections::VecDeque;
use std::fmt;

/// Fixed-capacity FIFO, newest item at the front. Pushing into a full queue
/// evicts the oldest item.
#[derive(Clone)]
pub struct CircularQueue<T> {
    deque: VecDeque<T>,
    capacity: usize,
}

impl<T: fmt::Debug> fmt::Debug for CircularQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.asc_iter()).finish()
    }
}

impl<T> CircularQueue<T> {
    /// Zero capacity is raised to one.
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        let capacity = cap.max(1);

        Self {
            deque: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the evicted item, if any.
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.deque.pop_back()
        } else {
            None
        };

        self.deque.push_front(item);

        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() >= self.capacity
    }

    #[inline]
    pub fn newest(&self) -> Option<&T> {
        self.deque.front()
    }

    #[inline]
    pub fn oldest(&self) -> Option<&T> {
        self.deque.back()
    }

    /// Oldest first.
    #[inline]
    pub fn asc_iter(&self) -> impl Iterator<Item = &'_ T> {
        self.deque.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut q = CircularQueue::with_capacity(3);
        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), None);
        assert!(q.is_full());

        assert_eq!(q.push(4), Some(1));
        assert_eq!(q.len(), 3);
        assert_eq!(q.oldest(), Some(&2));
        assert_eq!(q.newest(), Some(&4));
        assert_eq!(q.asc_iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_holds_one_item() {
        let mut q = CircularQueue::with_capacity(0);
        q.push('a');
        assert!(q.is_full());
        assert_eq!(q.push('b'), Some('a'));
        assert_eq!(q.newest(), q.oldest());
    }
}
