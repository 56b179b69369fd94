//! Fixed-capacity FIFO used to pair replies with the commands that caused them.
//!
//! tmux answers commands strictly in the order they were written, so the
//! oldest entry is always the one a `%end`/`%error` belongs to.

use crate::error::TmuxError;
use std::collections::VecDeque;

/// Bounded ring buffer of pending command records.
#[derive(Debug)]
pub struct CommandQueue<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> CommandQueue<T> {
    /// Create a queue holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry. Fails when `capacity` entries are already pending.
    pub fn put(&mut self, entry: T) -> Result<(), TmuxError> {
        if self.is_full() {
            return Err(TmuxError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Remove and return the oldest entry.
    pub fn get(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    /// Withdraw the newest entry, for a command that never reached the wire.
    pub fn take_newest(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_newest_withdraws_last_put() {
        let mut queue = CommandQueue::new(3);
        queue.put("a").unwrap();
        queue.put("b").unwrap();
        assert_eq!(queue.take_newest(), Some("b"));
        assert_eq!(queue.get(), Some("a"));
        assert_eq!(queue.take_newest(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = CommandQueue::new(4);
        for i in 0..4 {
            queue.put(i).unwrap();
        }
        assert!(queue.is_full());
        let drained: Vec<_> = std::iter::from_fn(|| queue.get()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_get_on_empty() {
        let mut queue: CommandQueue<u8> = CommandQueue::new(2);
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn test_put_beyond_capacity_fails() {
        let mut queue = CommandQueue::new(2);
        queue.put("a").unwrap();
        queue.put("b").unwrap();
        let err = queue.put("c").unwrap_err();
        assert!(matches!(err, TmuxError::QueueFull { capacity: 2 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_wraps_after_get() {
        let mut queue = CommandQueue::new(2);
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        assert_eq!(queue.get(), Some(1));
        queue.put(3).unwrap();
        assert_eq!(queue.get(), Some(2));
        assert_eq!(queue.get(), Some(3));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let queue: CommandQueue<u8> = CommandQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_drain() {
        let mut queue = CommandQueue::new(3);
        queue.put('x').unwrap();
        queue.put('y').unwrap();
        assert_eq!(queue.drain().collect::<String>(), "xy");
        assert!(queue.is_empty());
    }
}
