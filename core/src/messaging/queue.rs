//! Bounded delivery queues
//!
//! A queue evicts its oldest entry before appending whenever it is at
//! capacity or free memory is below the configured threshold, so an
//! enqueue never fails. Each entry carries a sequence number; removal after
//! a publish names that number, so an eviction racing with a publish never
//! drops the wrong message.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use hal_abstractions::MemoryProbe;
use heapless::Deque;

use super::message::QueueMessage;

/// Result of an enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Enqueued {
    Stored,
    /// Stored after evicting the oldest message
    EvictedOther,
}

/// A message together with its position in the queue's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequenced {
    pub seq: u32,
    pub message: QueueMessage,
}

/// FIFO of at most `N` messages, bounded further by a runtime capacity
#[derive(Debug)]
pub struct MessageQueue<const N: usize> {
    items: Deque<Sequenced, N>,
    capacity: usize,
    memory_threshold: usize,
    next_seq: u32,
    evictions: u32,
}

impl<const N: usize> MessageQueue<N> {
    /// `capacity` is clamped to `N`
    pub const fn new(capacity: usize, memory_threshold: usize) -> Self {
        Self {
            items: Deque::new(),
            capacity: if capacity < N { capacity } else { N },
            memory_threshold,
            next_seq: 0,
            evictions: 0,
        }
    }

    pub fn enqueue(&mut self, message: QueueMessage, probe: &impl MemoryProbe) -> Enqueued {
        let free = probe.free_bytes();
        let mut outcome = Enqueued::Stored;

        if self.items.len() >= self.capacity || free < self.memory_threshold {
            if let Some(evicted) = self.items.pop_front() {
                self.evictions = self.evictions.wrapping_add(1);
                outcome = Enqueued::EvictedOther;
                warn!(
                    "Queue eviction: seq {} dropped (len {}, free {} bytes)",
                    evicted.seq,
                    self.items.len(),
                    free
                );
            }
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let _ = self.items.push_back(Sequenced { seq, message });
        outcome
    }

    /// Clone of the oldest message, left in place
    pub fn peek(&self) -> Option<Sequenced> {
        self.items.front().cloned()
    }

    /// Remove the head if it is still `seq`
    pub fn acknowledge(&mut self, seq: u32) -> bool {
        match self.items.front() {
            Some(head) if head.seq == seq => {
                let _ = self.items.pop_front();
                true
            }
            _ => false,
        }
    }

    pub fn dequeue(&mut self) -> Option<QueueMessage> {
        self.items.pop_front().map(|s| s.message)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages evicted since creation
    pub fn evictions(&self) -> u32 {
        self.evictions
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueMessage> {
        self.items.iter().map(|s| &s.message)
    }
}

/// A [`MessageQueue`] shared between duties
///
/// Every operation is a single critical section.
pub struct SharedQueue<const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<MessageQueue<N>>>,
}

impl<const N: usize> SharedQueue<N> {
    pub const fn new(capacity: usize, memory_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(MessageQueue::new(capacity, memory_threshold))),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MessageQueue<N>) -> R) -> R {
        self.inner.lock(|q| f(&mut q.borrow_mut()))
    }

    pub fn enqueue(&self, message: QueueMessage, probe: &impl MemoryProbe) -> Enqueued {
        self.with(|q| q.enqueue(message, probe))
    }

    pub fn peek(&self) -> Option<Sequenced> {
        self.with(|q| q.peek())
    }

    pub fn acknowledge(&self, seq: u32) -> bool {
        self.with(|q| q.acknowledge(seq))
    }

    pub fn dequeue(&self) -> Option<QueueMessage> {
        self.with(|q| q.dequeue())
    }

    pub fn len(&self) -> usize {
        self.with(|q| q.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with(|q| q.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedMemory(pub usize);

    impl MemoryProbe for FixedMemory {
        fn free_bytes(&self) -> usize {
            self.0
        }
    }

    pub(crate) const PLENTY: FixedMemory = FixedMemory(16_000);

    pub(crate) fn msg(n: usize) -> QueueMessage {
        QueueMessage::new("lihini/income", &format!("message {}", n)).unwrap()
    }

    #[test]
    fn test_overflow_evicts_oldest_first() {
        let mut queue: MessageQueue<50> = MessageQueue::new(50, 200);
        for n in 1..=50 {
            assert_eq!(queue.enqueue(msg(n), &PLENTY), Enqueued::Stored);
        }
        assert_eq!(queue.enqueue(msg(51), &PLENTY), Enqueued::EvictedOther);

        assert_eq!(queue.len(), 50);
        let payloads: Vec<&str> = queue.iter().map(|m| m.payload()).collect();
        let expected: Vec<String> = (2..=51).map(|n| format!("message {}", n)).collect();
        assert_eq!(payloads, expected);
        assert_eq!(queue.evictions(), 1);
    }

    #[test]
    fn test_low_memory_evicts_even_below_capacity() {
        let mut queue: MessageQueue<8> = MessageQueue::new(8, 200);
        queue.enqueue(msg(1), &PLENTY);
        queue.enqueue(msg(2), &PLENTY);

        assert_eq!(queue.enqueue(msg(3), &FixedMemory(100)), Enqueued::EvictedOther);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().map(|s| s.message), Some(msg(2)));
    }

    #[test]
    fn test_low_memory_on_empty_queue_still_stores() {
        let mut queue: MessageQueue<8> = MessageQueue::new(8, 200);
        assert_eq!(queue.enqueue(msg(1), &FixedMemory(0)), Enqueued::Stored);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_runtime_capacity_below_bound() {
        let mut queue: MessageQueue<8> = MessageQueue::new(3, 0);
        for n in 1..=5 {
            queue.enqueue(msg(n), &PLENTY);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(), Some(msg(3)));
    }

    #[test]
    fn test_acknowledge_only_matching_head() {
        let mut queue: MessageQueue<2> = MessageQueue::new(2, 0);
        queue.enqueue(msg(1), &PLENTY);
        let head = queue.peek().unwrap();

        // The head is evicted while its publish is in flight
        queue.enqueue(msg(2), &PLENTY);
        queue.enqueue(msg(3), &PLENTY);

        assert!(!queue.acknowledge(head.seq));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().map(|s| s.message), Some(msg(2)));
    }

    #[test]
    fn test_shared_queue_round_trip() {
        let queue: SharedQueue<4> = SharedQueue::new(4, 0);
        queue.enqueue(msg(1), &PLENTY);
        let head = queue.peek().unwrap();
        assert!(queue.acknowledge(head.seq));
        assert!(queue.is_empty());
    }
}
