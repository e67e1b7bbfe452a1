//! Bounded, drop-oldest hand-off between the state-update path and the sink.
//!
//! The producer never waits: a full queue loses its oldest entry. The single
//! consumer waits on [`PacketChannel::receive`] until a packet arrives or a
//! shutdown is requested.
use std::{
    collections::VecDeque,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use sextet_model::Packet;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Queue depth used by the stream.
pub const DEFAULT_CAPACITY: usize = 4;

#[derive(Debug)]
pub struct PacketChannel {
    queue: Mutex<VecDeque<Packet>>,
    capacity: usize,
    available: Notify,
    closing: AtomicBool,
    dropped: AtomicU64,
}

impl PacketChannel {
    /// Create a channel with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel holding at most `capacity` packets (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            available: Notify::new(),
            closing: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Packet>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a packet, evicting the oldest entries until it fits.
    ///
    /// `Invalid` packets are ignored. Returns the number of evicted packets.
    pub fn send(&self, packet: Packet) -> usize {
        if !packet.is_valid() {
            return 0;
        }

        let mut evicted = 0;
        {
            let mut queue = self.queue();
            while queue.len() >= self.capacity {
                queue.pop_front();
                evicted += 1;
            }
            queue.push_back(packet);
        }
        self.available.notify_one();

        if evicted > 0 {
            debug!(evicted, "dropping older waiting packets to allow for a new one");
            self.dropped.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        evicted
    }

    /// Queue a blank keepalive if nothing is waiting.
    ///
    /// A non-empty queue already holds the next line out, so nothing is added.
    /// Returns `true` if a blank packet was queued.
    pub fn hint_keepalive(&self) -> bool {
        let queued = {
            let mut queue = self.queue();
            if queue.is_empty() {
                queue.push_back(Packet::Blank);
                true
            } else {
                false
            }
        };
        if queued {
            trace!("keepalive queued");
            self.available.notify_one();
        }
        queued
    }

    /// Mark the channel closing and wake the receiver.
    ///
    /// The `Invalid` sentinel is only queued when there is room; a full queue
    /// means the receiver is not parked.
    pub fn request_shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        {
            let mut queue = self.queue();
            if queue.len() < self.capacity {
                queue.push_back(Packet::Invalid);
            }
        }
        self.available.notify_one();
    }

    /// Wait for the next real packet.
    ///
    /// Packets queued before a shutdown are still handed out; `None` comes
    /// once shutdown has been requested and nothing real is left. Sentinels
    /// and wake-ups with an empty queue just loop back.
    pub async fn receive(&self) -> Option<Packet> {
        loop {
            let next = self.queue().pop_front();
            match next {
                Some(Packet::Invalid) => continue,
                Some(packet) => return Some(packet),
                None if self.is_closing() => return None,
                None => self.available.notified().await,
            }
        }
    }

    #[inline]
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Packets currently waiting (sentinels included).
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total packets evicted by backpressure since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for PacketChannel {
    fn default() -> Self {
        Self::new()
    }
}
