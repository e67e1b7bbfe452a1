use std::{
    collections::BTreeSet,
    sync::{Mutex, PoisonError},
};

use sextet_model::{KeyId, Packet, encode};

/// Set of keys currently held down.
///
/// Mutation and snapshotting are serialized by one lock; encoding always works
/// on a private copy.
#[derive(Debug, Default)]
pub struct KeyState {
    pressed: Mutex<BTreeSet<KeyId>>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transition. Returns `true` iff the set actually changed.
    pub fn update(&self, key: KeyId, down: bool) -> bool {
        let mut pressed = self.pressed.lock().unwrap_or_else(PoisonError::into_inner);
        if down {
            pressed.insert(key)
        } else {
            pressed.remove(&key)
        }
    }

    /// Copy of the current set.
    pub fn snapshot(&self) -> BTreeSet<KeyId> {
        self.pressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Encode a snapshot of the current set.
    pub fn to_packet(&self) -> Packet {
        encode(&self.snapshot())
    }
}
