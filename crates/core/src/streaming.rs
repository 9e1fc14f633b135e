//! Bounded key buffer for type-ahead
//!
//! Keys pressed while no prompt is active are held here and fed to the next
//! prompt. When full, the oldest key is dropped.

use std::collections::VecDeque;

use crate::terminal::Key;

/// Default number of keys held between prompts
pub const DEFAULT_KEY_BUFFER: usize = 64;

#[derive(Debug)]
pub struct KeyBuffer {
    keys: VecDeque<Key>,
    capacity: usize,
}

impl KeyBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Queue a key, dropping the oldest when full
    ///
    /// Returns true if a key was dropped.
    pub fn push(&mut self, key: Key) -> bool {
        let dropped = if self.keys.len() >= self.capacity {
            self.keys.pop_front();
            true
        } else {
            false
        };
        self.keys.push_back(key);
        dropped
    }

    pub fn pop(&mut self) -> Option<Key> {
        self.keys.pop_front()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for KeyBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_BUFFER)
    }
}
