use std::{
    collections::HashMap,
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

/// Reassembles items produced out of order by a worker pool into the order
/// their keys were issued in.
///
/// Keys are expected to be issued contiguously from zero. An item is released by
/// [`Collator::try_next`] only once every item with a smaller key has been released.
#[derive(Debug)]
pub struct Collator<T: Send> {
    pub waiting: HashMap<usize, T>,
    pub next_key: usize,
    pub done: bool,
}

impl<T: Send> Default for Collator<T> {
    fn default() -> Self {
        Self {
            waiting: Default::default(),
            next_key: Default::default(),
            done: Default::default(),
        }
    }
}

impl<T: Send> Collator<T> {
    pub fn receive(&mut self, key: usize, item: T) {
        self.waiting.insert(key, item);
    }

    /// Drain up to `batch_size` items from `receiver` without blocking for long.
    ///
    /// Marks the collator as done once every sender has hung up.
    pub fn receive_from(&mut self, receiver: &Receiver<(usize, T)>, batch_size: usize) {
        let mut counter = 0usize;
        loop {
            match receiver.recv_timeout(Duration::from_micros(100)) {
                Ok((key, item)) => {
                    self.receive(key, item);
                    counter += 1;
                    if counter >= batch_size {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    self.done = true;
                    break;
                }
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.waiting.contains_key(&self.next_key)
    }

    pub fn try_next(&mut self) -> Option<(usize, T)> {
        let entry = self.waiting.remove_entry(&self.next_key)?;
        self.next_key += 1;
        Some(entry)
    }

    /// The number of items received but not yet released
    pub fn pending(&self) -> usize {
        self.waiting.len()
    }

    /// Whether all senders are gone and nothing more can be released
    pub fn is_exhausted(&self) -> bool {
        self.done && !self.has_next()
    }
}
