use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling window of recently typed characters.
///
/// The buffer is not synchronised; the daemon owns it from a single thread
/// and passes `now` explicitly so expiry is deterministic.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    chars: VecDeque<char>,
    capacity: usize,
    inactivity_timeout: Duration,
    last_mutation: Option<Instant>,
}

impl InputBuffer {
    pub fn new(capacity: usize, inactivity_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            chars: VecDeque::with_capacity(capacity),
            capacity,
            inactivity_timeout,
            last_mutation: None,
        }
    }

    /// Append a character, dropping the oldest ones on overflow.
    pub fn append(&mut self, c: char, now: Instant) {
        while self.chars.len() >= self.capacity {
            self.chars.pop_front();
        }
        self.chars.push_back(c);
        self.last_mutation = Some(now);
    }

    /// Remove the last character; no-op on an empty buffer.
    pub fn remove_last(&mut self, now: Instant) {
        if self.chars.pop_back().is_some() {
            self.last_mutation = Some(now);
        }
    }

    /// Remove up to `n` characters from the end.
    pub fn remove_suffix(&mut self, n: usize, now: Instant) {
        let keep = self.chars.len().saturating_sub(n);
        if keep < self.chars.len() {
            self.chars.truncate(keep);
            self.last_mutation = Some(now);
        }
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.last_mutation = None;
    }

    pub fn snapshot(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// When the inactivity timer fires, if it is armed.
    ///
    /// The timer is only armed while the buffer holds characters.
    pub fn deadline(&self) -> Option<Instant> {
        if self.chars.is_empty() {
            return None;
        }
        self.last_mutation
            .map(|last| last + self.inactivity_timeout)
    }

    /// Clear the buffer if the inactivity timeout has elapsed; returns whether it did.
    pub fn expire_if_idle(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Restart the inactivity timer without changing the contents.
    pub fn touch(&mut self, now: Instant) {
        if !self.chars.is_empty() {
            self.last_mutation = Some(now);
        }
    }
}
