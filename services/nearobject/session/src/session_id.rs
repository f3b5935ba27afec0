//! Session identifier generation.

use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of 32-bit session identifiers.
///
/// Ids need not be unique; the device retries when one collides with a live
/// session.
pub trait SessionIdGenerator: Send + Sync + std::fmt::Debug {
    /// Produce the next candidate id
    fn next_id(&self) -> u32;
}

/// Uniformly random ids, never zero
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSessionIdGenerator;

impl SessionIdGenerator for RandomSessionIdGenerator {
    fn next_id(&self) -> u32 {
        rand::thread_rng().gen_range(1..=u32::MAX)
    }
}

/// Monotonically increasing ids, wrapping past `u32::MAX` back to 1
#[derive(Debug)]
pub struct SequentialSessionIdGenerator {
    next: AtomicU32,
}

impl SequentialSessionIdGenerator {
    /// Start counting at `first`
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first.max(1)),
        }
    }
}

impl Default for SequentialSessionIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl SessionIdGenerator for SequentialSessionIdGenerator {
    fn next_id(&self) -> u32 {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            self.next.fetch_add(1, Ordering::Relaxed)
        } else {
            id
        }
    }
}
