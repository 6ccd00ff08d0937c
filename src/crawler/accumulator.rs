//! Job-wide duplicate-free result accumulator
//!
//! Shared by every fetch worker of a job. The seen-id set, the ordered result
//! list and the capacity check are updated under one lock per offer, so two
//! workers can never both claim the last slot or add the same id twice.

use crate::model::Repository;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of offering one repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Newly kept; `total` is the kept count including this one
    Added { total: usize },

    /// Id was already seen by this job
    Duplicate,

    /// New id, but the target is already met; the id still counts as seen
    Full,
}

#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<i64>,
    entities: Vec<Repository>,
}

/// Concurrency-safe dedup set plus insertion-ordered result list
#[derive(Debug)]
pub struct DedupAccumulator {
    capacity: Option<usize>,
    inner: Mutex<Inner>,
}

impl DedupAccumulator {
    /// Creates an accumulator that keeps at most `target` repositories
    pub fn new(target: usize) -> Self {
        Self {
            capacity: Some(target),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Creates an accumulator with no ceiling
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    // The critical sections never panic midway, so a poisoned lock still
    // guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offers one repository
    ///
    /// Dedup and the capacity check happen in a single critical section.
    pub fn offer(&self, repository: Repository) -> Admission {
        let mut inner = self.lock();

        if !inner.seen.insert(repository.id) {
            return Admission::Duplicate;
        }
        if self.capacity.is_some_and(|cap| inner.entities.len() >= cap) {
            return Admission::Full;
        }

        inner.entities.push(repository);
        Admission::Added {
            total: inner.entities.len(),
        }
    }

    /// Returns true if the repository was newly kept
    pub fn try_add(&self, repository: Repository) -> bool {
        matches!(self.offer(repository), Admission::Added { .. })
    }

    /// Number of kept repositories
    pub fn len(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once the kept count has reached the target
    pub fn is_full(&self) -> bool {
        match self.capacity {
            Some(cap) => self.lock().entities.len() >= cap,
            None => false,
        }
    }

    /// Distinct ids observed, including those rejected as over capacity
    pub fn total_seen(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Takes the kept repositories in first-found order
    ///
    /// Seen ids are retained, so a drained accumulator still rejects duplicates.
    pub fn drain(&self) -> Vec<Repository> {
        std::mem::take(&mut self.lock().entities)
    }
}
