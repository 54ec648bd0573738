//! Shared pool of backend descriptors.
//!
//! A [`Registry`] is built once from the configured backend list and
//! never grows or shrinks. Addresses are immutable and readable without
//! locking. The mutable part of every backend (health flag and routed
//! request counter) lives behind one [`Mutex`] so that probers and
//! request handlers see a single, serialized view of the pool.
//!
//! No method holds the lock across I/O; every critical section is a
//! scan or update over the in-memory list.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::BalancerError;
use crate::selector;

/// A proxy target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    address: String,
}

impl Backend {
    /// `host:port` of the backend.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Mutable state of one backend, copied out of the registry on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStatus {
    pub healthy: bool,
    /// Requests routed to the backend so far. Informational only.
    pub connections: u64,
}

/// Result of routing one request.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// Position in the registry (not in the healthy snapshot).
    pub index: usize,
    pub backend: &'a Backend,
    /// Counter value after this request was counted.
    pub connections: u64,
}

#[derive(Debug)]
pub struct Registry {
    backends: Vec<Backend>,
    status: Mutex<Vec<BackendStatus>>,
}

impl Registry {
    /// Build a registry with every backend unhealthy until its first probe.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backends: Vec<Backend> = addresses
            .into_iter()
            .map(|a| Backend { address: a.into() })
            .collect();
        let status = vec![BackendStatus::default(); backends.len()];
        Self {
            backends,
            status: Mutex::new(status),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// All backends in registry order.
    #[must_use]
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    // A panic while holding the lock cannot leave a half-written entry:
    // every update is a single field store, so the data stays usable.
    fn lock(&self) -> MutexGuard<'_, Vec<BackendStatus>> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently healthy backends, in registry order.
    #[must_use]
    pub fn healthy_snapshot(&self) -> Vec<&Backend> {
        let status = self.lock();
        self.backends
            .iter()
            .zip(status.iter())
            .filter(|(_, s)| s.healthy)
            .map(|(b, _)| b)
            .collect()
    }

    #[must_use]
    pub fn status(&self, index: usize) -> Option<BackendStatus> {
        self.lock().get(index).copied()
    }

    /// Every backend paired with its current state, taken under one lock.
    #[must_use]
    pub fn statuses(&self) -> Vec<(&Backend, BackendStatus)> {
        let status = self.lock();
        self.backends.iter().zip(status.iter().copied()).collect()
    }

    /// Record a probe outcome. Returns the updated state, or `None` for
    /// an out-of-range index.
    pub fn set_health(&self, index: usize, healthy: bool) -> Option<BackendStatus> {
        let mut status = self.lock();
        let entry = status.get_mut(index)?;
        entry.healthy = healthy;
        Some(*entry)
    }

    /// Count one more request against a backend. Returns the new total.
    pub fn increment_connections(&self, index: usize) -> Option<u64> {
        let mut status = self.lock();
        let entry = status.get_mut(index)?;
        entry.connections += 1;
        Some(entry.connections)
    }

    /// Choose the backend for `key` among the healthy ones and count the
    /// request against it.
    ///
    /// Snapshot, selection, and increment happen in one critical section.
    /// Fails with [`BalancerError::NoHealthyBackends`] without invoking
    /// the selector when nothing is healthy.
    pub fn route(&self, key: &str) -> Result<Selection<'_>, BalancerError> {
        let mut status = self.lock();

        let healthy: Vec<usize> = status
            .iter()
            .enumerate()
            .filter(|(_, s)| s.healthy)
            .map(|(i, _)| i)
            .collect();

        let &index = selector::select(&healthy, key).ok_or(BalancerError::NoHealthyBackends)?;

        let entry = &mut status[index];
        entry.connections += 1;

        Ok(Selection {
            index,
            backend: &self.backends[index],
            connections: entry.connections,
        })
    }
}
