// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-process discardable handle registry playing both transport roles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use glifo::remote::{
    CacheMissKind, ClientDiscardableManager, DiscardableHandleId, ServerDiscardableManager,
};

#[derive(Default)]
struct HandleState {
    locks: usize,
    deleted: bool,
}

#[derive(Default)]
struct Registry {
    next_handle: u32,
    handles: HashMap<u32, HandleState>,
}

/// Handle registry shared by a server and client pair, with miss counters.
///
/// Handles are created locked. Tests call [`unlock_all`](Self::unlock_all)
/// to stand in for the embedder's end-of-interval acknowledgement; until
/// then no handle can be deleted and every pinned strike stays resident.
#[derive(Default)]
pub(crate) struct TrackingManager {
    registry: Mutex<Registry>,
    misses: [AtomicUsize; 6],
}

impl TrackingManager {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Releases every lock on every live handle.
    pub(crate) fn unlock_all(&self) {
        let mut registry = self.registry.lock().unwrap();
        for handle in registry.handles.values_mut() {
            handle.locks = 0;
        }
    }

    pub(crate) fn miss_count(&self, kind: CacheMissKind) -> usize {
        self.misses[kind as usize].load(Ordering::Relaxed)
    }

    pub(crate) fn total_misses(&self) -> usize {
        CacheMissKind::ALL
            .iter()
            .map(|&kind| self.miss_count(kind))
            .sum()
    }
}

impl ServerDiscardableManager for TrackingManager {
    fn create_handle(&self) -> DiscardableHandleId {
        let mut registry = self.registry.lock().unwrap();
        registry.next_handle += 1;
        let id = registry.next_handle;
        registry.handles.insert(
            id,
            HandleState {
                locks: 1,
                deleted: false,
            },
        );
        DiscardableHandleId::new(id)
    }

    fn lock_handle(&self, handle: DiscardableHandleId) -> bool {
        let mut registry = self.registry.lock().unwrap();
        match registry.handles.get_mut(&handle.to_u32()) {
            Some(state) if !state.deleted => {
                state.locks += 1;
                true
            }
            _ => false,
        }
    }
}

impl ClientDiscardableManager for TrackingManager {
    fn delete_handle(&self, handle: DiscardableHandleId) -> bool {
        let mut registry = self.registry.lock().unwrap();
        match registry.handles.get_mut(&handle.to_u32()) {
            Some(state) => {
                if state.locks > 0 {
                    return false;
                }
                state.deleted = true;
                true
            }
            None => true,
        }
    }

    fn notify_cache_miss(&self, kind: CacheMissKind) {
        self.misses[kind as usize].fetch_add(1, Ordering::Relaxed);
    }
}
