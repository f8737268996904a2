use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::repository::RoomRepository;

/// One async mutex per room. Admission holds the room's guard from the
/// overlap read through the commit, so two overlapping requests for the same
/// room are serialized while different rooms never contend.
#[derive(Default)]
pub struct RoomLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, room_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is released before awaiting.
        let mutex = self
            .locks
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the table entry for a deleted room. A holder of the old guard
    /// keeps it until it finishes.
    pub fn forget(&self, room_id: &str) {
        self.locks.remove(room_id);
    }

    /// [`forget`](Self::forget) the entry unless the room still exists.
    /// Called after any locked section on a room that may have been deleted.
    pub fn forget_if_gone(&self, room_id: &str, rooms: &RoomRepository) {
        if rooms.get_by_id(room_id).is_err() {
            self.forget(room_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
