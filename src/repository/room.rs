use std::sync::Arc;

use crate::error::ServiceError;
use crate::model::{Record, RecordKey, RecordType, Room, RoomStatus};
use crate::store::IndexedStore;
use crate::time_range::now_secs;

use super::condition_or_internal;

/// Search bounds for [`RoomRepository::search_with_filters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub floor: Option<u32>,
}

impl RoomFilter {
    fn admits_capacity(&self, capacity: u32) -> bool {
        self.min_capacity.is_none_or(|min| capacity >= min)
            && self.max_capacity.is_none_or(|max| capacity <= max)
    }
}

#[derive(Clone)]
pub struct RoomRepository {
    store: Arc<IndexedStore>,
}

fn sorted(mut rooms: Vec<Room>) -> Vec<Room> {
    rooms.sort_by(|a, b| (a.floor, a.room_number, &a.id).cmp(&(b.floor, b.room_number, &b.id)));
    rooms
}

impl RoomRepository {
    pub fn new(store: Arc<IndexedStore>) -> Self {
        Self { store }
    }

    /// Fails `Conflict` when the id is taken or the room number is already
    /// used on that floor.
    pub async fn create(&self, room: Room) -> Result<(), ServiceError> {
        let id = room.id.clone();
        self.store
            .put_if_absent(Record::Room(room))
            .await
            .map_err(|e| {
                condition_or_internal("create room", e, || {
                    ServiceError::Conflict(format!("room id {id} already exists"))
                })
            })
    }

    pub fn get_by_id(&self, id: &str) -> Result<Room, ServiceError> {
        self.store
            .get(&RecordKey::room(id))
            .and_then(Record::into_room)
            .ok_or_else(|| ServiceError::not_found("room", id))
    }

    /// Ordered by floor, then room number.
    pub fn get_all(&self) -> Vec<Room> {
        sorted(
            self.store
                .scan(RecordType::Room)
                .into_iter()
                .filter_map(Record::into_room)
                .collect(),
        )
    }

    pub async fn update(&self, room: Room) -> Result<(), ServiceError> {
        let id = room.id.clone();
        self.store
            .update_if_exists(Record::Room(room))
            .await
            .map_err(|e| condition_or_internal("update room", e, || ServiceError::not_found("room", &id)))
    }

    /// Conditional delete; `NotFound` if the room was already gone.
    pub async fn delete(&self, id: &str) -> Result<Room, ServiceError> {
        let removed = self
            .store
            .delete_if_exists(&RecordKey::room(id))
            .await
            .map_err(|e| condition_or_internal("delete room", e, || ServiceError::not_found("room", id)))?;
        removed
            .into_room()
            .ok_or_else(|| ServiceError::Internal("delete room failed".into()))
    }

    pub async fn update_availability_status(&self, id: &str, status: RoomStatus) -> Result<Room, ServiceError> {
        let now = now_secs();
        let updated = self
            .store
            .update_with(&RecordKey::room(id), |rec| match rec {
                Record::Room(r) => {
                    let mut r = r.clone();
                    r.status = status;
                    r.updated_at = now;
                    Some(Record::Room(r))
                }
                _ => None,
            })
            .await
            .map_err(|e| condition_or_internal("update room status", e, || ServiceError::not_found("room", id)))?;
        updated
            .into_room()
            .ok_or_else(|| ServiceError::Internal("update room status failed".into()))
    }

    /// Floor given: floor index, capacity checked in process. Capacity only:
    /// capacity index range. Nothing: full partition scan.
    pub fn search_with_filters(&self, filter: RoomFilter) -> Vec<Room> {
        let rooms = match filter {
            RoomFilter { floor: Some(floor), .. } => self
                .store
                .rooms_on_floor(floor)
                .into_iter()
                .filter(|r| filter.admits_capacity(r.capacity))
                .collect(),
            RoomFilter {
                min_capacity: None,
                max_capacity: None,
                floor: None,
            } => return self.get_all(),
            RoomFilter {
                min_capacity,
                max_capacity,
                floor: None,
            } => self.store.rooms_with_capacity(min_capacity, max_capacity),
        };
        sorted(rooms)
    }

    /// Fail-closed: an `Err` here must be treated as "taken" by the caller.
    pub fn check_room_number_exists_on_floor(&self, room_number: u32, floor: u32) -> Result<bool, ServiceError> {
        Ok(self.store.room_with_number(floor, room_number).is_some())
    }
}
