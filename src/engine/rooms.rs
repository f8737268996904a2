use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::error::ServiceError;
use crate::limits::*;
use crate::model::{new_id, Room, RoomDraft, RoomStatus};
use crate::repository::{BookingRepository, RoomFilter, RoomRepository};
use crate::time_range::{now_secs, Span};

use super::RoomLocks;

/// Room administration and search.
#[derive(Clone)]
pub struct RoomService {
    rooms: RoomRepository,
    bookings: BookingRepository,
    locks: Arc<RoomLocks>,
}

struct CleanDraft {
    name: String,
    location: String,
    description: Option<String>,
    amenities: BTreeSet<String>,
}

fn clean(draft: &RoomDraft) -> Result<CleanDraft, ServiceError> {
    let name = draft.name.trim().to_string();
    let location = draft.location.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("room name is required".into()));
    }
    if location.is_empty() {
        return Err(ServiceError::InvalidInput("room location is required".into()));
    }
    if name.len() > MAX_NAME_LEN || location.len() > MAX_LOCATION_LEN {
        return Err(ServiceError::InvalidInput("room name or location too long".into()));
    }
    if draft.capacity == 0 {
        return Err(ServiceError::InvalidInput("capacity must be positive".into()));
    }
    if draft.room_number == 0 {
        return Err(ServiceError::InvalidInput("room number must be positive".into()));
    }
    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    if description.as_ref().is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN) {
        return Err(ServiceError::InvalidInput("description too long".into()));
    }
    let amenities: BTreeSet<String> = draft
        .amenities
        .iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if amenities.len() > MAX_AMENITIES || amenities.iter().any(|a| a.len() > MAX_AMENITY_LEN) {
        return Err(ServiceError::InvalidInput("too many or too long amenities".into()));
    }
    Ok(CleanDraft {
        name,
        location,
        description,
        amenities,
    })
}

impl RoomService {
    pub fn new(rooms: RoomRepository, bookings: BookingRepository, locks: Arc<RoomLocks>) -> Self {
        Self { rooms, bookings, locks }
    }

    /// Create a room from a draft. The number-on-floor pre-check fails
    /// closed; the store's unique index catches any create that races past it.
    pub async fn add_room(&self, draft: RoomDraft) -> Result<Room, ServiceError> {
        let clean = clean(&draft)?;
        if self
            .rooms
            .check_room_number_exists_on_floor(draft.room_number, draft.floor)?
        {
            return Err(ServiceError::Conflict(format!(
                "room number {} already exists on floor {}",
                draft.room_number, draft.floor
            )));
        }

        let now = now_secs();
        let room = Room {
            id: new_id(),
            name: clean.name,
            room_number: draft.room_number,
            capacity: draft.capacity,
            floor: draft.floor,
            amenities: clean.amenities,
            status: draft.status.unwrap_or_default(),
            location: clean.location,
            description: clean.description,
            created_at: now,
            updated_at: now,
        };
        self.rooms.create(room.clone()).await?;
        info!(room_id = %room.id, floor = room.floor, room_number = room.room_number, "room added");
        Ok(room)
    }

    /// `NotFound` when no room exists at all.
    pub fn get_all_rooms(&self) -> Result<Vec<Room>, ServiceError> {
        let rooms = self.rooms.get_all();
        if rooms.is_empty() {
            return Err(ServiceError::not_found("room", "*"));
        }
        Ok(rooms)
    }

    pub fn get_room_by_id(&self, room_id: &str) -> Result<Room, ServiceError> {
        if room_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("room id is required".into()));
        }
        self.rooms.get_by_id(room_id)
    }

    /// Replace the editable fields of an existing room. Moving it onto a
    /// number already used on the target floor fails `Conflict`.
    pub async fn update_room(&self, room_id: &str, draft: RoomDraft) -> Result<Room, ServiceError> {
        let clean = clean(&draft)?;
        let current = self.get_room_by_id(room_id)?;
        let moved = (current.floor, current.room_number) != (draft.floor, draft.room_number);
        if moved
            && self
                .rooms
                .check_room_number_exists_on_floor(draft.room_number, draft.floor)?
        {
            return Err(ServiceError::Conflict(format!(
                "room number {} already exists on floor {}",
                draft.room_number, draft.floor
            )));
        }
        let room = Room {
            name: clean.name,
            room_number: draft.room_number,
            capacity: draft.capacity,
            floor: draft.floor,
            amenities: clean.amenities,
            status: draft.status.unwrap_or(current.status),
            location: clean.location,
            description: clean.description,
            updated_at: now_secs(),
            ..current
        };
        self.rooms.update(room.clone()).await?;
        Ok(room)
    }

    pub async fn set_room_status(&self, room_id: &str, status: RoomStatus) -> Result<Room, ServiceError> {
        let room = self.rooms.update_availability_status(room_id, status).await?;
        info!(room_id, %status, "room status changed");
        Ok(room)
    }

    /// Deletes the room only. Its bookings stay and show up as omitted
    /// items in detail views.
    pub async fn delete_room(&self, room_id: &str) -> Result<Room, ServiceError> {
        if room_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("room id is required".into()));
        }
        // Unknown ids never get a lock entry.
        self.rooms.get_by_id(room_id)?;
        let result = {
            let _guard = self.locks.lock(room_id).await;
            self.rooms.delete(room_id).await
        };
        self.locks.forget_if_gone(room_id, &self.rooms);
        let room = result?;
        info!(room_id, "room deleted");
        Ok(room)
    }

    /// Rooms matching the capacity/floor filter. With a window, rooms holding
    /// a live booking that overlaps it are left out.
    pub fn search_rooms(&self, filter: RoomFilter, window: Option<Span>) -> Result<Vec<Room>, ServiceError> {
        if let (Some(min), Some(max)) = (filter.min_capacity, filter.max_capacity)
            && min > max
        {
            return Err(ServiceError::InvalidInput("min_capacity exceeds max_capacity".into()));
        }
        let mut rooms = self.rooms.search_with_filters(filter);
        if let Some(w) = window {
            rooms.retain(|r| {
                self.bookings
                    .get_by_room_and_time_window(&r.id, w.start, w.end)
                    .is_empty()
            });
        }
        Ok(rooms)
    }
}
