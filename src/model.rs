use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::time_range::{Secs, Span};

/// Server-generated opaque identifier (ULID text).
pub fn new_id() -> String {
    Ulid::new().to_string()
}

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: Secs,
    pub updated_at: Secs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoomStatus {
    #[default]
    Available,
    Unavailable,
    Maintenance,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Available => write!(f, "available"),
            RoomStatus::Unavailable => write!(f, "unavailable"),
            RoomStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    /// Unique within `floor`.
    pub room_number: u32,
    pub capacity: u32,
    pub floor: u32,
    pub amenities: BTreeSet<String>,
    pub status: RoomStatus,
    pub location: String,
    pub description: Option<String>,
    pub created_at: Secs,
    pub updated_at: Secs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    /// Snapshot taken when the booking was admitted.
    pub user_name: String,
    pub room_id: String,
    /// Snapshot taken when the booking was admitted.
    pub room_number: u32,
    pub start_time: Secs,
    pub end_time: Secs,
    pub purpose: String,
    pub status: BookingStatus,
    pub created_at: Secs,
    pub updated_at: Secs,
}

impl Booking {
    /// Only confirmed bookings hold their slot.
    pub fn is_live(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn span(&self) -> Span {
        Span::new(self.start_time, self.end_time)
    }
}

// ── Store records ────────────────────────────────────────────────

/// Partition of the single store namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    User,
    Room,
    Booking,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::User => write!(f, "USER"),
            RecordType::Room => write!(f, "ROOM"),
            RecordType::Booking => write!(f, "BOOKING"),
        }
    }
}

/// Composite key: partition = record type, sort = record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: RecordType,
    pub id: String,
}

impl RecordKey {
    pub fn user(id: &str) -> Self {
        Self { kind: RecordType::User, id: id.to_string() }
    }

    pub fn room(id: &str) -> Self {
        Self { kind: RecordType::Room, id: id.to_string() }
    }

    pub fn booking(id: &str) -> Self {
        Self { kind: RecordType::Booking, id: id.to_string() }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    User(User),
    Room(Room),
    Booking(Booking),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::User(u) => RecordKey::user(&u.id),
            Record::Room(r) => RecordKey::room(&r.id),
            Record::Booking(b) => RecordKey::booking(&b.id),
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Record::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn into_room(self) -> Option<Room> {
        match self {
            Record::Room(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_booking(self) -> Option<Booking> {
        match self {
            Record::Booking(b) => Some(b),
            _ => None,
        }
    }
}

/// Record log entry format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    Put(Record),
    Delete(RecordKey),
}

// ── Requests ─────────────────────────────────────────────────────

/// Caller-supplied fields of a reservation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub user_id: String,
    pub room_id: String,
    pub start_time: Secs,
    pub end_time: Secs,
    pub purpose: String,
}

/// Caller-supplied fields of a room; id and timestamps are assigned on create.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomDraft {
    pub name: String,
    pub room_number: u32,
    pub capacity: u32,
    pub floor: u32,
    pub amenities: BTreeSet<String>,
    pub status: Option<RoomStatus>,
    pub location: String,
    pub description: Option<String>,
}

/// Authenticated caller identity attached by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingWithDetails {
    pub booking: Booking,
    pub user_email: String,
    pub room_name: String,
}

/// Per-item outcome of a best-effort join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Joined<T> {
    Complete(T),
    Omitted { booking_id: String, reason: String },
}

impl<T> Joined<T> {
    pub fn complete(self) -> Option<T> {
        match self {
            Joined::Complete(v) => Some(v),
            Joined::Omitted { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Joined::Complete(_))
    }
}

/// Outcome of the per-slot user name lookup in a schedule view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UserLookup {
    Found(String),
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSlot {
    pub start_time: Secs,
    pub end_time: Secs,
    pub booking_id: String,
    pub purpose: String,
    pub user: UserLookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSchedule {
    pub room_id: String,
    pub room_name: String,
    pub room_number: u32,
    /// Day bucket (start of the UTC day).
    pub date: Secs,
    /// Occupied slots, ordered by start time.
    pub slots: Vec<ScheduleSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: new_id(),
            user_id: "u".into(),
            user_name: "Ada".into(),
            room_id: "r".into(),
            room_number: 101,
            start_time: 1000,
            end_time: 2000,
            purpose: "sync".into(),
            status,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn record_key_matches_variant() {
        let b = booking(BookingStatus::Confirmed);
        let rec = Record::Booking(b.clone());
        assert_eq!(rec.key(), RecordKey::booking(&b.id));
        assert_eq!(rec.key().to_string(), format!("BOOKING#{}", b.id));
    }

    #[test]
    fn only_confirmed_is_live() {
        assert!(booking(BookingStatus::Confirmed).is_live());
        assert!(!booking(BookingStatus::Cancelled).is_live());
    }

    #[test]
    fn record_downcasts() {
        let rec = Record::Booking(booking(BookingStatus::Confirmed));
        assert!(rec.clone().into_room().is_none());
        assert!(rec.into_booking().is_some());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
        assert_eq!(new_id().len(), 26);
    }

    #[test]
    fn store_event_bincode_roundtrip() {
        let event = StoreEvent::Put(Record::Booking(booking(BookingStatus::Cancelled)));
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: StoreEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn joined_accessors() {
        let ok: Joined<u8> = Joined::Complete(3);
        assert!(ok.is_complete());
        assert_eq!(ok.complete(), Some(3));
        let gone: Joined<u8> = Joined::Omitted { booking_id: "b".into(), reason: "room gone".into() };
        assert!(!gone.is_complete());
        assert_eq!(gone.complete(), None);
    }
}
