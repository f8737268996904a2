use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::model::{Booking, Record, Room, User};
use crate::time_range::{day_bucket, Secs};

/// `(start_time, booking_id)`, ordered by start.
pub(super) type StartEntry = (Secs, String);
/// `(room_id, start_time, booking_id)` inside one day bucket.
pub(super) type DayEntry = (String, Secs, String);

/// Secondary access paths over the primary record map.
///
/// Entries are id references only; readers resolve them against the primary
/// map and skip ids that have since disappeared.
#[derive(Default)]
pub(super) struct Indexes {
    booking_by_room: DashMap<String, BTreeSet<StartEntry>>,
    booking_by_user: DashMap<String, BTreeSet<StartEntry>>,
    booking_by_day: RwLock<BTreeMap<Secs, BTreeSet<DayEntry>>>,
    /// Longest booking ever indexed on the room. Only grows while the room
    /// has bookings; dropped once its last booking is removed.
    longest_on_room: DashMap<String, Secs>,
    room_by_floor: DashMap<u32, BTreeSet<String>>,
    room_by_capacity: RwLock<BTreeMap<u32, BTreeSet<String>>>,
    /// Unique: `(floor, room_number)` → room id.
    room_number_on_floor: DashMap<(u32, u32), String>,
    user_by_email: DashMap<String, String>,
}

fn add_to<K, V>(map: &DashMap<K, BTreeSet<V>>, key: K, value: V)
where
    K: Eq + Hash,
    V: Ord,
{
    map.entry(key).or_default().insert(value);
}

fn remove_from<K, V>(map: &DashMap<K, BTreeSet<V>>, key: &K, value: &V)
where
    K: Eq + Hash,
    V: Ord,
{
    if let Some(mut set) = map.get_mut(key) {
        set.remove(value);
    }
    map.remove_if(key, |_, set| set.is_empty());
}

impl Indexes {
    pub(super) fn insert(&self, record: &Record) {
        match record {
            Record::Booking(b) => self.insert_booking(b),
            Record::Room(r) => self.insert_room(r),
            Record::User(u) => self.insert_user(u),
        }
    }

    pub(super) fn remove(&self, record: &Record) {
        match record {
            Record::Booking(b) => self.remove_booking(b),
            Record::Room(r) => self.remove_room(r),
            Record::User(u) => self.remove_user(u),
        }
    }

    fn insert_booking(&self, b: &Booking) {
        // Length first, so a window scan never sees the entry without it.
        let length = b.end_time.saturating_sub(b.start_time);
        self.longest_on_room
            .entry(b.room_id.clone())
            .and_modify(|l| *l = (*l).max(length))
            .or_insert(length);
        add_to(&self.booking_by_room, b.room_id.clone(), (b.start_time, b.id.clone()));
        add_to(&self.booking_by_user, b.user_id.clone(), (b.start_time, b.id.clone()));
        self.booking_by_day
            .write()
            .entry(day_bucket(b.start_time))
            .or_default()
            .insert((b.room_id.clone(), b.start_time, b.id.clone()));
    }

    fn remove_booking(&self, b: &Booking) {
        let entry = (b.start_time, b.id.clone());
        remove_from(&self.booking_by_room, &b.room_id, &entry);
        remove_from(&self.booking_by_user, &b.user_id, &entry);
        if !self.booking_by_room.contains_key(&b.room_id) {
            self.longest_on_room.remove(&b.room_id);
        }

        let day = day_bucket(b.start_time);
        let mut days = self.booking_by_day.write();
        if let Some(set) = days.get_mut(&day) {
            set.remove(&(b.room_id.clone(), b.start_time, b.id.clone()));
            if set.is_empty() {
                days.remove(&day);
            }
        }
    }

    fn insert_room(&self, r: &Room) {
        add_to(&self.room_by_floor, r.floor, r.id.clone());
        self.room_by_capacity
            .write()
            .entry(r.capacity)
            .or_default()
            .insert(r.id.clone());
        self.room_number_on_floor
            .insert((r.floor, r.room_number), r.id.clone());
    }

    fn remove_room(&self, r: &Room) {
        remove_from(&self.room_by_floor, &r.floor, &r.id);
        let mut caps = self.room_by_capacity.write();
        if let Some(set) = caps.get_mut(&r.capacity) {
            set.remove(&r.id);
            if set.is_empty() {
                caps.remove(&r.capacity);
            }
        }
        drop(caps);
        self.room_number_on_floor
            .remove_if(&(r.floor, r.room_number), |_, id| id == &r.id);
    }

    fn insert_user(&self, u: &User) {
        self.user_by_email.insert(u.email.to_lowercase(), u.id.clone());
    }

    fn remove_user(&self, u: &User) {
        self.user_by_email
            .remove_if(&u.email.to_lowercase(), |_, id| id == &u.id);
    }

    // ── Scans ────────────────────────────────────────────────

    pub(super) fn bookings_for_room(&self, room_id: &str) -> Vec<String> {
        self.booking_by_room
            .get(room_id)
            .map(|set| set.iter().map(|(_, id)| id.clone()).collect())
            .unwrap_or_default()
    }

    /// Bookings on `room_id` that can overlap `[start, end)`: those starting
    /// before `end` and no earlier than `start` minus the room's longest
    /// booking. Without a recorded length the lower bound is open.
    pub(super) fn bookings_for_room_in_window(&self, room_id: &str, start: Secs, end: Secs) -> Vec<String> {
        let from = self
            .longest_on_room
            .get(room_id)
            .map_or(Secs::MIN, |l| start.saturating_sub(*l));
        if from >= end {
            return Vec::new();
        }
        self.booking_by_room
            .get(room_id)
            .map(|set| {
                set.range((from, String::new())..(end, String::new()))
                    .map(|(_, id)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(super) fn bookings_for_user(&self, user_id: &str) -> Vec<String> {
        self.booking_by_user
            .get(user_id)
            .map(|set| set.iter().map(|(_, id)| id.clone()).collect())
            .unwrap_or_default()
    }

    /// Bookings on `room_id` that start inside the day bucket `day`, by start.
    pub(super) fn bookings_for_room_on_day(&self, room_id: &str, day: Secs) -> Vec<String> {
        let days = self.booking_by_day.read();
        let Some(set) = days.get(&day) else {
            return Vec::new();
        };
        set.range((room_id.to_string(), Secs::MIN, String::new())..)
            .take_while(|(room, _, _)| room == room_id)
            .map(|(_, _, id)| id.clone())
            .collect()
    }

    /// Bookings in every day bucket that intersects `[start, end)`; coarser
    /// than the window at the first bucket.
    pub(super) fn bookings_in_day_buckets(&self, start: Secs, end: Secs) -> Vec<String> {
        if start >= end {
            return Vec::new();
        }
        let days = self.booking_by_day.read();
        days.range(day_bucket(start)..end)
            .flat_map(|(_, set)| set.iter().map(|(_, _, id)| id.clone()))
            .collect()
    }

    pub(super) fn rooms_on_floor(&self, floor: u32) -> Vec<String> {
        self.room_by_floor
            .get(&floor)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(super) fn rooms_with_capacity(&self, min: Option<u32>, max: Option<u32>) -> Vec<String> {
        let lo = min.unwrap_or(0);
        let hi = max.unwrap_or(u32::MAX);
        if lo > hi {
            return Vec::new();
        }
        self.room_by_capacity
            .read()
            .range(lo..=hi)
            .flat_map(|(_, set)| set.iter().cloned())
            .collect()
    }

    pub(super) fn room_with_number(&self, floor: u32, room_number: u32) -> Option<String> {
        self.room_number_on_floor
            .get(&(floor, room_number))
            .map(|e| e.value().clone())
    }

    pub(super) fn user_with_email(&self, email: &str) -> Option<String> {
        self.user_by_email
            .get(&email.to_lowercase())
            .map(|e| e.value().clone())
    }
}
