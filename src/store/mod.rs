//! Single-namespace record store with secondary indexes.
//!
//! Every record lives in one primary map keyed by [`RecordKey`]. Secondary
//! indexes (booking by room / user / day, room by floor / capacity, room
//! number on floor, user by email) are kept in step on every write. Writes go
//! to the record log first and become visible only after the log accepted
//! them.
//!
//! Conditional writes are serialised per key through striped async gates.
//! All room writes share one gate so the `(floor, room_number)` constraint is
//! checked and applied atomically; user writes share another for email.

mod error;
mod index;
mod writer;

pub use error::StoreError;

use std::collections::BTreeSet;
use std::hash::{BuildHasher, RandomState};
use std::io;
use std::path::Path;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};

use crate::limits::MAX_BATCH_WRITE;
use crate::model::*;
use crate::time_range::Secs;
use crate::wal::Wal;

use index::Indexes;
use writer::{log_writer_loop, LogCommand};

const WRITE_STRIPES: usize = 64;

pub struct IndexedStore {
    records: DashMap<RecordKey, Record>,
    indexes: Indexes,
    log_tx: Option<mpsc::Sender<LogCommand>>,
    stripes: Vec<Mutex<()>>,
    room_gate: Mutex<()>,
    user_gate: Mutex<()>,
    hasher: RandomState,
}

impl IndexedStore {
    /// A store without a record log. Nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            records: DashMap::new(),
            indexes: Indexes::default(),
            log_tx: None,
            stripes: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
            room_gate: Mutex::new(()),
            user_gate: Mutex::new(()),
            hasher: RandomState::new(),
        }
    }

    /// Replay the log at `path` and start its group-commit writer.
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (log_tx, log_rx) = mpsc::channel(4096);
        tokio::spawn(log_writer_loop(wal, log_rx));

        let mut store = Self::in_memory();
        store.log_tx = Some(log_tx);
        for event in &events {
            store.apply(event);
        }
        tracing::info!(
            path = %path.display(),
            events = events.len(),
            records = store.records.len(),
            "record log replayed"
        );
        Ok(store)
    }

    pub fn is_durable(&self) -> bool {
        self.log_tx.is_some()
    }

    fn apply(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Put(record) => {
                if let Some(old) = self.records.insert(record.key(), record.clone()) {
                    self.indexes.remove(&old);
                }
                self.indexes.insert(record);
            }
            StoreEvent::Delete(key) => {
                if let Some((_, old)) = self.records.remove(key) {
                    self.indexes.remove(&old);
                }
            }
        }
    }

    async fn log_append(&self, events: &[StoreEvent]) -> Result<(), StoreError> {
        let Some(log_tx) = &self.log_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        log_tx
            .send(LogCommand::Append {
                events: events.to_vec(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Log("log writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Log("log writer dropped response".into()))?
            .map_err(|e| StoreError::Log(e.to_string()))
    }

    /// Log, then apply. Caller holds the gate(s) for every key touched.
    async fn commit(&self, events: Vec<StoreEvent>) -> Result<(), StoreError> {
        self.log_append(&events).await?;
        for event in &events {
            self.apply(event);
        }
        metrics::gauge!(crate::observability::STORE_RECORDS).set(self.records.len() as f64);
        Ok(())
    }

    fn stripe_of(&self, key: &RecordKey) -> usize {
        (self.hasher.hash_one(key) as usize) % WRITE_STRIPES
    }

    async fn gate(&self, key: &RecordKey) -> MutexGuard<'_, ()> {
        match key.kind {
            RecordType::Room => self.room_gate.lock().await,
            RecordType::User => self.user_gate.lock().await,
            RecordType::Booking => self.stripes[self.stripe_of(key)].lock().await,
        }
    }

    /// Unique secondary keys: a room's `(floor, room_number)` and a user's
    /// email must be free or already ours.
    fn check_unique(&self, record: &Record) -> Result<(), StoreError> {
        match record {
            Record::Room(room) => {
                if let Some(existing) = self.indexes.room_with_number(room.floor, room.room_number)
                    && existing != room.id
                {
                    return Err(StoreError::UniqueViolation {
                        floor: room.floor,
                        room_number: room.room_number,
                        existing,
                    });
                }
            }
            Record::User(user) => {
                if let Some(existing) = self.indexes.user_with_email(&user.email)
                    && existing != user.id
                {
                    return Err(StoreError::EmailTaken {
                        email: user.email.clone(),
                        existing,
                    });
                }
            }
            Record::Booking(_) => {}
        }
        Ok(())
    }

    // ── Writes ───────────────────────────────────────────────

    /// Unconditional upsert (still subject to the unique secondary keys).
    pub async fn put(&self, record: Record) -> Result<(), StoreError> {
        let key = record.key();
        let _gate = self.gate(&key).await;
        self.check_unique(&record)?;
        self.commit(vec![StoreEvent::Put(record)]).await
    }

    /// Insert; fails `ConditionFailed` if the key is already occupied.
    pub async fn put_if_absent(&self, record: Record) -> Result<(), StoreError> {
        let key = record.key();
        let _gate = self.gate(&key).await;
        if self.records.contains_key(&key) {
            return Err(StoreError::ConditionFailed(key));
        }
        self.check_unique(&record)?;
        self.commit(vec![StoreEvent::Put(record)]).await
    }

    /// Replace an existing record; fails `ConditionFailed` if absent.
    pub async fn update_if_exists(&self, record: Record) -> Result<(), StoreError> {
        let key = record.key();
        self.update_with(&key, move |_| Some(record)).await.map(|_| ())
    }

    /// Read-modify-write under the key's gate. `f` returning `None` means the
    /// precondition did not hold and nothing is written.
    pub async fn update_with<F>(&self, key: &RecordKey, f: F) -> Result<Record, StoreError>
    where
        F: FnOnce(&Record) -> Option<Record>,
    {
        let _gate = self.gate(key).await;
        let current = self
            .get(key)
            .ok_or_else(|| StoreError::ConditionFailed(key.clone()))?;
        let next = f(&current).ok_or_else(|| StoreError::ConditionFailed(key.clone()))?;
        if next.key() != *key {
            return Err(StoreError::ConditionFailed(key.clone()));
        }
        self.check_unique(&next)?;
        self.commit(vec![StoreEvent::Put(next.clone())]).await?;
        Ok(next)
    }

    /// Delete and return the removed record; fails `ConditionFailed` if already gone.
    pub async fn delete_if_exists(&self, key: &RecordKey) -> Result<Record, StoreError> {
        let _gate = self.gate(key).await;
        let old = self
            .get(key)
            .ok_or_else(|| StoreError::ConditionFailed(key.clone()))?;
        self.commit(vec![StoreEvent::Delete(key.clone())]).await?;
        Ok(old)
    }

    /// Delete up to `MAX_BATCH_WRITE` keys in one log append. Keys already
    /// gone are skipped; returns how many were removed.
    pub async fn batch_delete(&self, keys: &[RecordKey]) -> Result<usize, StoreError> {
        if keys.len() > MAX_BATCH_WRITE {
            return Err(StoreError::BatchTooLarge(keys.len()));
        }
        // Gates in a fixed order (room, user, then stripes ascending) so two
        // batches can never wait on each other.
        let _room = if keys.iter().any(|k| k.kind == RecordType::Room) {
            Some(self.room_gate.lock().await)
        } else {
            None
        };
        let _user = if keys.iter().any(|k| k.kind == RecordType::User) {
            Some(self.user_gate.lock().await)
        } else {
            None
        };
        let mut stripes: Vec<usize> = keys
            .iter()
            .filter(|k| !matches!(k.kind, RecordType::Room | RecordType::User))
            .map(|k| self.stripe_of(k))
            .collect();
        stripes.sort_unstable();
        stripes.dedup();
        let mut _held = Vec::with_capacity(stripes.len());
        for s in stripes {
            _held.push(self.stripes[s].lock().await);
        }

        let present: BTreeSet<&RecordKey> = keys
            .iter()
            .filter(|k| self.records.contains_key(*k))
            .collect();
        let events: Vec<StoreEvent> = present
            .into_iter()
            .map(|k| StoreEvent::Delete(k.clone()))
            .collect();
        let removed = events.len();
        if removed > 0 {
            self.commit(events).await?;
        }
        Ok(removed)
    }

    // ── Point reads / partition scans ────────────────────────

    pub fn get(&self, key: &RecordKey) -> Option<Record> {
        self.records.get(key).map(|e| e.value().clone())
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Every record in one partition.
    pub fn scan(&self, kind: RecordType) -> Vec<Record> {
        self.records
            .iter()
            .filter(|e| e.key().kind == kind)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn count(&self, kind: RecordType) -> usize {
        self.records.iter().filter(|e| e.key().kind == kind).count()
    }

    fn bookings(&self, ids: Vec<String>) -> Vec<Booking> {
        ids.iter()
            .filter_map(|id| self.get(&RecordKey::booking(id)))
            .filter_map(Record::into_booking)
            .collect()
    }

    fn rooms(&self, ids: Vec<String>) -> Vec<Room> {
        ids.iter()
            .filter_map(|id| self.get(&RecordKey::room(id)))
            .filter_map(Record::into_room)
            .collect()
    }

    // ── Index queries ────────────────────────────────────────

    /// All bookings on a room, ordered by start.
    pub fn bookings_for_room(&self, room_id: &str) -> Vec<Booking> {
        self.bookings(self.indexes.bookings_for_room(room_id))
    }

    /// Bookings on a room that may overlap `[start, end)`, ordered by start.
    /// A superset: the caller still checks each interval. Bookings that ended
    /// longer ago than the room's longest booking are never loaded.
    pub fn bookings_for_room_in_window(&self, room_id: &str, start: Secs, end: Secs) -> Vec<Booking> {
        self.bookings(self.indexes.bookings_for_room_in_window(room_id, start, end))
    }

    pub fn bookings_for_user(&self, user_id: &str) -> Vec<Booking> {
        self.bookings(self.indexes.bookings_for_user(user_id))
    }

    /// Bookings on a room whose start falls in the day bucket `day`.
    pub fn bookings_for_room_on_day(&self, room_id: &str, day: Secs) -> Vec<Booking> {
        self.bookings(self.indexes.bookings_for_room_on_day(room_id, day))
    }

    /// Bookings from every day bucket intersecting `[start, end)`. Coarse:
    /// the first bucket may contain bookings starting before `start`.
    pub fn bookings_in_day_buckets(&self, start: Secs, end: Secs) -> Vec<Booking> {
        self.bookings(self.indexes.bookings_in_day_buckets(start, end))
    }

    pub fn rooms_on_floor(&self, floor: u32) -> Vec<Room> {
        self.rooms(self.indexes.rooms_on_floor(floor))
    }

    pub fn rooms_with_capacity(&self, min: Option<u32>, max: Option<u32>) -> Vec<Room> {
        self.rooms(self.indexes.rooms_with_capacity(min, max))
    }

    pub fn room_with_number(&self, floor: u32, room_number: u32) -> Option<Room> {
        self.indexes
            .room_with_number(floor, room_number)
            .and_then(|id| self.get(&RecordKey::room(&id)))
            .and_then(Record::into_room)
    }

    pub fn user_with_email(&self, email: &str) -> Option<User> {
        self.indexes
            .user_with_email(email)
            .and_then(|id| self.get(&RecordKey::user(&id)))
            .and_then(Record::into_user)
    }

    // ── Log maintenance ──────────────────────────────────────

    /// Rewrite the log as one `Put` per live record. Holds every write gate
    /// for the duration so no acknowledged write can fall between the
    /// snapshot and the swap.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let Some(log_tx) = &self.log_tx else {
            return Ok(());
        };
        let _room = self.room_gate.lock().await;
        let _user = self.user_gate.lock().await;
        let mut _held = Vec::with_capacity(WRITE_STRIPES);
        for stripe in &self.stripes {
            _held.push(stripe.lock().await);
        }

        let mut records: Vec<Record> = self.records.iter().map(|e| e.value().clone()).collect();
        records.sort_by_key(Record::key);
        let len = records.len();
        let snapshot = records.into_iter().map(StoreEvent::Put).collect();

        let (tx, rx) = oneshot::channel();
        log_tx
            .send(LogCommand::Compact { snapshot, response: tx })
            .await
            .map_err(|_| StoreError::Log("log writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Log("log writer dropped response".into()))?
            .map_err(|e| StoreError::Log(e.to_string()))?;
        tracing::info!(records = len, "record log compacted");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let Some(log_tx) = &self.log_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if log_tx
            .send(LogCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::time_range::SECONDS_PER_DAY;

    fn test_log_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roombook_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn room(id: &str, floor: u32, number: u32, capacity: u32) -> Room {
        Room {
            id: id.into(),
            name: format!("Room {number}"),
            room_number: number,
            capacity,
            floor,
            amenities: BTreeSet::new(),
            status: RoomStatus::Available,
            location: "HQ".into(),
            description: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn booking(id: &str, room_id: &str, user_id: &str, start: Secs, end: Secs) -> Booking {
        Booking {
            id: id.into(),
            user_id: user_id.into(),
            user_name: "Ada".into(),
            room_id: room_id.into(),
            room_number: 101,
            start_time: start,
            end_time: end,
            purpose: "standup".into(),
            status: BookingStatus::Confirmed,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn ids(bookings: &[Booking]) -> Vec<&str> {
        bookings.iter().map(|b| b.id.as_str()).collect()
    }

    #[tokio::test]
    async fn put_if_absent_rejects_existing_key() {
        let store = IndexedStore::in_memory();
        store.put_if_absent(Record::Room(room("r1", 1, 101, 4))).await.unwrap();
        let err = store
            .put_if_absent(Record::Room(room("r1", 2, 202, 4)))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::ConditionFailed(RecordKey::room("r1")));
    }

    #[tokio::test]
    async fn room_number_unique_per_floor() {
        let store = IndexedStore::in_memory();
        store.put_if_absent(Record::Room(room("r1", 1, 101, 4))).await.unwrap();
        let err = store
            .put_if_absent(Record::Room(room("r2", 1, 101, 8)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { floor: 1, room_number: 101, .. }));
        // Same number on a different floor is fine.
        store.put_if_absent(Record::Room(room("r3", 2, 101, 8))).await.unwrap();
    }

    #[tokio::test]
    async fn room_update_may_keep_own_number_but_not_take_another() {
        let store = IndexedStore::in_memory();
        store.put_if_absent(Record::Room(room("r1", 1, 101, 4))).await.unwrap();
        store.put_if_absent(Record::Room(room("r2", 1, 102, 4))).await.unwrap();

        store.update_if_exists(Record::Room(room("r1", 1, 101, 6))).await.unwrap();
        let err = store
            .update_if_exists(Record::Room(room("r1", 1, 102, 6)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        // Moving r1 frees 101 for someone else.
        store.update_if_exists(Record::Room(room("r1", 1, 103, 6))).await.unwrap();
        store.put_if_absent(Record::Room(room("r4", 1, 101, 2))).await.unwrap();
    }

    #[tokio::test]
    async fn update_if_exists_requires_presence() {
        let store = IndexedStore::in_memory();
        let err = store
            .update_if_exists(Record::Room(room("ghost", 1, 1, 1)))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::ConditionFailed(RecordKey::room("ghost")));
    }

    #[tokio::test]
    async fn update_with_precondition() {
        let store = IndexedStore::in_memory();
        store.put(Record::Booking(booking("b1", "r1", "u1", 100, 200))).await.unwrap();
        let cancel = |rec: &Record| match rec {
            Record::Booking(b) if b.is_live() => {
                let mut b = b.clone();
                b.status = BookingStatus::Cancelled;
                Some(Record::Booking(b))
            }
            _ => None,
        };
        store.update_with(&RecordKey::booking("b1"), cancel).await.unwrap();
        let err = store.update_with(&RecordKey::booking("b1"), cancel).await.unwrap_err();
        assert_eq!(err, StoreError::ConditionFailed(RecordKey::booking("b1")));
    }

    #[tokio::test]
    async fn delete_if_exists_detects_double_delete() {
        let store = IndexedStore::in_memory();
        store.put(Record::Booking(booking("b1", "r1", "u1", 100, 200))).await.unwrap();
        let removed = store.delete_if_exists(&RecordKey::booking("b1")).await.unwrap();
        assert_eq!(removed.key(), RecordKey::booking("b1"));
        assert!(store.delete_if_exists(&RecordKey::booking("b1")).await.is_err());
        assert!(store.bookings_for_room("r1").is_empty());
        assert!(store.bookings_for_user("u1").is_empty());
    }

    #[tokio::test]
    async fn room_index_scans_by_start() {
        let store = IndexedStore::in_memory();
        store.put(Record::Booking(booking("late", "r1", "u1", 5000, 6000))).await.unwrap();
        store.put(Record::Booking(booking("early", "r1", "u1", 1000, 2000))).await.unwrap();
        store.put(Record::Booking(booking("other", "r2", "u1", 1000, 2000))).await.unwrap();

        assert_eq!(ids(&store.bookings_for_room("r1")), vec!["early", "late"]);
        assert_eq!(ids(&store.bookings_for_room_in_window("r1", 0, 5000)), vec!["early"]);
        assert_eq!(ids(&store.bookings_for_room_in_window("r1", 0, 5001)), vec!["early", "late"]);
        assert!(store.bookings_for_room_in_window("r1", 0, 1000).is_empty());
    }

    #[tokio::test]
    async fn window_scan_skips_history_older_than_longest_booking() {
        let store = IndexedStore::in_memory();
        for i in 0..50 {
            let start = i * 1000;
            store
                .put(Record::Booking(booking(&format!("old{i:02}"), "r1", "u1", start, start + 600)))
                .await
                .unwrap();
        }
        // Longest on r1 is 600s, so a window opening at 49_300 only loads
        // bookings starting at or after 48_700.
        assert_eq!(ids(&store.bookings_for_room_in_window("r1", 49_300, 50_000)), vec!["old49"]);

        // A longer booking widens the bound for every later scan.
        store.put(Record::Booking(booking("marathon", "r1", "u1", 60_000, 70_000))).await.unwrap();
        let hits = store.bookings_for_room_in_window("r1", 69_000, 69_500);
        assert_eq!(ids(&hits), vec!["marathon"]);
        // Candidates only: none of these reach 55_000, the caller filters them.
        let wide = store.bookings_for_room_in_window("r1", 55_000, 56_000);
        assert_eq!(ids(&wide), vec!["old45", "old46", "old47", "old48", "old49"]);

        // Removing the last booking on a room forgets its length.
        for i in 0..50 {
            store.delete_if_exists(&RecordKey::booking(&format!("old{i:02}"))).await.unwrap();
        }
        store.delete_if_exists(&RecordKey::booking("marathon")).await.unwrap();
        store.put(Record::Booking(booking("short", "r1", "u1", 100, 160))).await.unwrap();
        assert!(store.bookings_for_room_in_window("r1", 200, 300).is_empty());
        assert_eq!(ids(&store.bookings_for_room_in_window("r1", 0, 300)), vec!["short"]);
    }

    #[tokio::test]
    async fn day_index_buckets_by_start() {
        let store = IndexedStore::in_memory();
        let d = 10 * SECONDS_PER_DAY;
        store.put(Record::Booking(booking("a", "r1", "u1", d + 3600, d + 7200))).await.unwrap();
        store.put(Record::Booking(booking("b", "r1", "u1", d + 600, d + 1200))).await.unwrap();
        store.put(Record::Booking(booking("c", "r2", "u1", d + 600, d + 1200))).await.unwrap();
        store
            .put(Record::Booking(booking("next", "r1", "u1", d + SECONDS_PER_DAY, d + SECONDS_PER_DAY + 60)))
            .await
            .unwrap();

        assert_eq!(ids(&store.bookings_for_room_on_day("r1", d)), vec!["b", "a"]);
        assert_eq!(ids(&store.bookings_for_room_on_day("r2", d)), vec!["c"]);
        assert!(store.bookings_for_room_on_day("r1", d - SECONDS_PER_DAY).is_empty());

        let buckets = store.bookings_in_day_buckets(d + 5000, d + SECONDS_PER_DAY + 1);
        let mut all = ids(&buckets);
        all.sort();
        assert_eq!(all, vec!["a", "b", "c", "next"]);
    }

    #[tokio::test]
    async fn moving_a_booking_reindexes_it() {
        let store = IndexedStore::in_memory();
        store.put(Record::Booking(booking("b1", "r1", "u1", 100, 200))).await.unwrap();
        store.put(Record::Booking(booking("b1", "r2", "u2", 300, 400))).await.unwrap();
        assert!(store.bookings_for_room("r1").is_empty());
        assert!(store.bookings_for_user("u1").is_empty());
        assert_eq!(ids(&store.bookings_for_room("r2")), vec!["b1"]);
        assert_eq!(ids(&store.bookings_for_user("u2")), vec!["b1"]);
    }

    #[tokio::test]
    async fn room_capacity_and_floor_indexes() {
        let store = IndexedStore::in_memory();
        store.put(Record::Room(room("small", 1, 101, 2))).await.unwrap();
        store.put(Record::Room(room("mid", 1, 102, 8))).await.unwrap();
        store.put(Record::Room(room("big", 2, 201, 20))).await.unwrap();

        let mut on_one: Vec<String> = store.rooms_on_floor(1).into_iter().map(|r| r.id).collect();
        on_one.sort();
        assert_eq!(on_one, vec!["mid", "small"]);

        let mut cap: Vec<String> = store
            .rooms_with_capacity(Some(3), Some(20))
            .into_iter()
            .map(|r| r.id)
            .collect();
        cap.sort();
        assert_eq!(cap, vec!["big", "mid"]);
        assert!(store.rooms_with_capacity(Some(10), Some(5)).is_empty());
        assert_eq!(store.room_with_number(2, 201).map(|r| r.id), Some("big".to_string()));
    }

    #[tokio::test]
    async fn user_email_lookup_is_case_insensitive() {
        let store = IndexedStore::in_memory();
        store
            .put(Record::User(User {
                id: "u1".into(),
                name: "Ada".into(),
                email: "Ada@Example.com".into(),
                role: Role::User,
                created_at: 0,
                updated_at: 0,
            }))
            .await
            .unwrap();
        assert_eq!(store.user_with_email("ada@example.com").map(|u| u.id), Some("u1".into()));
    }

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.into(),
            name: id.into(),
            email: email.into(),
            role: Role::User,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn email_unique_across_users() {
        let store = IndexedStore::in_memory();
        store.put_if_absent(Record::User(user("u1", "ada@example.com"))).await.unwrap();
        let err = store
            .put_if_absent(Record::User(user("u2", "ADA@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken { ref existing, .. } if existing == "u1"));
        // Rewriting our own record keeps the address.
        store.put(Record::User(user("u1", "ada@example.com"))).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_signups_with_one_email_admit_one() {
        let path = test_log_path("email_race.log");
        let store = std::sync::Arc::new(IndexedStore::open(&path).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .put_if_absent(Record::User(user(&format!("u{i}"), "same@example.com")))
                        .await
                })
            })
            .collect();
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.count(RecordType::User), 1);
    }

    #[tokio::test]
    async fn batch_delete_limits_and_counts() {
        let store = IndexedStore::in_memory();
        for i in 0..5 {
            store
                .put(Record::Booking(booking(&format!("b{i}"), "r1", "u1", i * 100, i * 100 + 50)))
                .await
                .unwrap();
        }
        let too_many: Vec<RecordKey> = (0..26).map(|i| RecordKey::booking(&format!("x{i}"))).collect();
        assert_eq!(
            store.batch_delete(&too_many).await.unwrap_err(),
            StoreError::BatchTooLarge(26)
        );

        let keys = vec![
            RecordKey::booking("b0"),
            RecordKey::booking("b1"),
            RecordKey::booking("missing"),
        ];
        assert_eq!(store.batch_delete(&keys).await.unwrap(), 2);
        assert_eq!(store.count(RecordType::Booking), 3);
    }

    #[tokio::test]
    async fn scan_is_partitioned() {
        let store = IndexedStore::in_memory();
        store.put(Record::Room(room("r1", 1, 101, 4))).await.unwrap();
        store.put(Record::Booking(booking("b1", "r1", "u1", 100, 200))).await.unwrap();
        assert_eq!(store.scan(RecordType::Room).len(), 1);
        assert_eq!(store.scan(RecordType::Booking).len(), 1);
        assert!(store.scan(RecordType::User).is_empty());
    }

    #[tokio::test]
    async fn reopen_replays_log() {
        let path = test_log_path("reopen.log");
        {
            let store = IndexedStore::open(&path).unwrap();
            assert!(store.is_durable());
            store.put(Record::Room(room("r1", 2, 201, 10))).await.unwrap();
            store.put(Record::Booking(booking("b1", "r1", "u1", 100, 200))).await.unwrap();
            store.put(Record::Booking(booking("b2", "r1", "u1", 300, 400))).await.unwrap();
            store.delete_if_exists(&RecordKey::booking("b2")).await.unwrap();
        }
        let store = IndexedStore::open(&path).unwrap();
        assert_eq!(ids(&store.bookings_for_room("r1")), vec!["b1"]);
        assert_eq!(store.room_with_number(2, 201).map(|r| r.id), Some("r1".into()));
        // Uniqueness survives replay.
        assert!(store.put_if_absent(Record::Room(room("r9", 2, 201, 1))).await.is_err());
    }

    #[tokio::test]
    async fn compaction_preserves_state() {
        let path = test_log_path("compact.log");
        {
            let store = IndexedStore::open(&path).unwrap();
            store.put(Record::Room(room("r1", 1, 101, 4))).await.unwrap();
            for i in 0..20 {
                let id = format!("b{i}");
                store.put(Record::Booking(booking(&id, "r1", "u1", i * 10, i * 10 + 5))).await.unwrap();
                if i % 2 == 0 {
                    store.delete_if_exists(&RecordKey::booking(&id)).await.unwrap();
                }
            }
            assert!(store.appends_since_compact().await > 0);
            let before = std::fs::metadata(&path).unwrap().len();
            store.compact().await.unwrap();
            assert_eq!(store.appends_since_compact().await, 0);
            let after = std::fs::metadata(&path).unwrap().len();
            assert!(after < before);
            store.put(Record::Booking(booking("tail", "r1", "u1", 999, 1000))).await.unwrap();
        }
        let store = IndexedStore::open(&path).unwrap();
        assert_eq!(store.count(RecordType::Booking), 11);
        assert_eq!(store.count(RecordType::Room), 1);
    }

    #[tokio::test]
    async fn in_memory_compaction_is_noop() {
        let store = IndexedStore::in_memory();
        store.compact().await.unwrap();
        assert_eq!(store.appends_since_compact().await, 0);
        assert!(!store.is_durable());
    }
}
