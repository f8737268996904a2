use std::sync::Arc;

use crate::error::ServiceError;
use crate::limits::MAX_BATCH_WRITE;
use crate::model::{Booking, BookingStatus, Record, RecordKey};
use crate::store::IndexedStore;
use crate::time_range::{day_bucket, now_secs, overlaps, Secs};

use super::condition_or_internal;

/// Booking records. Listings return live (confirmed) bookings ordered by
/// start time; cancelled ones are only visible by id and in user history.
#[derive(Clone)]
pub struct BookingRepository {
    store: Arc<IndexedStore>,
}

fn live_sorted(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.retain(Booking::is_live);
    bookings.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
    bookings
}

impl BookingRepository {
    pub fn new(store: Arc<IndexedStore>) -> Self {
        Self { store }
    }

    /// Fails `Conflict` if the id is already taken.
    pub async fn create(&self, booking: Booking) -> Result<(), ServiceError> {
        let id = booking.id.clone();
        self.store
            .put_if_absent(Record::Booking(booking))
            .await
            .map_err(|e| {
                condition_or_internal("create booking", e, || {
                    ServiceError::Conflict(format!("booking id {id} already exists"))
                })
            })
    }

    /// Any status, including cancelled.
    pub fn get_by_id(&self, id: &str) -> Result<Booking, ServiceError> {
        self.store
            .get(&RecordKey::booking(id))
            .and_then(Record::into_booking)
            .ok_or_else(|| ServiceError::not_found("booking", id))
    }

    pub fn get_all(&self) -> Vec<Booking> {
        live_sorted(
            self.store
                .scan(crate::model::RecordType::Booking)
                .into_iter()
                .filter_map(Record::into_booking)
                .collect(),
        )
    }

    /// Live bookings on `room_id` whose interval overlaps `[start, end)`.
    /// The room index bounds the scan on both sides by start time, using the
    /// room's longest booking for the lower edge; overlap is checked per item.
    pub fn get_by_room_and_time_window(&self, room_id: &str, start: Secs, end: Secs) -> Vec<Booking> {
        let candidates = self.store.bookings_for_room_in_window(room_id, start, end);
        tracing::debug!(room_id, start, end, scanned = candidates.len(), "room window scan");
        live_sorted(
            candidates
                .into_iter()
                .filter(|b| overlaps(b.start_time, b.end_time, start, end))
                .collect(),
        )
    }

    pub fn get_by_room_id(&self, room_id: &str) -> Vec<Booking> {
        live_sorted(self.store.bookings_for_room(room_id))
    }

    pub fn get_by_user_id(&self, user_id: &str) -> Vec<Booking> {
        live_sorted(self.store.bookings_for_user(user_id))
    }

    /// Every booking the user ever made, cancelled ones included.
    pub fn get_history_by_user_id(&self, user_id: &str) -> Vec<Booking> {
        let mut all = self.store.bookings_for_user(user_id);
        all.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Live bookings on `room_id` starting inside the UTC day containing `day`.
    pub fn get_by_room_id_and_date(&self, room_id: &str, day: Secs) -> Vec<Booking> {
        live_sorted(self.store.bookings_for_room_on_day(room_id, day_bucket(day)))
    }

    /// Live bookings, any room, starting in `[start, end)`.
    pub fn get_by_date_range(&self, start: Secs, end: Secs) -> Vec<Booking> {
        live_sorted(
            self.store
                .bookings_in_day_buckets(start, end)
                .into_iter()
                .filter(|b| start <= b.start_time && b.start_time < end)
                .collect(),
        )
    }

    /// Confirmed → cancelled. Fails `NotFound` if the booking is absent or
    /// was already cancelled, including by a concurrent caller.
    pub async fn cancel(&self, id: &str) -> Result<Booking, ServiceError> {
        let now = now_secs();
        let updated = self
            .store
            .update_with(&RecordKey::booking(id), |rec| match rec {
                Record::Booking(b) if b.is_live() => {
                    let mut b = b.clone();
                    b.status = BookingStatus::Cancelled;
                    b.updated_at = now;
                    Some(Record::Booking(b))
                }
                _ => None,
            })
            .await
            .map_err(|e| condition_or_internal("cancel booking", e, || ServiceError::not_found("booking", id)))?;
        updated
            .into_booking()
            .ok_or_else(|| ServiceError::Internal("cancel booking failed".into()))
    }

    /// Hard-delete every booking of a user, in store-sized batches.
    pub async fn delete_by_user_id(&self, user_id: &str) -> Result<usize, ServiceError> {
        let keys: Vec<RecordKey> = self
            .store
            .bookings_for_user(user_id)
            .iter()
            .map(|b| RecordKey::booking(&b.id))
            .collect();
        let mut deleted = 0;
        for chunk in keys.chunks(MAX_BATCH_WRITE) {
            deleted += self
                .store
                .batch_delete(chunk)
                .await
                .map_err(|e| ServiceError::internal("delete user bookings", e))?;
        }
        tracing::info!(user_id, deleted, "deleted bookings for user");
        Ok(deleted)
    }
}
