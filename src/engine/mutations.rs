use std::time::Instant;

use tracing::{info, warn};

use crate::error::ServiceError;
use crate::model::{new_id, Booking, BookingStatus, Caller, NewBooking, Role, RoomStatus};
use crate::observability::{
    record_operation, BOOKINGS_CANCELLED_TOTAL, BOOKINGS_CREATED_TOTAL, BOOKING_CONFLICTS_TOTAL,
};
use crate::time_range::now_secs;

use super::conflict::{first_conflict, validate_request};
use super::BookingService;

impl BookingService {
    /// Admit a reservation if the room is free for `[start_time, end_time)`.
    ///
    /// The room's lock is held from the overlap read until the new booking is
    /// committed, so of several concurrent overlapping requests exactly one
    /// succeeds and the rest see `RoomUnavailable`.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, ServiceError> {
        let started = Instant::now();
        let result = self.admit(req).await;
        record_operation("create_booking", result.is_ok(), started);
        result
    }

    async fn admit(&self, req: NewBooking) -> Result<Booking, ServiceError> {
        let now = now_secs();
        validate_request(&req, now, self.max_booking_days)?;

        let user = self
            .users
            .find_user(&req.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", &req.user_id))?;
        let room = self.rooms.get_by_id(&req.room_id)?;

        let _guard = self.locks.lock(&room.id).await;

        // Status may have changed while we waited for the lock, and the room
        // may be gone altogether.
        let room = match self.rooms.get_by_id(&room.id) {
            Ok(room) => room,
            Err(e) => {
                self.locks.forget_if_gone(&req.room_id, &self.rooms);
                return Err(e);
            }
        };
        if room.status != RoomStatus::Available {
            return Err(ServiceError::RoomUnavailable {
                room_id: room.id,
                conflicting: None,
            });
        }

        let candidates = self
            .bookings
            .get_by_room_and_time_window(&room.id, req.start_time, req.end_time);
        if let Some(existing) = first_conflict(&candidates, req.start_time, req.end_time) {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL).increment(1);
            warn!(
                room_id = %room.id,
                start = req.start_time,
                end = req.end_time,
                conflicting = %existing.id,
                "booking rejected: slot taken"
            );
            return Err(ServiceError::RoomUnavailable {
                room_id: room.id,
                conflicting: Some(existing.id.clone()),
            });
        }

        let booking = Booking {
            id: new_id(),
            user_id: user.id,
            user_name: user.name,
            room_id: room.id,
            room_number: room.room_number,
            start_time: req.start_time,
            end_time: req.end_time,
            purpose: req.purpose.trim().to_string(),
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        self.bookings.create(booking.clone()).await?;

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            booking_id = %booking.id,
            room_id = %booking.room_id,
            user_id = %booking.user_id,
            start = booking.start_time,
            end = booking.end_time,
            "booking confirmed"
        );
        Ok(booking)
    }

    /// Cancel a confirmed booking. No ownership check; see
    /// [`cancel_booking_as`](Self::cancel_booking_as).
    pub async fn cancel_booking(&self, booking_id: &str) -> Result<Booking, ServiceError> {
        let started = Instant::now();
        let result = self.cancel_unchecked(booking_id).await;
        record_operation("cancel_booking", result.is_ok(), started);
        result
    }

    /// Cancel on behalf of an authenticated caller, who must own the booking
    /// or be an admin.
    pub async fn cancel_booking_as(&self, booking_id: &str, caller: &Caller) -> Result<Booking, ServiceError> {
        let started = Instant::now();
        let result = async {
            let booking = self.bookings.get_by_id(booking_id)?;
            if caller.role != Role::Admin && caller.user_id != booking.user_id {
                return Err(ServiceError::Forbidden(format!(
                    "booking {booking_id} belongs to another user"
                )));
            }
            self.cancel_unchecked(booking_id).await
        }
        .await;
        record_operation("cancel_booking", result.is_ok(), started);
        result
    }

    async fn cancel_unchecked(&self, booking_id: &str) -> Result<Booking, ServiceError> {
        if booking_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("booking id is required".into()));
        }
        let existing = self.bookings.get_by_id(booking_id)?;
        let result = {
            let _guard = self.locks.lock(&existing.room_id).await;
            self.bookings.cancel(booking_id).await
        };
        // Bookings outlive their room; don't leave its entry behind.
        self.locks.forget_if_gone(&existing.room_id, &self.rooms);
        let cancelled = result?;

        metrics::counter!(BOOKINGS_CANCELLED_TOTAL).increment(1);
        info!(booking_id, room_id = %cancelled.room_id, "booking cancelled");
        Ok(cancelled)
    }

    /// Hard-delete every booking the user holds, cancelled ones included.
    /// Used when the account itself is removed.
    pub async fn delete_bookings_for_user(&self, user_id: &str) -> Result<usize, ServiceError> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("user_id is required".into()));
        }
        let started = Instant::now();
        let result = self.bookings.delete_by_user_id(user_id).await;
        record_operation("delete_bookings_for_user", result.is_ok(), started);
        result
    }
}
