use std::time::Instant;

use futures::future::join_all;
use tracing::warn;

use crate::error::ServiceError;
use crate::limits::MAX_QUERY_WINDOW_SECS;
use crate::model::{Booking, BookingWithDetails, Joined, RoomSchedule, ScheduleSlot, UserLookup};
use crate::observability::{record_operation, JOINS_OMITTED_TOTAL};
use crate::time_range::{day_bucket, is_valid, Secs};

use super::BookingService;

impl BookingService {
    /// Any status, including cancelled.
    pub fn get_booking_by_id(&self, booking_id: &str) -> Result<Booking, ServiceError> {
        self.bookings.get_by_id(booking_id)
    }

    pub fn get_all_bookings(&self) -> Vec<Booking> {
        self.bookings.get_all()
    }

    pub fn get_bookings_by_room_id(&self, room_id: &str) -> Result<Vec<Booking>, ServiceError> {
        if room_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("room_id is required".into()));
        }
        Ok(self.bookings.get_by_room_id(room_id))
    }

    pub fn get_bookings_by_user_id(&self, user_id: &str) -> Result<Vec<Booking>, ServiceError> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("user_id is required".into()));
        }
        Ok(self.bookings.get_by_user_id(user_id))
    }

    /// Confirmed and cancelled bookings of a user, oldest first.
    pub fn get_booking_history_by_user_id(&self, user_id: &str) -> Vec<Booking> {
        self.bookings.get_history_by_user_id(user_id)
    }

    /// Live bookings of any room starting in `[start, end)`.
    pub fn get_bookings_by_date_range(&self, start: Secs, end: Secs) -> Result<Vec<Booking>, ServiceError> {
        if !is_valid(start, end) {
            return Err(ServiceError::TimeRangeInvalid { start, end });
        }
        if end - start > MAX_QUERY_WINDOW_SECS {
            return Err(ServiceError::InvalidInput("date range wider than 366 days".into()));
        }
        Ok(self.bookings.get_by_date_range(start, end))
    }

    /// Occupied slots of one room on the UTC day containing `date`.
    ///
    /// Each slot records how its user lookup went. A missing user or a failed
    /// lookup still yields the slot, so the schedule never under-reports
    /// occupancy.
    pub async fn get_room_schedule_by_date(&self, room_id: &str, date: Secs) -> Result<RoomSchedule, ServiceError> {
        let started = Instant::now();
        let result = self.build_schedule(room_id, date).await;
        record_operation("get_room_schedule_by_date", result.is_ok(), started);
        result
    }

    async fn build_schedule(&self, room_id: &str, date: Secs) -> Result<RoomSchedule, ServiceError> {
        let room = self.rooms.get_by_id(room_id)?;
        let day = day_bucket(date);
        let bookings = self.bookings.get_by_room_id_and_date(&room.id, day);

        // Lookups run concurrently; results line up with `bookings`.
        let lookups = join_all(bookings.iter().map(|b| self.users.find_user(&b.user_id))).await;

        let mut slots = Vec::with_capacity(bookings.len());
        for (b, lookup) in bookings.into_iter().zip(lookups) {
            let user = match lookup {
                Ok(Some(u)) => UserLookup::Found(u.name),
                Ok(None) => UserLookup::Missing,
                Err(e) => {
                    warn!(booking_id = %b.id, user_id = %b.user_id, error = %e, "schedule user lookup failed");
                    metrics::counter!(JOINS_OMITTED_TOTAL, "view" => "schedule").increment(1);
                    UserLookup::Failed(e.to_string())
                }
            };
            slots.push(ScheduleSlot {
                start_time: b.start_time,
                end_time: b.end_time,
                booking_id: b.id,
                purpose: b.purpose,
                user,
            });
        }

        Ok(RoomSchedule {
            room_id: room.id,
            room_name: room.name,
            room_number: room.room_number,
            date: day,
            slots,
        })
    }

    /// Live bookings of a room joined with the room name and the user's
    /// email. Items whose join fails come back as `Joined::Omitted` with the
    /// reason instead of being dropped.
    pub async fn get_bookings_with_details_by_room_id(
        &self,
        room_id: &str,
    ) -> Result<Vec<Joined<BookingWithDetails>>, ServiceError> {
        if room_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("room_id is required".into()));
        }
        let started = Instant::now();
        let bookings = self.bookings.get_by_room_id(room_id);
        // One room lookup serves every item; a deleted room omits them all.
        let room = self.rooms.get_by_id(room_id);

        let lookups = match &room {
            Ok(_) => join_all(bookings.iter().map(|b| self.users.find_user(&b.user_id))).await,
            Err(_) => Vec::new(),
        };
        let mut lookups = lookups.into_iter();

        let mut out = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let joined = match (&room, lookups.next()) {
                (Err(e), _) => omitted(&booking, format!("room lookup: {e}")),
                (Ok(room), Some(Ok(Some(user)))) => Joined::Complete(BookingWithDetails {
                    user_email: user.email,
                    room_name: room.name.clone(),
                    booking,
                }),
                (Ok(_), Some(Ok(None)) | None) => {
                    omitted(&booking, format!("user {} not found", booking.user_id))
                }
                (Ok(_), Some(Err(e))) => omitted(&booking, format!("user lookup: {e}")),
            };
            out.push(joined);
        }
        record_operation("get_bookings_with_details_by_room_id", true, started);
        Ok(out)
    }
}

fn omitted(booking: &Booking, reason: String) -> Joined<BookingWithDetails> {
    warn!(booking_id = %booking.id, %reason, "detail join omitted");
    metrics::counter!(JOINS_OMITTED_TOTAL, "view" => "details").increment(1);
    Joined::Omitted {
        booking_id: booking.id.clone(),
        reason,
    }
}
