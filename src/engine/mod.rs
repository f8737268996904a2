//! Reservation engine: admission with conflict detection, cancellation, and
//! the schedule and detail views built on the booking indexes.

mod conflict;
mod locks;
mod mutations;
mod queries;
mod rooms;

pub use locks::RoomLocks;
pub use rooms::RoomService;

use std::sync::Arc;

use crate::repository::{BookingRepository, RoomRepository, UserDirectory};

/// Booking operations. Cheap to clone; every clone shares the same
/// repositories and the same per-room lock table.
#[derive(Clone)]
pub struct BookingService {
    bookings: BookingRepository,
    rooms: RoomRepository,
    users: Arc<dyn UserDirectory>,
    locks: Arc<RoomLocks>,
    /// Booking horizon: how many days ahead a start time may lie.
    max_booking_days: u32,
}

impl BookingService {
    pub fn new(
        bookings: BookingRepository,
        rooms: RoomRepository,
        users: Arc<dyn UserDirectory>,
        locks: Arc<RoomLocks>,
        max_booking_days: u32,
    ) -> Self {
        Self {
            bookings,
            rooms,
            users,
            locks,
            max_booking_days,
        }
    }

    pub fn max_booking_days(&self) -> u32 {
        self.max_booking_days
    }
}
