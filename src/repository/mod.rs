//! Typed access to the indexed store, one repository per record type.

mod booking;
mod room;
mod user;

pub use booking::BookingRepository;
pub use room::{RoomFilter, RoomRepository};
pub use user::{UserDirectory, UserRepository};

use crate::error::ServiceError;
use crate::store::StoreError;

/// Translate a failed conditional write. `on_condition` names the caller-facing
/// meaning of the condition; everything else is internal.
fn condition_or_internal(
    op: &'static str,
    err: StoreError,
    on_condition: impl FnOnce() -> ServiceError,
) -> ServiceError {
    match err {
        StoreError::ConditionFailed(_) => on_condition(),
        StoreError::UniqueViolation {
            floor, room_number, ..
        } => ServiceError::Conflict(format!(
            "room number {room_number} already exists on floor {floor}"
        )),
        StoreError::EmailTaken { email, .. } => ServiceError::Conflict(format!("email {email} already registered")),
        other => ServiceError::internal(op, other),
    }
}
