use crate::store::StoreError;
use crate::time_range::Secs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Missing or malformed input, or a start outside the booking horizon.
    InvalidInput(String),
    TimeRangeInvalid {
        start: Secs,
        end: Secs,
    },
    Forbidden(String),
    NotFound {
        entity: &'static str,
        id: String,
    },
    /// Duplicate resource (id collision, room number already used on floor).
    Conflict(String),
    /// The requested slot overlaps a live booking, or the room is not bookable.
    RoomUnavailable {
        room_id: String,
        conflicting: Option<String>,
    },
    /// Store or other unexpected failure. Carries no store detail.
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Status code the HTTP layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InvalidInput(_) | ServiceError::TimeRangeInvalid { .. } => 400,
            ServiceError::Forbidden(_) => 403,
            ServiceError::NotFound { .. } => 404,
            ServiceError::Conflict(_) | ServiceError::RoomUnavailable { .. } => 409,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Wrap a store failure that has no caller-facing meaning. The detail is
    /// logged here and dropped from the returned error.
    pub fn internal(op: &'static str, err: StoreError) -> Self {
        tracing::error!(operation = op, error = %err, "store failure");
        ServiceError::Internal(format!("{op} failed"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            ServiceError::TimeRangeInvalid { start, end } => {
                write!(f, "invalid time range [{start}, {end}): start must be before end")
            }
            ServiceError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            ServiceError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            ServiceError::Conflict(msg) => write!(f, "conflict: {msg}"),
            ServiceError::RoomUnavailable {
                room_id,
                conflicting: Some(booking_id),
            } => write!(
                f,
                "room {room_id} unavailable: overlaps booking {booking_id}"
            ),
            ServiceError::RoomUnavailable {
                room_id,
                conflicting: None,
            } => write!(f, "room {room_id} is not open for booking"),
            ServiceError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}
