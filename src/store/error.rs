use crate::model::RecordKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A conditional write found the key in the wrong state.
    ConditionFailed(RecordKey),
    /// Another room already holds this number on this floor.
    UniqueViolation {
        floor: u32,
        room_number: u32,
        existing: String,
    },
    /// Another user already registered this email.
    EmailTaken {
        email: String,
        existing: String,
    },
    BatchTooLarge(usize),
    Log(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ConditionFailed(key) => write!(f, "condition failed on {key}"),
            StoreError::UniqueViolation {
                floor,
                room_number,
                existing,
            } => write!(
                f,
                "room number {room_number} on floor {floor} already held by {existing}"
            ),
            StoreError::EmailTaken { email, existing } => {
                write!(f, "email {email} already held by {existing}")
            }
            StoreError::BatchTooLarge(n) => {
                write!(f, "batch of {n} writes exceeds {}", crate::limits::MAX_BATCH_WRITE)
            }
            StoreError::Log(e) => write!(f, "record log error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
