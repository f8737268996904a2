use crate::error::ServiceError;
use crate::limits::MAX_PURPOSE_LEN;
use crate::model::{Booking, NewBooking};
use crate::time_range::{is_valid, overlaps, within_window, Secs};

/// Field and time checks that need no store access. Order matters: missing
/// ids, then purpose, then the range itself, then the booking horizon.
pub(super) fn validate_request(req: &NewBooking, now: Secs, max_days: u32) -> Result<(), ServiceError> {
    if req.user_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("user_id is required".into()));
    }
    if req.room_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("room_id is required".into()));
    }
    if req.purpose.trim().is_empty() {
        return Err(ServiceError::InvalidInput("purpose is required".into()));
    }
    if req.purpose.len() > MAX_PURPOSE_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "purpose longer than {MAX_PURPOSE_LEN} bytes"
        )));
    }
    if !is_valid(req.start_time, req.end_time) {
        return Err(ServiceError::TimeRangeInvalid {
            start: req.start_time,
            end: req.end_time,
        });
    }
    if !within_window(req.start_time, now, max_days) {
        return Err(ServiceError::InvalidInput(format!(
            "start time must be between now and {max_days} days ahead"
        )));
    }
    Ok(())
}

/// Exact confirmation over the index pre-filter: the first live candidate
/// whose interval overlaps `[start, end)`.
pub(super) fn first_conflict(candidates: &[Booking], start: Secs, end: Secs) -> Option<&Booking> {
    candidates
        .iter()
        .filter(|b| b.is_live())
        .find(|b| overlaps(b.start_time, b.end_time, start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookingStatus;
    use crate::time_range::SECONDS_PER_DAY;

    fn request(start: Secs, end: Secs) -> NewBooking {
        NewBooking {
            user_id: "u1".into(),
            room_id: "r1".into(),
            start_time: start,
            end_time: end,
            purpose: "standup".into(),
        }
    }

    fn existing(id: &str, start: Secs, end: Secs, status: BookingStatus) -> Booking {
        Booking {
            id: id.into(),
            user_id: "u1".into(),
            user_name: "Ada".into(),
            room_id: "r1".into(),
            room_number: 1,
            start_time: start,
            end_time: end,
            purpose: "x".into(),
            status,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn missing_ids_are_invalid_input() {
        let mut req = request(100, 200);
        req.room_id = String::new();
        assert!(matches!(validate_request(&req, 0, 10), Err(ServiceError::InvalidInput(_))));
        req.room_id = "r1".into();
        req.user_id = "  ".into();
        assert!(matches!(validate_request(&req, 0, 10), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn purpose_bounds() {
        let mut req = request(100, 200);
        req.purpose = " ".into();
        assert!(matches!(validate_request(&req, 0, 10), Err(ServiceError::InvalidInput(_))));
        req.purpose = "p".repeat(MAX_PURPOSE_LEN + 1);
        assert!(matches!(validate_request(&req, 0, 10), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn inverted_range_before_horizon() {
        // Both wrong: the range error wins.
        let req = request(100 * SECONDS_PER_DAY, 50);
        assert_eq!(
            validate_request(&req, 0, 10),
            Err(ServiceError::TimeRangeInvalid { start: 100 * SECONDS_PER_DAY, end: 50 })
        );
    }

    #[test]
    fn horizon() {
        let now = 1_000_000;
        assert!(validate_request(&request(now + 10 * SECONDS_PER_DAY, now + 11 * SECONDS_PER_DAY), now, 10).is_ok());
        assert!(matches!(
            validate_request(&request(now + 10 * SECONDS_PER_DAY + 1, now + 11 * SECONDS_PER_DAY), now, 10),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_request(&request(now - 1, now + 100), now, 10),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn conflict_skips_touching_and_cancelled() {
        let candidates = vec![
            existing("touch", 500, 1000, BookingStatus::Confirmed),
            existing("gone", 1200, 1300, BookingStatus::Cancelled),
            existing("hit", 1800, 2500, BookingStatus::Confirmed),
        ];
        assert_eq!(first_conflict(&candidates, 1000, 2000).map(|b| b.id.as_str()), Some("hit"));
        assert!(first_conflict(&candidates, 1000, 1800).is_none());
    }
}
