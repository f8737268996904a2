use crate::time_range::{Secs, SECONDS_PER_DAY};

/// Store batch-write ceiling; bulk deletes are chunked to this size.
pub const MAX_BATCH_WRITE: usize = 25;

pub const MAX_PURPOSE_LEN: usize = 500;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_LOCATION_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2_000;
pub const MAX_AMENITIES: usize = 32;
pub const MAX_AMENITY_LEN: usize = 64;

/// Widest window accepted by date-range listings.
pub const MAX_QUERY_WINDOW_SECS: Secs = 366 * SECONDS_PER_DAY;

pub const DEFAULT_MAX_BOOKING_DAYS: u32 = 10;
