use serde::{Deserialize, Serialize};

/// Unix seconds, the only time type.
pub type Secs = i64;

pub const SECONDS_PER_DAY: Secs = 86_400;

/// True iff `[start, end)` is a non-empty interval.
pub fn is_valid(start: Secs, end: Secs) -> bool {
    start < end
}

/// Half-open overlap test. Intervals that only touch at an endpoint do not overlap.
pub fn overlaps(a_start: Secs, a_end: Secs, b_start: Secs, b_end: Secs) -> bool {
    a_start < b_end && b_start < a_end
}

/// True iff `start` lies in `[now, now + max_days days]`.
pub fn within_window(start: Secs, now: Secs, max_days: u32) -> bool {
    let horizon = now.saturating_add(Secs::from(max_days) * SECONDS_PER_DAY);
    now <= start && start <= horizon
}

/// Truncate a timestamp to the start of its UTC day.
pub fn day_bucket(ts: Secs) -> Secs {
    ts.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY
}

pub fn now_secs() -> Secs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as Secs)
        .unwrap_or_default()
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Secs,
    pub end: Secs,
}

impl Span {
    pub fn new(start: Secs, end: Secs) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for caller-supplied bounds.
    pub fn try_new(start: Secs, end: Secs) -> Option<Self> {
        is_valid(start, end).then_some(Self { start, end })
    }

    /// The whole UTC day containing `ts`.
    pub fn day_of(ts: Secs) -> Self {
        let start = day_bucket(ts);
        Self::new(start, start + SECONDS_PER_DAY)
    }

    pub fn duration(&self) -> Secs {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains_instant(&self, t: Secs) -> bool {
        self.start <= t && t < self.end
    }
}
