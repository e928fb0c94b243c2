pub mod tally;

use crate::models::Rating;
use std::fmt;

pub use tally::render;

// Display quantities for one rating level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingRow {
    pub rating: Rating,
    pub count: u64,
    pub percentage: u8, // 0-100, rounded to the nearest integer
}

/// Everything the results view shows, derived from one tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub total_votes: u64,
    /// Average rating in tenths (38 means 3.8), already rounded.
    pub average_tenths: u64,
    pub per_rating: [RatingRow; 5],
}

impl DisplaySnapshot {
    /// The average as shown to users: always one decimal place.
    pub fn average_label(&self) -> String {
        AverageLabel(self.average_tenths).to_string()
    }

    pub fn row(&self, rating: Rating) -> &RatingRow {
        &self.per_rating[rating.index()]
    }
}

struct AverageLabel(u64);

impl fmt::Display for AverageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// Which displayed values differ from the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeFlags {
    pub total: bool,
    pub average: bool,
    pub counts: [bool; 5],
}

impl ChangeFlags {
    pub fn all() -> Self {
        Self {
            total: true,
            average: true,
            counts: [true; 5],
        }
    }

    pub fn any(&self) -> bool {
        self.total || self.average || self.counts.iter().any(|changed| *changed)
    }

    pub fn count(&self, rating: Rating) -> bool {
        self.counts[rating.index()]
    }
}

// Output of one render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderUpdate {
    pub snapshot: DisplaySnapshot,
    pub changes: ChangeFlags,
}
