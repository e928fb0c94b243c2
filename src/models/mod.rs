use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single 1-5 rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub const ALL: [Rating; 5] = [Rating(1), Rating(2), Rating(3), Rating(4), Rating(5)];

    pub fn new(value: i64) -> Result<Self> {
        if value < Self::MIN as i64 || value > Self::MAX as i64 {
            return Err(Error::InvalidRating(value));
        }
        Ok(Rating(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    // Position of this rating in a five-slot array
    pub fn index(self) -> usize {
        (self.0 - Self::MIN) as usize
    }

    /// Themed name shown on the vote button and in the confirmation.
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "Youngling",
            2 => "Padawan",
            3 => "Jedi Knight",
            4 => "Jedi Master",
            _ => "Grand Master",
        }
    }
}

impl TryFrom<i64> for Rating {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate vote counts per rating, as returned by the results endpoint.
///
/// On the wire this is a JSON object keyed by the rating as a string,
/// e.g. `{"1": 0, "2": 3, "5": 7}`. Missing ratings count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, serde_json::Value>",
    into = "BTreeMap<String, u64>"
)]
pub struct VoteTally {
    counts: [u64; 5],
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: [u64; 5]) -> Self {
        Self { counts }
    }

    // Builder-style helper, mostly handy for tests and fakes
    pub fn with(mut self, rating: Rating, count: u64) -> Self {
        self.counts[rating.index()] = count;
        self
    }

    pub fn count(&self, rating: Rating) -> u64 {
        self.counts[rating.index()]
    }

    /// Sum of all counts, `None` if it does not fit in a u64.
    pub fn total(&self) -> Option<u64> {
        self.counts.iter().try_fold(0u64, |acc, count| acc.checked_add(*count))
    }

    // Sum of rating * count, `None` on overflow
    fn weighted_sum(&self) -> Option<u64> {
        self.iter().try_fold(0u64, |acc, (rating, count)| {
            acc.checked_add((rating.value() as u64).checked_mul(count)?)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rating, u64)> + '_ {
        Rating::ALL.iter().map(move |rating| (*rating, self.count(*rating)))
    }

    /// Parse a results response body, mapping any problem to a data failure.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::Data(e.to_string()))
    }
}

impl TryFrom<BTreeMap<String, serde_json::Value>> for VoteTally {
    type Error = String;

    fn try_from(raw: BTreeMap<String, serde_json::Value>) -> std::result::Result<Self, String> {
        let mut tally = VoteTally::new();
        for (key, value) in raw {
            let rating = key
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|n| Rating::new(n).ok())
                .ok_or_else(|| format!("unexpected rating key '{}'", key))?;
            let count = value
                .as_u64()
                .ok_or_else(|| format!("count for rating {} is not a non-negative integer: {}", key, value))?;
            tally.counts[rating.index()] = count;
        }
        if tally.total().is_none() || tally.weighted_sum().is_none() {
            return Err("vote counts overflow the total".to_string());
        }
        Ok(tally)
    }
}

impl From<VoteTally> for BTreeMap<String, u64> {
    fn from(tally: VoteTally) -> Self {
        tally.iter().map(|(rating, count)| (rating.to_string(), count)).collect()
    }
}

/// Request body for the vote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSubmission {
    pub rating: Rating,
    pub timestamp: String,
    pub session_id: String,
}

impl VoteSubmission {
    pub fn new(rating: Rating, session_id: String, at: DateTime<Utc>) -> Self {
        Self {
            rating,
            // Same shape as a browser's toISOString(): millisecond precision, Z suffix
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(3).unwrap().value(), 3);
        assert_eq!(Rating::new(5).unwrap().name(), "Grand Master");
    }

    #[test]
    fn tally_parses_partial_maps() {
        let tally = VoteTally::from_json(br#"{"2": 1, "5": 2}"#).unwrap();
        assert_eq!(tally.count(Rating::new(1).unwrap()), 0);
        assert_eq!(tally.count(Rating::new(2).unwrap()), 1);
        assert_eq!(tally.count(Rating::new(5).unwrap()), 2);

        let empty = VoteTally::from_json(b"{}").unwrap();
        assert_eq!(empty, VoteTally::new());
    }

    #[test]
    fn tally_rejects_malformed_bodies() {
        assert!(matches!(VoteTally::from_json(br#"{"7": 1}"#), Err(Error::Data(_))));
        assert!(matches!(VoteTally::from_json(br#"{"1": -3}"#), Err(Error::Data(_))));
        assert!(matches!(VoteTally::from_json(br#"{"1": "lots"}"#), Err(Error::Data(_))));
        assert!(matches!(VoteTally::from_json(b"[1, 2, 3]"), Err(Error::Data(_))));
        assert!(matches!(VoteTally::from_json(b"<html>"), Err(Error::Data(_))));
    }

    #[test]
    fn tally_rejects_counts_that_overflow() {
        let total_overflow = br#"{"1": 18446744073709551615, "2": 1}"#;
        assert!(matches!(VoteTally::from_json(total_overflow), Err(Error::Data(_))));

        // Total fits, rating * count does not
        let weighted_overflow = br#"{"5": 4611686018427387904}"#;
        assert!(matches!(VoteTally::from_json(weighted_overflow), Err(Error::Data(_))));

        let fits = VoteTally::from_json(br#"{"1": 18446744073709551614, "2": 1}"#).unwrap();
        assert_eq!(fits.total(), Some(u64::MAX));
    }

    #[test]
    fn submission_serializes_like_the_widget() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let submission = VoteSubmission::new(Rating::new(4).unwrap(), "abc".to_string(), at);
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rating": 4,
                "timestamp": "2025-03-14T09:26:53.000Z",
                "sessionId": "abc"
            })
        );
    }
}
