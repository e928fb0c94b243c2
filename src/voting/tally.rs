use crate::models::{Rating, VoteTally};
use crate::voting::{ChangeFlags, DisplaySnapshot, RatingRow, RenderUpdate};

/// Project a tally onto the numbers the results view displays.
///
/// `previous` must be the snapshot rendered immediately before this one (or
/// `None` on the first render); it is only used to compute the change flags.
/// The function keeps no state of its own.
pub fn render(tally: &VoteTally, previous: Option<&DisplaySnapshot>) -> RenderUpdate {
    let snapshot = snapshot_of(tally);

    let changes = match previous {
        Some(prev) => {
            let mut counts = [false; 5];
            for rating in Rating::ALL {
                counts[rating.index()] = prev.row(rating).count != snapshot.row(rating).count;
            }
            ChangeFlags {
                total: prev.total_votes != snapshot.total_votes,
                average: prev.average_tenths != snapshot.average_tenths,
                counts,
            }
        }
        // Nothing on screen yet, so everything is new
        None => ChangeFlags::all(),
    };

    RenderUpdate { snapshot, changes }
}

fn snapshot_of(tally: &VoteTally) -> DisplaySnapshot {
    // Wide sums so tallies built in code can never overflow here
    let total: u128 = tally.iter().map(|(_, count)| count as u128).sum();
    let weighted_sum: u128 = tally
        .iter()
        .map(|(rating, count)| rating.value() as u128 * count as u128)
        .sum();

    let average_tenths = if total > 0 {
        round_half_up(weighted_sum * 10, total) as u64
    } else {
        0
    };

    let per_rating = Rating::ALL.map(|rating| {
        let count = tally.count(rating);
        let percentage = if total > 0 {
            round_half_up(count as u128 * 100, total) as u8
        } else {
            0
        };
        RatingRow {
            rating,
            count,
            percentage,
        }
    });

    DisplaySnapshot {
        total_votes: u64::try_from(total).unwrap_or(u64::MAX),
        average_tenths,
        per_rating,
    }
}

// numerator / denominator rounded to the nearest integer, halves going up
fn round_half_up(numerator: u128, denominator: u128) -> u128 {
    (numerator * 2 + denominator) / (denominator * 2)
}
