//! Rating aggregation helpers
//!
//! The PostgreSQL repositories compute averages and grouped counts in SQL;
//! these functions define the same results for in-process data and turn the
//! sparse grouped counts into the dense five-bucket distribution.

use crate::models::review::RatingBucket;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// Round to one decimal place, halves away from zero
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean of the ratings rounded to one decimal, 0 when there are none
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    round_to_tenth(sum as f64 / ratings.len() as f64)
}

/// Expand grouped `(rating, count)` rows into one bucket per rating value
///
/// Ratings outside `1..=5` are ignored; duplicate rows for the same rating
/// are summed.
pub fn rating_distribution(grouped: &[(i32, i64)]) -> Vec<RatingBucket> {
    (MIN_RATING..=MAX_RATING)
        .map(|rating| RatingBucket {
            rating,
            count: grouped
                .iter()
                .filter(|(r, _)| *r == rating)
                .map(|(_, count)| *count)
                .sum(),
        })
        .collect()
}
