use chrono::NaiveDate;

/// Consecutive-day workout streak ending today or yesterday.
///
/// Dates are walked newest first from `today`. A workout on the cursor day or
/// the day before extends the streak and moves the cursor to it; the first
/// larger gap ends the walk. Several workouts on one day each count.
pub fn current_streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut streak = 0;
    let mut cursor = today;
    for date in sorted {
        match (cursor - date).num_days() {
            0 | 1 => {
                streak += 1;
                cursor = date;
            }
            _ => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn empty_history_has_no_streak() {
        assert_eq!(current_streak(&[], day(10)), 0);
    }

    #[test]
    fn stale_history_breaks_streak() {
        assert_eq!(current_streak(&[day(8), day(7), day(6)], day(10)), 0);
    }

    #[test]
    fn consecutive_days_from_yesterday_count() {
        assert_eq!(current_streak(&[day(7), day(9), day(8)], day(10)), 3);
    }

    #[test]
    fn gap_stops_walk_and_same_day_counts_twice() {
        let dates = [day(10), day(10), day(9), day(7), day(6)];
        assert_eq!(current_streak(&dates, day(10)), 3);
    }

    #[test]
    fn future_dates_end_the_walk() {
        assert_eq!(current_streak(&[day(12), day(10)], day(10)), 0);
    }
}
