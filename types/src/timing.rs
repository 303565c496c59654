use chrono::Duration;

/// Formats a duration as `M:SS`, or `H:MM:SS` past the hour.
pub fn duration_to_string(duration: Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{minutes}:{seconds:02}")
    }
}

/// Timed games report what is left on the clock. Untimed clocks count down
/// from zero, so the elapsed time is the negated clock value.
pub fn player_time_announcement(name: &str, timed: bool, clock: Duration) -> String {
    if timed {
        format!("{name} had {} left", duration_to_string(clock))
    } else {
        format!("{name} took: {}", duration_to_string(-clock))
    }
}

pub fn total_duration_announcement(total: Duration) -> String {
    format!(
        "The total game duration was: {}",
        duration_to_string(total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_to_string() {
        assert_eq!(duration_to_string(Duration::seconds(5)), "0:05");
        assert_eq!(duration_to_string(Duration::seconds(125)), "2:05");
        assert_eq!(duration_to_string(Duration::seconds(3725)), "1:02:05");
        assert_eq!(duration_to_string(Duration::seconds(-65)), "-1:05");
    }

    #[test]
    fn test_timed_announcement_shows_stored_clock() {
        let text = player_time_announcement("Alice", true, Duration::seconds(90));
        assert_eq!(text, "Alice had 1:30 left");
    }

    #[test]
    fn test_untimed_announcement_negates_stored_clock() {
        let text = player_time_announcement("Bob", false, Duration::seconds(-200));
        assert_eq!(text, "Bob took: 3:20");
    }
}
