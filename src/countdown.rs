use crate::model::timeframe::Timeframe;

/// Seconds left before the bucket containing `now` closes.
pub fn seconds_until_next_bucket(now: i64, timeframe: Timeframe) -> i64 {
    let next = timeframe.align(now) + timeframe.seconds() as i64;
    next - now
}

/// Candle countdown label: `1h 05m 09s`, `4:07` or `0:09`.
pub fn format_candle_countdown(remaining: i64) -> String {
    if remaining <= 0 {
        return "0:00".to_string();
    }
    let hours = remaining / 3_600;
    let minutes = (remaining % 3_600) / 60;
    let seconds = remaining % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}:{:02}", minutes, seconds)
    } else {
        format!("0:{:02}", seconds)
    }
}

/// Time left on a sale deadline, e.g. `2d 3h 4m 5s`.
pub fn format_time_left(seconds: i64) -> String {
    if seconds <= 0 {
        return "Expired".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let mins = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, mins, secs)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
