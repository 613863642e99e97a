// src/utils/format.rs

/// Human readable time limit, e.g. `1h 2m 3s`.
/// Returns "No limit" when there is none.
pub fn format_duration(seconds: Option<i64>) -> String {
    let seconds = match seconds {
        Some(s) if s > 0 => s,
        _ => return "No limit".to_string(),
    };

    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hrs > 0 {
        parts.push(format!("{}h", hrs));
    }
    if mins > 0 {
        parts.push(format!("{}m", mins));
    }
    if secs > 0 {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}

/// Countdown display in `m:ss`.
pub fn format_clock(seconds: i64) -> String {
    let s = seconds.max(0);
    format!("{}:{:02}", s / 60, s % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "No limit");
        assert_eq!(format_duration(Some(0)), "No limit");
        assert_eq!(format_duration(Some(-5)), "No limit");
        assert_eq!(format_duration(Some(45)), "45s");
        assert_eq!(format_duration(Some(3600)), "1h");
        assert_eq!(format_duration(Some(3723)), "1h 2m 3s");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(59), "0:59");
        assert_eq!(format_clock(61), "1:01");
        assert_eq!(format_clock(-3), "0:00");
    }
}
