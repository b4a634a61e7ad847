pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else if ms < 3_600_000 {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = ms / 3_600_000;
        let mins = (ms % 3_600_000) / 60_000;
        format!("{}h {}m", hours, mins)
    }
}

/// Monthly savings as shown in summaries.
pub fn format_cost(usd: f64) -> String {
    let usd = usd.abs(); // avoid negative zero display
    format!("${:.2}", usd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(450), "450ms");
        assert_eq!(format_duration(2_500), "2.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
        assert_eq!(format_duration(3_900_000), "1h 5m");
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(3.65), "$3.65");
        assert_eq!(format_cost(-0.0), "$0.00");
    }
}
