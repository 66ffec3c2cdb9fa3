use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Resolves a date expression relative to `today`. Relative terms resolve
/// at call time, never at workflow-start time: a multi-day conversation
/// must not silently use a stale "today".
///
/// Accepted forms: `YYYY-MM-DD`, `today`, `tomorrow`, `day after tomorrow`,
/// and weekday names (optionally prefixed with `next`), which mean the next
/// occurrence strictly after `today`.
pub fn resolve(expression: &str, today: NaiveDate) -> Option<NaiveDate> {
    let normalized = expression.trim().to_ascii_lowercase();

    match normalized.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)),
        "day after tomorrow" => return today.checked_add_days(Days::new(2)),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Some(date);
    }

    let weekday_text = normalized.strip_prefix("next ").unwrap_or(&normalized);
    if let Some(weekday) = parse_weekday(weekday_text) {
        return Some(next_occurrence(today, weekday));
    }

    None
}

fn parse_weekday(text: &str) -> Option<Weekday> {
    match text {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_occurrence(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Days::new(u64::from(ahead))
}
