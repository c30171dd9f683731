//! Small formatting helpers shared by the pipeline and its callers

/// Converts a `h:mm:ss`, `m:ss` or `ss` duration string into seconds.
///
/// Returns `None` for an empty or non-numeric string. Totals past `u64::MAX` are `None` too.
pub fn time_to_seconds(duration: &str) -> Option<u64> {
    let trimmed = duration.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.split(':').try_fold(0u64, |acc, part| {
        let n = part.trim().parse::<u64>().ok()?;
        acc.checked_mul(60)?.checked_add(n)
    })
}

/// Formats seconds as `m:ss` / `h:mm:ss`.
pub fn seconds_to_time(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
