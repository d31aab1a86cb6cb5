//! Human-readable renderings of durations for labels and the CLI.

/// "1 hour 30 minutes", "15 minutes", "45 seconds".
pub fn duration_label(secs: u64) -> String {
    if secs == 0 {
        return "0 seconds".into();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    if seconds > 0 {
        parts.push(plural(seconds, "second"));
    }
    parts.join(" ")
}

/// "3 chapters", "1 chapter".
pub fn chapters_label(count: u32) -> String {
    plural(count as u64, "chapter")
}

/// `HH:MM:SS` above an hour, `MM:SS` below. Negative and non-finite input renders as zero.
pub fn clock(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
