use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::UnicodeWidthStr;

/// mm:ss, as shown on the session timers
pub fn format_time(seconds: u64) -> String {
    let mins = seconds / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}", mins, secs)
}

/// "3 minutes ago" style label for the last-played column
pub fn humanize_since(seconds_ago: u64) -> String {
    HumanTime::from(std::time::Duration::from_secs(seconds_ago))
        .to_text_en(Accuracy::Rough, Tense::Past)
}

/// Truncate to a display width, appending an ellipsis when cut
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        let candidate = format!("{out}{c}");
        if candidate.width() + 1 > max_width {
            break;
        }
        out = candidate;
    }
    format!("{out}…")
}
