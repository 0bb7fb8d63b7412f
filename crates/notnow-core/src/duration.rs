use std::sync::OnceLock;

use chrono::Duration;
use regex::Regex;

const MAX_SECONDS: i64 = i64::MAX / 1_000;

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?").expect("regex"))
}

/// Parses a `1h30m15s` style literal. Whitespace between components is
/// ignored. Returns `None` when no component is present.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let compact: String = text.split_whitespace().collect();
    let caps = duration_re().captures(&compact)?;
    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        return None;
    }
    let component = |idx: usize| {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0)
    };
    let total = component(1)
        .saturating_mul(3_600)
        .saturating_add(component(2).saturating_mul(60))
        .saturating_add(component(3));
    Some(Duration::seconds(total.min(MAX_SECONDS)))
}

/// Lenient form used for argument coercion: anything unparseable is zero.
pub fn parse_duration_or_zero(text: &str) -> Duration {
    parse_duration(text).unwrap_or_else(Duration::zero)
}

/// Formats as `hh:mm`; hours are not wrapped at 24.
pub fn format_hhmm(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Short human form (`2h 30m`, `45m`, `10s`, `0m`) used in rendered summaries.
pub fn format_human(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 && hours == 0 {
        parts.push(format!("{}s", seconds));
    }
    if parts.is_empty() {
        return "0m".to_string();
    }
    parts.join(" ")
}

/// Serde adapter storing a `Duration` as whole seconds.
pub mod seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs.clamp(-super::MAX_SECONDS, super::MAX_SECONDS)))
    }
}
