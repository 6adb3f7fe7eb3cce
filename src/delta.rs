use std::cmp::Ordering;

use crate::model::is_missing;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Delta {
    #[default]
    None,
    Increase,
    Decrease,
    Changed,
}

impl Delta {
    pub fn glyph(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Increase => "↑",
            Self::Decrease => "↓",
            Self::Changed => "Δ",
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }

    fn from_ordering(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Self::Increase,
            Ordering::Greater => Self::Decrease,
            Ordering::Equal => Self::None,
        }
    }
}

/// Classifies how a field moved from `old` to `new`.
///
/// Each parser is tried in turn and only applies when both sides parse:
/// integer, percentage, resource quantity, duration, then plain equality.
pub fn delta(old: &str, new: &str) -> Delta {
    if is_missing(old) {
        return Delta::None;
    }

    if let (Some(a), Some(b)) = (parse_integer(old), parse_integer(new)) {
        return Delta::from_ordering(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (parse_percentage(old), parse_percentage(new)) {
        return Delta::from_ordering(a.total_cmp(&b));
    }
    if let (Some(a), Some(b)) = (parse_quantity(old), parse_quantity(new)) {
        return Delta::from_ordering(a.total_cmp(&b));
    }
    if let (Some(a), Some(b)) = (parse_duration(old), parse_duration(new)) {
        return Delta::from_ordering(a.cmp(&b));
    }

    if old == new {
        Delta::None
    } else {
        Delta::Changed
    }
}

pub fn parse_integer(value: &str) -> Option<i64> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains(',') {
        return raw.replace(',', "").parse().ok();
    }
    raw.parse().ok()
}

pub fn parse_percentage(value: &str) -> Option<f64> {
    let number = value.trim().strip_suffix('%')?;
    number.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Parses a Kubernetes resource quantity (`100m`, `1Gi`, `2k`, `1.5`) into its
/// base unit.
pub fn parse_quantity(value: &str) -> Option<f64> {
    const BINARY_UNITS: [(&str, f64); 6] = [
        ("Ei", 1_152_921_504_606_846_976.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ti", 1_099_511_627_776.0),
        ("Gi", 1_073_741_824.0),
        ("Mi", 1_048_576.0),
        ("Ki", 1_024.0),
    ];
    const DECIMAL_UNITS: [(&str, f64); 10] = [
        ("E", 1e18),
        ("P", 1e15),
        ("T", 1e12),
        ("G", 1e9),
        ("M", 1e6),
        ("K", 1e3),
        ("k", 1e3),
        ("m", 1e-3),
        ("u", 1e-6),
        ("n", 1e-9),
    ];

    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = BINARY_UNITS
        .iter()
        .chain(DECIMAL_UNITS.iter())
        .find_map(|(suffix, multiplier)| {
            raw.strip_suffix(suffix).map(|number| (number, *multiplier))
        })
        .unwrap_or((raw, 1.0));

    if number.is_empty() || !number.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return None;
    }
    let numeric = number.parse::<f64>().ok()?;
    let scaled = numeric * multiplier;
    scaled.is_finite().then_some(scaled)
}

/// Parses a compact duration made of `y`, `d`, `h`, `m` and `s` parts
/// (`2m33s`, `3d4h`, `49h3m12s`) into seconds. The whole string must match.
pub fn parse_duration(value: &str) -> Option<i64> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit = match ch {
            'y' => 365 * 86_400,
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        if digits.is_empty() {
            return None;
        }
        let amount = digits.parse::<i64>().ok()?;
        total = total.checked_add(amount.checked_mul(unit)?)?;
        digits.clear();
    }

    digits.is_empty().then_some(total)
}

/// Renders seconds as an exact compact duration, e.g. `49h3m12s`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{secs}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Renders seconds with decreasing precision as they grow, the way kubectl
/// prints ages.
pub fn human_duration(seconds: i64) -> String {
    if seconds < -1 {
        return "<invalid>".to_string();
    }
    if seconds < 0 {
        return "0s".to_string();
    }
    if seconds < 60 * 2 {
        return format!("{seconds}s");
    }

    let minutes = seconds / 60;
    if minutes < 10 {
        let secs = seconds % 60;
        if secs == 0 {
            return format!("{minutes}m");
        }
        return format!("{minutes}m{secs}s");
    }
    if minutes < 60 * 3 {
        return format!("{minutes}m");
    }

    let hours = minutes / 60;
    if hours < 8 {
        let mins = minutes % 60;
        if mins == 0 {
            return format!("{hours}h");
        }
        return format!("{hours}h{mins}m");
    }
    if hours < 48 {
        return format!("{hours}h");
    }
    if hours < 24 * 8 {
        let hrs = hours % 24;
        if hrs == 0 {
            return format!("{}d", hours / 24);
        }
        return format!("{}d{hrs}h", hours / 24);
    }
    if hours < 24 * 365 * 2 {
        return format!("{}d", hours / 24);
    }
    if hours < 24 * 365 * 8 {
        let days = (hours / 24) % 365;
        if days == 0 {
            return format!("{}y", hours / 24 / 365);
        }
        return format!("{}y{days}d", hours / 24 / 365);
    }
    format!("{}y", hours / 24 / 365)
}

/// Humanizes a raw duration cell, leaving anything unparsable untouched.
pub fn humanize_cell(value: &str) -> String {
    match parse_duration(value) {
        Some(seconds) => human_duration(seconds),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Delta, delta, format_duration, human_duration, humanize_cell, parse_duration,
        parse_quantity,
    };

    #[test]
    fn delta_follows_the_type_cascade() {
        assert_eq!(delta("1", "2"), Delta::Increase);
        assert_eq!(delta("2", "1"), Delta::Decrease);
        assert_eq!(delta("2m33s", "1m"), Delta::Decrease);
        assert_eq!(delta("10Gi", "20Gi"), Delta::Increase);
        assert_eq!(delta("fred", "fred"), Delta::None);
        assert_eq!(delta("fred", "blee"), Delta::Changed);
        assert_eq!(delta("45%", "12%"), Delta::Decrease);
        assert_eq!(delta("1,200", "1,300"), Delta::Increase);
        assert_eq!(delta("100m", "250m"), Delta::Increase);
    }

    #[test]
    fn missing_old_value_never_reports_a_delta() {
        assert_eq!(delta("<none>", "10"), Delta::None);
        assert_eq!(delta("n/a", "fred"), Delta::None);
        assert_eq!(delta("10", "<none>"), Delta::Changed);
    }

    #[test]
    fn quantities_scale_by_suffix() {
        assert_eq!(parse_quantity("1Ki"), Some(1024.0));
        assert_eq!(parse_quantity("2k"), Some(2000.0));
        assert_eq!(parse_quantity("500m"), Some(0.5));
        assert_eq!(parse_quantity("Running"), None);
        assert_eq!(parse_quantity("Mi"), None);
    }

    #[test]
    fn durations_require_a_full_match() {
        assert_eq!(parse_duration("2m33s"), Some(153));
        assert_eq!(parse_duration("1d2h"), Some(93_600));
        assert_eq!(parse_duration("1y"), Some(31_536_000));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("3x"), None);
        assert_eq!(parse_duration("m"), None);
    }

    #[test]
    fn durations_render_exact_and_human() {
        assert_eq!(format_duration(176_592), "49h3m12s");
        assert_eq!(format_duration(75), "1m15s");
        assert_eq!(format_duration(-4), "0s");

        assert_eq!(human_duration(42), "42s");
        assert_eq!(human_duration(153), "2m33s");
        assert_eq!(human_duration(3_600), "60m");
        assert_eq!(human_duration(5 * 3_600 + 120), "5h2m");
        assert_eq!(human_duration(176_592), "2d1h");
        assert_eq!(human_duration(20 * 86_400), "20d");
        assert_eq!(human_duration(3 * 365 * 86_400), "3y");
        assert_eq!(humanize_cell("49h3m12s"), "2d1h");
        assert_eq!(humanize_cell("<none>"), "<none>");
    }
}
