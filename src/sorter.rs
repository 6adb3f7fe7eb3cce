use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::delta::{parse_duration, parse_integer, parse_percentage, parse_quantity};
use crate::model::{RowEvents, is_missing};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SortColumn {
    pub index: usize,
    pub column_count: usize,
    pub ascending: bool,
}

impl Default for SortColumn {
    fn default() -> Self {
        Self {
            index: 0,
            column_count: 0,
            ascending: true,
        }
    }
}

impl SortColumn {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Follows the header when a leading column appears or disappears so the
    /// same logical column stays active.
    pub fn adjust(&mut self, header_len: usize) {
        if header_len == 0 {
            return;
        }
        if self.column_count != 0 && self.column_count != header_len {
            if header_len > self.column_count {
                self.index += 1;
            } else {
                self.index = self.index.saturating_sub(1);
            }
        }
        self.column_count = header_len;
        self.index = self.index.min(header_len - 1);
    }

    pub fn set(&mut self, index: usize) {
        self.index = if self.column_count == 0 {
            index
        } else {
            index.min(self.column_count - 1)
        };
        self.ascending = true;
    }

    pub fn invert(&mut self) {
        self.ascending = !self.ascending;
    }

    pub fn indicator(&self) -> &'static str {
        if self.ascending { "↑" } else { "↓" }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum ValueKind {
    Integer,
    Percentage,
    Quantity,
    Duration,
    Natural,
}

impl ValueKind {
    const CASCADE: [Self; 4] = [
        Self::Integer,
        Self::Percentage,
        Self::Quantity,
        Self::Duration,
    ];

    fn parses(self, value: &str) -> bool {
        match self {
            Self::Integer => parse_integer(value).is_some(),
            Self::Percentage => parse_percentage(value).is_some(),
            Self::Quantity => parse_quantity(value).is_some(),
            Self::Duration => parse_duration(value).is_some(),
            Self::Natural => true,
        }
    }

    /// First kind in the cascade that accepts every value.
    fn detect<'a>(values: impl Iterator<Item = &'a str> + Clone) -> Self {
        Self::CASCADE
            .into_iter()
            .find(|kind| values.clone().all(|value| kind.parses(value)))
            .unwrap_or(Self::Natural)
    }

    fn compare(self, left: &str, right: &str) -> Ordering {
        let ordering = match self {
            Self::Integer => parse_integer(left).cmp(&parse_integer(right)),
            Self::Percentage => cmp_f64(parse_percentage(left), parse_percentage(right)),
            Self::Quantity => cmp_f64(parse_quantity(left), parse_quantity(right)),
            Self::Duration => parse_duration(left).cmp(&parse_duration(right)),
            Self::Natural => Ordering::Equal,
        };
        ordering.then_with(|| natural_cmp(left, right))
    }
}

fn cmp_f64(left: Option<f64>, right: Option<f64>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        (left, right) => left.is_some().cmp(&right.is_some()),
    }
}

/// Compares two cell values using the first parser that accepts both.
/// Missing-value sentinels always sort after real values.
pub fn compare_values(left: &str, right: &str) -> Ordering {
    match (is_missing(left), is_missing(right)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let kind = ValueKind::detect([left, right].into_iter());
    kind.compare(left, right)
}

/// Number-aware lexical order: `pod-2` sorts before `pod-10`.
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let mut left_chars = left.chars().peekable();
    let mut right_chars = right.chars().peekable();

    loop {
        match (left_chars.peek().copied(), right_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let left_run = take_digits(&mut left_chars);
                let right_run = take_digits(&mut right_chars);
                let left_trimmed = left_run.trim_start_matches('0');
                let right_trimmed = right_run.trim_start_matches('0');
                let ordering = left_trimmed
                    .len()
                    .cmp(&right_trimmed.len())
                    .then_with(|| left_trimmed.cmp(right_trimmed))
                    .then_with(|| left_run.len().cmp(&right_run.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.cmp(&r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left_chars.next();
                right_chars.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(ch) = chars.peek().copied() {
        if !ch.is_ascii_digit() {
            break;
        }
        run.push(ch);
        chars.next();
    }
    run
}

/// Orders row keys by the active column.
///
/// Keys are grouped by their cell value and each group keeps its keys in
/// ascending key order. Groups are ordered by value in the requested
/// direction, with missing values last either way.
pub fn sort_keys(rows: &RowEvents, column: SortColumn) -> Vec<String> {
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, event) in rows {
        groups.entry(event.field(column.index)).or_default().push(key);
    }

    let (mut present, missing): (Vec<&str>, Vec<&str>) =
        groups.keys().copied().partition(|value| !is_missing(value));

    let kind = ValueKind::detect(present.iter().copied());
    present.sort_by(|left, right| {
        let ordering = kind.compare(left, right);
        if column.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });

    present
        .into_iter()
        .chain(missing)
        .flat_map(|value| groups.get(value).cloned().unwrap_or_default())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{SortColumn, compare_values, natural_cmp, sort_keys};
    use crate::model::{RowAction, RowEvent, RowEvents};
    use std::cmp::Ordering;

    fn rows(entries: &[(&str, &str)]) -> RowEvents {
        entries
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    RowEvent::new(RowAction::Unchanged, vec![value.to_string()]),
                )
            })
            .collect()
    }

    #[test]
    fn groups_keep_stable_key_order() {
        let rows = rows(&[("k2", "b"), ("k1", "a"), ("k3", "a")]);
        let mut column = SortColumn::new(0);
        assert_eq!(sort_keys(&rows, column), vec!["k1", "k3", "k2"]);

        column.invert();
        assert_eq!(sort_keys(&rows, column), vec!["k2", "k1", "k3"]);
    }

    #[test]
    fn missing_values_sort_last_in_both_directions() {
        let rows = rows(&[("a", "<none>"), ("b", "3"), ("c", "10"), ("d", "n/a")]);
        let mut column = SortColumn::new(0);
        assert_eq!(sort_keys(&rows, column), vec!["b", "c", "a", "d"]);
        column.invert();
        assert_eq!(sort_keys(&rows, column), vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn typed_columns_sort_by_value() {
        let quantities = rows(&[("a", "2Gi"), ("b", "512Mi"), ("c", "1Ti")]);
        assert_eq!(sort_keys(&quantities, SortColumn::new(0)), vec!["b", "a", "c"]);

        let durations = rows(&[("a", "1h2m"), ("b", "59s"), ("c", "3m")]);
        assert_eq!(sort_keys(&durations, SortColumn::new(0)), vec!["b", "c", "a"]);

        let names = rows(&[("a", "pod-10"), ("b", "pod-2"), ("c", "pod-1")]);
        assert_eq!(sort_keys(&names, SortColumn::new(0)), vec!["c", "b", "a"]);
    }

    #[test]
    fn comparator_follows_the_cascade() {
        assert_eq!(compare_values("9", "10"), Ordering::Less);
        assert_eq!(compare_values("100m", "1"), Ordering::Less);
        assert_eq!(compare_values("2m33s", "1m"), Ordering::Greater);
        assert_eq!(compare_values("<none>", "a"), Ordering::Greater);
        assert_eq!(natural_cmp("a02", "a2"), Ordering::Greater);
        assert_eq!(natural_cmp("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn sort_column_tracks_header_shape() {
        let mut column = SortColumn::new(2);
        column.adjust(5);
        assert_eq!((column.index, column.column_count), (2, 5));

        column.adjust(6);
        assert_eq!(column.index, 3);
        column.adjust(5);
        assert_eq!(column.index, 2);

        column.set(9);
        assert_eq!(column.index, 4);
        assert!(column.ascending);
        column.invert();
        assert_eq!(column.indicator(), "↓");
    }
}
