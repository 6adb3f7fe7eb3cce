use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use regex::{Regex, RegexBuilder};
use std::fmt::{Display, Formatter};

use crate::model::TableData;

const LABEL_PREFIX: &str = "-l";
const FUZZY_PREFIX: &str = "-f";
const INVERSE_PREFIX: char = '!';

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FilterMode<'a> {
    None,
    LabelSelector(&'a str),
    Fuzzy(&'a str),
    Regex(&'a str),
    InverseRegex(&'a str),
}

impl<'a> FilterMode<'a> {
    pub fn parse(text: &'a str) -> Self {
        let raw = text.trim();
        if raw.is_empty() {
            return Self::None;
        }
        if let Some(selector) = raw.strip_prefix(LABEL_PREFIX) {
            return Self::LabelSelector(selector.trim());
        }
        if let Some(query) = raw.strip_prefix(FUZZY_PREFIX) {
            let query = query.trim();
            if query.is_empty() {
                return Self::None;
            }
            return Self::Fuzzy(query);
        }
        if let Some(expression) = raw.strip_prefix(INVERSE_PREFIX) {
            if expression.is_empty() {
                return Self::None;
            }
            return Self::InverseRegex(expression);
        }
        Self::Regex(raw)
    }
}

/// Label selector carried by filter text, if any. An empty selector clears it.
pub fn label_selector(text: &str) -> Option<String> {
    match FilterMode::parse(text) {
        FilterMode::LabelSelector(selector) if !selector.is_empty() => Some(selector.to_string()),
        _ => None,
    }
}

#[derive(Debug)]
pub struct FilterError {
    expression: String,
    source: regex::Error,
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid filter {:?}", self.expression)
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

fn compile(expression: &str) -> Result<Regex, FilterError> {
    RegexBuilder::new(expression)
        .case_insensitive(true)
        .build()
        .map_err(|source| FilterError {
            expression: expression.to_string(),
            source,
        })
}

/// Returns a filtered copy of `data`. The input table is never modified.
pub fn filter_table(data: &TableData, text: &str) -> Result<TableData, FilterError> {
    match FilterMode::parse(text) {
        FilterMode::None | FilterMode::LabelSelector(_) => Ok(data.clone()),
        FilterMode::Fuzzy(query) => Ok(fuzzy_filter(data, query)),
        FilterMode::Regex(expression) => {
            let regex = compile(expression)?;
            Ok(regex_filter(data, &regex, false))
        }
        FilterMode::InverseRegex(expression) => {
            let regex = compile(expression)?;
            Ok(regex_filter(data, &regex, true))
        }
    }
}

fn regex_filter(data: &TableData, regex: &Regex, inverse: bool) -> TableData {
    let mut filtered = data.empty_like();
    for (key, event) in &data.rows {
        let line = event.fields.join(" ");
        if regex.is_match(&line) != inverse {
            filtered.rows.insert(key.clone(), event.clone());
        }
    }
    filtered
}

fn fuzzy_filter(data: &TableData, query: &str) -> TableData {
    let matcher = SkimMatcherV2::default();
    let name_column = data.scope.name_column();
    let mut filtered = data.empty_like();
    for (key, event) in &data.rows {
        if matcher
            .fuzzy_match(event.field(name_column), query)
            .is_some()
        {
            filtered.rows.insert(key.clone(), event.clone());
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::{FilterMode, filter_table, label_selector};
    use crate::model::{Header, RowAction, RowEvent, Scope, TableData};

    fn table(scope: Scope, rows: &[(&str, &[&str])]) -> TableData {
        let mut data = TableData::new(Header::from_names(&["NAME", "STATUS"]), scope);
        for (key, fields) in rows {
            data.rows.insert(
                key.to_string(),
                RowEvent::new(
                    RowAction::Unchanged,
                    fields.iter().map(|field| field.to_string()).collect(),
                ),
            );
        }
        data
    }

    fn sample() -> TableData {
        table(
            Scope::Namespace("ns".to_string()),
            &[
                ("ns/a", &["nginx", "Running"]),
                ("ns/b", &["redis", "Pending"]),
            ],
        )
    }

    #[test]
    fn prefix_selects_mode() {
        assert_eq!(FilterMode::parse(""), FilterMode::None);
        assert_eq!(FilterMode::parse("-l app=web"), FilterMode::LabelSelector("app=web"));
        assert_eq!(FilterMode::parse("-fngx"), FilterMode::Fuzzy("ngx"));
        assert_eq!(FilterMode::parse("!run"), FilterMode::InverseRegex("run"));
        assert_eq!(FilterMode::parse("ng.*"), FilterMode::Regex("ng.*"));
        assert_eq!(label_selector("-l  tier=db "), Some("tier=db".to_string()));
        assert_eq!(label_selector("-l"), None);
    }

    #[test]
    fn regex_matches_the_joined_row_case_insensitively() {
        let data = sample();
        let filtered = filter_table(&data, "nginx").unwrap();
        assert_eq!(filtered.rows.keys().collect::<Vec<_>>(), vec!["ns/a"]);

        let filtered = filter_table(&data, "PENDING").unwrap();
        assert_eq!(filtered.rows.keys().collect::<Vec<_>>(), vec!["ns/b"]);

        let filtered = filter_table(&data, "!nginx").unwrap();
        assert_eq!(filtered.rows.keys().collect::<Vec<_>>(), vec!["ns/b"]);
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn invalid_expression_is_an_error() {
        let error = filter_table(&sample(), "(").unwrap_err();
        assert!(error.to_string().contains("invalid filter"));
    }

    #[test]
    fn fuzzy_matches_only_the_name_column() {
        let data = table(
            Scope::AllNamespaces,
            &[
                ("web/a", &["web", "nginx"]),
                ("redis/b", &["redis", "cache"]),
            ],
        );
        let filtered = filter_table(&data, "-fngx").unwrap();
        assert_eq!(filtered.rows.keys().collect::<Vec<_>>(), vec!["web/a"]);

        let filtered = filter_table(&data, "-fredis").unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn label_selector_passes_rows_through() {
        let data = sample();
        assert_eq!(filter_table(&data, "-l app=web").unwrap(), data);
    }
}
