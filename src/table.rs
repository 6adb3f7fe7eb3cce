use anyhow::{Context, Result};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::style::Color;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use unicode_width::UnicodeWidthStr;

use crate::actions::{Action, Dispatch, Hint, KeyAction, KeyActions, KeyBinding, dispatch};
use crate::buffer::{BufferKind, BufferListener, CommandBuffer};
use crate::colorer::{ColorerFn, KILL_COLOR};
use crate::config::Styles;
use crate::delta::humanize_cell;
use crate::filter::filter_table;
use crate::model::{Flash, Header, Row, Scope, TableData, key_from_fields};
use crate::sorter::{SortColumn, sort_keys};

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RenderedCell {
    pub text: String,
    pub right_align: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RenderedRow {
    pub key: String,
    pub fields: Row,
    pub cells: Vec<RenderedCell>,
    pub color: Color,
    pub marked: bool,
    pub deleting: bool,
}

/// Sorted, filtered and formatted rows ready to draw.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RenderedTable {
    pub header: Vec<String>,
    /// Column carrying the sort indicator.
    pub sort_index: usize,
    pub rows: Vec<RenderedRow>,
    pub widths: Vec<u16>,
}

#[derive(Debug, Clone)]
pub enum KeyOutcome {
    Consumed,
    Flash(Flash),
    /// The filter buffer was submitted with this text.
    FilterSubmitted(String),
    /// A registry hit the table leaves to its owner.
    Action(Action),
    Pass(KeyEvent),
}

pub struct TableView {
    title: String,
    styles: Styles,
    colorer: ColorerFn,
    data: TableData,
    filter: CommandBuffer,
    sort: SortColumn,
    actions: KeyActions,
    /// 1-based row index; 0 means nothing is selected.
    selected: usize,
    selected_key: String,
    marks: BTreeSet<String>,
    deleting: BTreeSet<String>,
    rendered: RenderedTable,
    page_size: usize,
}

impl TableView {
    pub fn new(title: impl Into<String>, scope: Scope, styles: Styles, colorer: ColorerFn) -> Self {
        let mut view = Self {
            title: title.into(),
            styles,
            colorer,
            data: TableData::new(Header::default(), scope),
            filter: CommandBuffer::new('/', BufferKind::Filter),
            sort: SortColumn::default(),
            actions: KeyActions::new(),
            selected: 0,
            selected_key: String::new(),
            marks: BTreeSet::new(),
            deleting: BTreeSet::new(),
            rendered: RenderedTable::default(),
            page_size: DEFAULT_PAGE_SIZE,
        };
        view.bind_keys();
        view.sync_scope_bindings();
        view
    }

    fn bind_keys(&mut self) {
        let actions = &mut self.actions;
        actions.add(KeyBinding::ctrl('s'), KeyAction::new("Save", Action::SaveCsv));
        actions.add(KeyBinding::char('/'), KeyAction::new("Filter", Action::ActivateFilter));
        actions.add(KeyBinding::key(KeyCode::Esc), KeyAction::hidden("Back", Action::ResetFilter));
        actions.add(KeyBinding::key(KeyCode::Enter), KeyAction::hidden("Submit", Action::SubmitFilter));
        actions.add(KeyBinding::key(KeyCode::Backspace), KeyAction::hidden("Erase", Action::EraseFilter));
        actions.add(KeyBinding::key(KeyCode::Delete), KeyAction::hidden("Erase", Action::EraseFilter));
        actions.add(KeyBinding::char('I'), KeyAction::new("Invert", Action::SortInvert));
        actions.add(KeyBinding::char('N'), KeyAction::new("Sort Name", Action::SortName));
        actions.add(KeyBinding::char('A'), KeyAction::new("Sort Age", Action::SortAge));
        actions.add(KeyBinding::char(' '), KeyAction::new("Mark", Action::ToggleMark));
        actions.add(KeyBinding::ctrl(' '), KeyAction::new("Mark Range", Action::SpanMark));
        actions.add(KeyBinding::ctrl('\\'), KeyAction::new("Clear Marks", Action::ClearMarks));
        // Legacy terminals encode ctrl-space as NUL (ctrl-@) and ctrl-\ as ctrl-4.
        actions.add(KeyBinding::ctrl('@'), KeyAction::hidden("Mark Range", Action::SpanMark));
        actions.add(KeyBinding::ctrl('4'), KeyAction::hidden("Clear Marks", Action::ClearMarks));

        let navigation = [
            (KeyBinding::key(KeyCode::Up), "Up", Action::Up),
            (KeyBinding::char('k'), "Up", Action::Up),
            (KeyBinding::key(KeyCode::Down), "Down", Action::Down),
            (KeyBinding::char('j'), "Down", Action::Down),
            (KeyBinding::key(KeyCode::PageUp), "Page Up", Action::PageUp),
            (KeyBinding::ctrl('b'), "Page Up", Action::PageUp),
            (KeyBinding::key(KeyCode::PageDown), "Page Down", Action::PageDown),
            (KeyBinding::ctrl('f'), "Page Down", Action::PageDown),
            (KeyBinding::key(KeyCode::Home), "Top", Action::Top),
            (KeyBinding::char('g'), "Top", Action::Top),
            (KeyBinding::key(KeyCode::End), "Bottom", Action::Bottom),
            (KeyBinding::char('G'), "Bottom", Action::Bottom),
        ];
        for (binding, description, action) in navigation {
            actions.add(binding, KeyAction::hidden(description, action));
        }
    }

    /// Keeps the namespace sort key in step with the scope.
    fn sync_scope_bindings(&mut self) {
        let binding = KeyBinding::char('P');
        if self.data.scope.is_all() {
            self.actions
                .add(binding, KeyAction::new("Sort Namespace", Action::SortNamespace));
        } else {
            self.actions.delete(binding);
        }
    }

    pub fn add_filter_listener(&mut self, listener: Box<dyn BufferListener>) {
        self.filter.add_listener(listener);
    }

    pub fn actions(&self) -> &KeyActions {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut KeyActions {
        &mut self.actions
    }

    pub fn hints(&self) -> Vec<Hint> {
        self.actions.hints()
    }

    pub fn data(&self) -> &TableData {
        &self.data
    }

    pub fn rendered(&self) -> &RenderedTable {
        &self.rendered
    }

    pub fn styles(&self) -> &Styles {
        &self.styles
    }

    pub fn sort_column(&self) -> SortColumn {
        self.sort
    }

    pub fn filter_text(&self) -> String {
        self.filter.text()
    }

    pub fn filter_active(&self) -> bool {
        self.filter.is_active()
    }

    pub fn set_page_size(&mut self, rows: usize) {
        self.page_size = rows.max(1);
    }

    /// Replaces the table data and rebuilds the render model.
    pub fn update(&mut self, data: TableData) -> Option<Flash> {
        if self.sort.column_count == 0 {
            self.sort = SortColumn::new(data.scope.name_column());
        }
        self.sort.adjust(data.header.len());
        self.marks.retain(|key| data.rows.contains_key(key));
        self.deleting.retain(|key| data.rows.contains_key(key));
        self.data = data;
        self.sync_scope_bindings();

        let flash = self.refresh();
        if self.selected == 0 && !self.rendered.rows.is_empty() {
            self.select_row(1);
        }
        flash
    }

    /// Rebuilds the render model from the current data, filter and sort.
    pub fn refresh(&mut self) -> Option<Flash> {
        let mut flash = None;
        let text = self.filter.text();
        let filtered = match filter_table(&self.data, &text) {
            Ok(filtered) => filtered,
            Err(error) => {
                warn!("{error}");
                self.filter.reset();
                flash = Some(Flash::warn(error.to_string()));
                self.data.clone()
            }
        };

        let header = &filtered.header;
        let right_align = header
            .columns
            .iter()
            .map(|column| column.numeric || is_usage_column(&column.name))
            .collect::<Vec<_>>();

        let mut rows = Vec::with_capacity(filtered.rows.len());
        for key in sort_keys(&filtered.rows, self.sort) {
            let Some(event) = filtered.rows.get(&key) else {
                continue;
            };
            let cells = event
                .fields
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    let mut text = if header.is_time(index) {
                        humanize_cell(field)
                    } else {
                        field.clone()
                    };
                    if let Some(delta) = event.deltas.get(index) {
                        text.push_str(delta.glyph());
                    }
                    RenderedCell {
                        text,
                        right_align: right_align.get(index).copied().unwrap_or(false),
                    }
                })
                .collect::<Vec<_>>();
            let deleting = self.deleting.contains(&key);
            let color = if deleting {
                KILL_COLOR
            } else {
                (self.colorer)(&filtered.scope, event)
            };
            rows.push(RenderedRow {
                marked: self.marks.contains(&key),
                key,
                fields: event.fields.clone(),
                cells,
                color,
                deleting,
            });
        }

        let header_cells = header
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                if index == self.sort.index {
                    format!("{}{}", column.name, self.sort.indicator())
                } else {
                    column.name.clone()
                }
            })
            .collect::<Vec<_>>();
        let widths = column_widths(header, &rows, self.sort.index);

        self.rendered = RenderedTable {
            header: header_cells,
            sort_index: self.sort.index,
            rows,
            widths,
        };
        self.restore_selection();
        flash
    }

    fn restore_selection(&mut self) {
        if self.selected == 0 {
            return;
        }
        let found = self
            .rendered
            .rows
            .iter()
            .position(|row| row.key == self.selected_key);
        match found {
            Some(position) => self.selected = position + 1,
            None => self.select_row(self.selected),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rendered.rows.len()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Selects a 1-based row. Row 0, or any row of an empty table, clears the
    /// selection; anything past the end clamps to the last row.
    pub fn select_row(&mut self, index: usize) {
        let len = self.rendered.rows.len();
        if index == 0 || len == 0 {
            self.selected = 0;
            self.selected_key.clear();
            return;
        }
        self.selected = index.min(len);
        self.selected_key = self.selected_key_at(self.selected);
    }

    fn selected_key_at(&self, index: usize) -> String {
        index
            .checked_sub(1)
            .and_then(|position| self.rendered.rows.get(position))
            .map(|row| key_from_fields(&self.data.scope, &row.fields))
            .unwrap_or_default()
    }

    /// Stable key of the selected row, or an empty string.
    pub fn selected_key(&self) -> String {
        self.selected_key_at(self.selected)
    }

    /// Raw fields of the selected row, or an empty row.
    pub fn selected_row(&self) -> Row {
        self.selected
            .checked_sub(1)
            .and_then(|position| self.rendered.rows.get(position))
            .map(|row| row.fields.clone())
            .unwrap_or_default()
    }

    /// Marked keys, or the selected key when nothing is marked.
    pub fn selected_keys(&self) -> Vec<String> {
        if !self.marks.is_empty() {
            return self.marks.iter().cloned().collect();
        }
        let key = self.selected_key();
        if key.is_empty() { Vec::new() } else { vec![key] }
    }

    pub fn toggle_mark(&mut self) {
        let key = self.selected_key();
        if key.is_empty() {
            return;
        }
        if !self.marks.remove(&key) {
            self.marks.insert(key);
        }
        self.sync_marks();
    }

    /// Marks every row between the nearest existing mark and the selection.
    pub fn span_mark(&mut self) {
        let Some(current) = self.selected.checked_sub(1) else {
            return;
        };
        let nearest = self
            .rendered
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.marks.contains(&row.key))
            .map(|(position, _)| position)
            .min_by_key(|position| position.abs_diff(current));
        let Some(anchor) = nearest else {
            self.toggle_mark();
            return;
        };

        let (start, end) = if anchor <= current {
            (anchor, current)
        } else {
            (current, anchor)
        };
        let keys = self.rendered.rows[start..=end]
            .iter()
            .map(|row| key_from_fields(&self.data.scope, &row.fields))
            .collect::<Vec<_>>();
        self.marks.extend(keys);
        self.sync_marks();
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear();
        self.sync_marks();
    }

    pub fn marked_keys(&self) -> BTreeSet<String> {
        self.marks.clone()
    }

    fn sync_marks(&mut self) {
        for row in &mut self.rendered.rows {
            row.marked = self.marks.contains(&row.key);
        }
    }

    /// Dims these rows until they disappear from the data.
    pub fn set_deleting(&mut self, keys: impl IntoIterator<Item = String>) {
        self.deleting.extend(keys);
        for row in &mut self.rendered.rows {
            if self.deleting.contains(&row.key) {
                row.deleting = true;
                row.color = KILL_COLOR;
            }
        }
    }

    /// Undims rows whose deletion did not go through.
    pub fn clear_deleting(&mut self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        for key in keys {
            self.deleting.remove(key);
        }
        for row in &mut self.rendered.rows {
            if row.deleting && !self.deleting.contains(&row.key) {
                row.deleting = false;
                if let Some(event) = self.data.rows.get(&row.key) {
                    row.color = (self.colorer)(&self.data.scope, event);
                }
            }
        }
    }

    pub fn is_deleting(&self, key: &str) -> bool {
        self.deleting.contains(key)
    }

    pub fn title(&self) -> String {
        let count = self.rendered.rows.len();
        let mut title = match &self.data.scope {
            Scope::NotNamespaced => format!("{}[{count}]", self.title),
            scope => format!("{}({scope})[{count}]", self.title),
        };
        if !self.filter.is_active() && !self.filter.is_empty() {
            title.push_str(&format!(" </{}>", self.filter.text()));
        }
        title
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.rendered.rows.len();
        if len == 0 {
            self.select_row(0);
            return;
        }
        let current = self.selected.max(1) as isize;
        let next = (current + delta).clamp(1, len as isize) as usize;
        self.select_row(next);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match dispatch(&self.actions, self.filter.is_active(), key) {
            Dispatch::Buffered(ch) => {
                self.filter.add(ch);
                self.refresh_outcome()
            }
            Dispatch::Action(action) => self.apply(action, key),
            Dispatch::Unhandled(key) => KeyOutcome::Pass(key),
        }
    }

    fn refresh_outcome(&mut self) -> KeyOutcome {
        match self.refresh() {
            Some(flash) => KeyOutcome::Flash(flash),
            None => KeyOutcome::Consumed,
        }
    }

    fn apply(&mut self, action: Action, key: KeyEvent) -> KeyOutcome {
        match action {
            Action::ActivateFilter => {
                self.filter.clear();
                self.filter.set_active(true);
                self.refresh_outcome()
            }
            Action::ResetFilter => {
                if !self.filter.is_active() && self.filter.is_empty() {
                    return KeyOutcome::Action(Action::Back);
                }
                self.filter.reset();
                self.refresh_outcome()
            }
            Action::EraseFilter => {
                if !self.filter.is_active() {
                    return KeyOutcome::Pass(key);
                }
                self.filter.delete();
                self.refresh_outcome()
            }
            Action::SubmitFilter => {
                if !self.filter.is_active() {
                    return KeyOutcome::Action(Action::Enter);
                }
                self.filter.set_active(false);
                let text = self.filter.text();
                if !text.trim().is_empty() {
                    self.select_row(1);
                }
                KeyOutcome::FilterSubmitted(text)
            }
            Action::SortInvert => {
                self.sort.invert();
                self.refresh_outcome()
            }
            Action::SortName => {
                self.sort.set(self.data.scope.name_column());
                self.refresh_outcome()
            }
            Action::SortAge => {
                self.sort.set(self.data.header.len().saturating_sub(1));
                self.refresh_outcome()
            }
            Action::SortNamespace => {
                if self.data.scope.is_all() {
                    self.sort.set(0);
                }
                self.refresh_outcome()
            }
            Action::Up => {
                self.move_selection(-1);
                KeyOutcome::Consumed
            }
            Action::Down => {
                self.move_selection(1);
                KeyOutcome::Consumed
            }
            Action::PageUp => {
                self.move_selection(-(self.page_size as isize));
                KeyOutcome::Consumed
            }
            Action::PageDown => {
                self.move_selection(self.page_size as isize);
                KeyOutcome::Consumed
            }
            Action::Top => {
                self.select_row(1);
                KeyOutcome::Consumed
            }
            Action::Bottom => {
                self.select_row(self.rendered.rows.len());
                KeyOutcome::Consumed
            }
            Action::ToggleMark => {
                self.toggle_mark();
                KeyOutcome::Consumed
            }
            Action::SpanMark => {
                self.span_mark();
                KeyOutcome::Consumed
            }
            Action::ClearMarks => {
                self.clear_marks();
                KeyOutcome::Consumed
            }
            other => KeyOutcome::Action(other),
        }
    }

    /// Writes the unfiltered data, in display order, as CSV under
    /// `dir/<context>/` and returns the file path.
    pub fn save_csv(&self, dir: &Path, context: &str) -> Result<PathBuf> {
        let dir = dir.join(sanitize_file_part(context));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create dump dir {}", dir.display()))?;

        let nanos = Local::now().timestamp_nanos_opt().unwrap_or_default();
        let title = sanitize_file_part(&self.title.to_ascii_lowercase());
        let name = match &self.data.scope {
            Scope::NotNamespaced => format!("{title}-{nanos}.csv"),
            scope => format!("{title}-{}-{nanos}.csv", sanitize_file_part(&scope.label())),
        };
        let path = dir.join(name);

        let mut out = csv_line(&self.data.header.names());
        for key in sort_keys(&self.data.rows, self.sort) {
            if let Some(event) = self.data.rows.get(&key) {
                out.push_str(&csv_line(&event.fields));
            }
        }
        fs::write(&path, out).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), rows = self.data.rows.len(), "table saved");
        Ok(path)
    }
}

/// Headers such as `CPU`, `%MEM` or `MEM/A` hold resource figures.
fn is_usage_column(name: &str) -> bool {
    let rest = name
        .char_indices()
        .nth(1)
        .map(|(index, _)| &name[index..])
        .unwrap_or("");
    [name, rest]
        .iter()
        .any(|value| value.starts_with("CPU") || value.starts_with("MEM"))
}

fn column_widths(header: &Header, rows: &[RenderedRow], sort_index: usize) -> Vec<u16> {
    header
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let widest = rows
                .iter()
                .filter_map(|row| row.cells.get(index))
                .map(|cell| cell.text.width())
                .max()
                .unwrap_or(0);
            let mut width = column.name.width().max(widest) + 1;
            if index == sort_index {
                width += 2;
            }
            u16::try_from(width).unwrap_or(u16::MAX)
        })
        .collect()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|field| csv_field(field))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

fn sanitize_file_part(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | ' ' => '-',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{KeyOutcome, TableView, csv_field, is_usage_column};
    use crate::actions::{Action, KeyBinding};
    use crate::colorer::{KILL_COLOR, default_colorer};
    use crate::config::Styles;
    use crate::delta::Delta;
    use crate::model::{Header, HeaderColumn, RowAction, RowEvent, Scope, TableData};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::fs;

    fn data(scope: Scope, names: &[&str], rows: &[(&str, &[&str])]) -> TableData {
        let mut data = TableData::new(Header::from_names(names), scope);
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

    fn pods() -> TableData {
        data(
            Scope::Namespace("ns".to_string()),
            &["NAME", "STATUS", "AGE"],
            &[
                ("ns/nginx", &["nginx", "Running", "2m33s"]),
                ("ns/redis", &["redis", "Pending", "49h3m12s"]),
                ("ns/api", &["api", "Running", "10s"]),
            ],
        )
    }

    fn view(scope: Scope) -> TableView {
        TableView::new("Pods", scope, Styles::default(), default_colorer)
    }

    fn press(table: &mut TableView, code: KeyCode) -> KeyOutcome {
        table.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(table: &mut TableView, text: &str) {
        for ch in text.chars() {
            press(table, KeyCode::Char(ch));
        }
    }

    fn keys(table: &TableView) -> Vec<String> {
        table.rendered().rows.iter().map(|row| row.key.clone()).collect()
    }

    #[test]
    fn rows_sort_by_name_and_first_row_is_selected() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        assert_eq!(keys(&table), vec!["ns/api", "ns/nginx", "ns/redis"]);
        assert_eq!(table.selected_index(), 1);
        assert_eq!(table.selected_key(), "ns/api");
        assert_eq!(table.rendered().header[0], "NAME↑");
        assert_eq!(table.rendered().sort_index, 0);
        assert_eq!(table.title(), "Pods(ns)[3]");
    }

    #[test]
    fn selection_follows_the_key_across_updates() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        table.select_row(2);
        assert_eq!(table.selected_key(), "ns/nginx");

        let mut next = pods();
        next.rows.remove("ns/api");
        table.update(next);
        assert_eq!(table.selected_index(), 1);
        assert_eq!(table.selected_key(), "ns/nginx");
        assert_eq!(table.selected_row()[1], "Running");
    }

    #[test]
    fn row_zero_means_no_selection() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        table.select_row(0);
        assert_eq!(table.selected_key(), "");
        assert!(table.selected_row().is_empty());
        assert!(table.selected_keys().is_empty());
        table.select_row(99);
        assert_eq!(table.selected_index(), 3);
    }

    #[test]
    fn cells_are_humanized_flagged_and_aligned() {
        let mut input = data(
            Scope::NotNamespaced,
            &["NAME", "RESTARTS", "%CPU", "AGE"],
            &[],
        );
        input.header.columns[1] = HeaderColumn::numeric("RESTARTS");
        input.rows.insert(
            "node".to_string(),
            RowEvent::with_deltas(
                vec!["node".into(), "3".into(), "12".into(), "49h3m12s".into()],
                vec![Delta::None, Delta::Increase, Delta::None, Delta::None],
            ),
        );
        let mut table = view(Scope::NotNamespaced);
        table.update(input);

        let row = &table.rendered().rows[0];
        assert_eq!(row.cells[1].text, "3↑");
        assert!(row.cells[1].right_align);
        assert!(row.cells[2].right_align);
        assert!(!row.cells[0].right_align);
        assert_eq!(row.cells[3].text, "2d1h");
        // NAME carries the sort indicator reservation.
        assert_eq!(table.rendered().widths, vec![7, 9, 5, 5]);
        assert_eq!(table.title(), "Pods[1]");
    }

    #[test]
    fn usage_headers_right_align() {
        assert!(is_usage_column("CPU"));
        assert!(is_usage_column("%MEM"));
        assert!(!is_usage_column("NAME"));
    }

    #[test]
    fn sort_keys_invert_and_reset() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        press(&mut table, KeyCode::Char('I'));
        assert_eq!(keys(&table), vec!["ns/redis", "ns/nginx", "ns/api"]);
        assert_eq!(table.rendered().header[0], "NAME↓");

        press(&mut table, KeyCode::Char('A'));
        assert!(table.sort_column().ascending);
        assert_eq!(keys(&table), vec!["ns/api", "ns/nginx", "ns/redis"]);
    }

    #[test]
    fn namespace_sort_key_follows_scope() {
        let mut table = view(Scope::AllNamespaces);
        table.update(data(
            Scope::AllNamespaces,
            &["NAMESPACE", "NAME"],
            &[("b/x", &["b", "x"]), ("a/y", &["a", "y"])],
        ));
        assert!(table.actions().contains(KeyBinding::char('P')));
        assert_eq!(table.sort_column().index, 1);
        assert_eq!(keys(&table), vec!["b/x", "a/y"]);
        press(&mut table, KeyCode::Char('P'));
        assert_eq!(keys(&table), vec!["a/y", "b/x"]);
        assert_eq!(table.selected_key(), "b/x");

        table.update(data(
            Scope::Namespace("a".to_string()),
            &["NAME"],
            &[("a/y", &["y"])],
        ));
        assert!(!table.actions().contains(KeyBinding::char('P')));
        assert_eq!(table.sort_column().index, 0);
    }

    #[test]
    fn filter_narrows_rows_and_submits() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        press(&mut table, KeyCode::Char('/'));
        assert!(table.filter_active());
        type_text(&mut table, "ngi");
        assert_eq!(keys(&table), vec!["ns/nginx"]);

        let outcome = press(&mut table, KeyCode::Enter);
        assert!(matches!(outcome, KeyOutcome::FilterSubmitted(text) if text == "ngi"));
        assert!(!table.filter_active());
        assert_eq!(table.selected_key(), "ns/nginx");
        assert_eq!(table.title(), "Pods(ns)[1] </ngi>");
        assert_eq!(table.data().rows.len(), 3);

        press(&mut table, KeyCode::Esc);
        assert_eq!(keys(&table).len(), 3);
        assert!(matches!(
            press(&mut table, KeyCode::Esc),
            KeyOutcome::Action(Action::Back)
        ));
    }

    #[test]
    fn invalid_filter_clears_the_buffer() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        press(&mut table, KeyCode::Char('/'));
        let outcome = press(&mut table, KeyCode::Char('('));
        assert!(matches!(outcome, KeyOutcome::Flash(_)));
        assert_eq!(table.filter_text(), "");
        assert!(!table.filter_active());
        assert_eq!(keys(&table).len(), 3);
    }

    #[test]
    fn backspace_edits_only_an_active_filter() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        assert!(matches!(
            press(&mut table, KeyCode::Backspace),
            KeyOutcome::Pass(_)
        ));
        press(&mut table, KeyCode::Char('/'));
        type_text(&mut table, "re");
        press(&mut table, KeyCode::Backspace);
        assert_eq!(table.filter_text(), "r");
        assert!(matches!(
            press(&mut table, KeyCode::Enter),
            KeyOutcome::FilterSubmitted(_)
        ));
        assert!(matches!(
            press(&mut table, KeyCode::Enter),
            KeyOutcome::Action(Action::Enter)
        ));
    }

    #[test]
    fn marks_are_independent_of_selection() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        press(&mut table, KeyCode::Char(' '));
        assert_eq!(table.selected_index(), 1);
        table.select_row(3);
        table.handle_key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::CONTROL));
        assert_eq!(table.marked_keys().len(), 3);
        assert_eq!(table.selected_key(), "ns/redis");
        assert!(table.rendered().rows.iter().all(|row| row.marked));

        table.toggle_mark();
        assert_eq!(
            table.selected_keys(),
            vec!["ns/api".to_string(), "ns/nginx".to_string()]
        );
        table.handle_key(KeyEvent::new(KeyCode::Char('\\'), KeyModifiers::CONTROL));
        assert!(table.marked_keys().is_empty());
        assert_eq!(table.selected_keys(), vec!["ns/redis".to_string()]);
    }

    #[test]
    fn legacy_control_codes_reach_mark_actions() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        press(&mut table, KeyCode::Char(' '));
        table.select_row(3);
        table.handle_key(KeyEvent::new(KeyCode::Char('@'), KeyModifiers::CONTROL));
        assert_eq!(table.marked_keys().len(), 3);

        table.handle_key(KeyEvent::new(KeyCode::Char('4'), KeyModifiers::CONTROL));
        assert!(table.marked_keys().is_empty());
        assert!(!table.hints().iter().any(|hint| hint.mnemonic == "ctrl-4"));
    }

    #[test]
    fn deleting_rows_stay_dim_until_gone() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        table.set_deleting(vec!["ns/redis".to_string()]);
        table.update(pods());
        let row = &table.rendered().rows[2];
        assert!(row.deleting);
        assert_eq!(row.color, KILL_COLOR);

        let mut next = pods();
        next.rows.remove("ns/redis");
        table.update(next);
        assert!(!table.is_deleting("ns/redis"));
    }

    #[test]
    fn navigation_clamps() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(pods());
        press(&mut table, KeyCode::Up);
        assert_eq!(table.selected_index(), 1);
        press(&mut table, KeyCode::Char('G'));
        assert_eq!(table.selected_index(), 3);
        press(&mut table, KeyCode::Char('j'));
        assert_eq!(table.selected_index(), 3);
        press(&mut table, KeyCode::PageUp);
        assert_eq!(table.selected_index(), 1);
        press(&mut table, KeyCode::PageDown);
        assert_eq!(table.selected_index(), 3);
        press(&mut table, KeyCode::Char('g'));
        assert_eq!(table.selected_index(), 1);
    }

    #[test]
    fn unknown_keys_are_forwarded() {
        let mut table = view(Scope::Namespace("ns".to_string()));
        assert!(matches!(
            table.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)),
            KeyOutcome::Action(Action::SaveCsv)
        ));
        assert!(matches!(
            press(&mut table, KeyCode::Char('z')),
            KeyOutcome::Pass(_)
        ));
    }

    #[test]
    fn csv_dump_writes_unfiltered_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut input = pods();
        input.rows.insert(
            "ns/quoted".to_string(),
            RowEvent::new(
                RowAction::Added,
                vec!["quoted".into(), "a,\"b\"".into(), "1s".into()],
            ),
        );
        let mut table = view(Scope::Namespace("ns".to_string()));
        table.update(input);
        press(&mut table, KeyCode::Char('/'));
        type_text(&mut table, "nginx");

        let path = table.save_csv(dir.path(), "kind/dev").unwrap();
        assert!(path.starts_with(dir.path().join("kind-dev")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pods-ns-"));
        assert!(name.ends_with(".csv"));

        let content = fs::read_to_string(&path).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "NAME,STATUS,AGE");
        assert_eq!(lines[1], "api,Running,10s");
        assert_eq!(lines[3], "quoted,\"a,\"\"b\"\"\",1s");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn csv_fields_quote_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a\nb"), "\"a\nb\"");
    }
}
