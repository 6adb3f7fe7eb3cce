use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::actions::Hint;
use crate::app::App;
use crate::config::Styles;
use crate::model::FlashLevel;
use crate::view::{DetailView, Page, ResourceView};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);
const PL_E: Color = Color::Rgb(13, 148, 136);
const CRUMB: Color = Color::Rgb(30, 41, 59);
const MENU_ROWS: usize = 3;

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(MENU_ROWS as u16),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_menu(frame, root[1], app);
    render_body(frame, root[2], app);
    render_footer(frame, root[3], app);

    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let left_line = build_left_header_line(app);
    let right_line = build_right_header_line(app);
    let right_width = spans_width(&right_line.spans) as u16;
    if area.width < 42 || right_width == 0 || right_width >= area.width {
        frame.render_widget(
            Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(right_line).style(Style::default().bg(BG)),
        chunks[1],
    );
}

fn build_left_header_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " kubedeck ", Color::White, PL_A, PL_B);
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(app.context(), 24)),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(&display_cluster_endpoint(app.cluster()), 32)),
        Color::White,
        PL_C,
        PL_D,
    );
    push_powerline_segment(
        &mut spans,
        format!(" ns:{} ", app.selection()),
        Color::White,
        PL_D,
        BG,
    );
    Line::from(spans)
}

fn build_right_header_line(app: &App) -> Line<'static> {
    let crumbs = app.breadcrumbs();
    let mut spans = Vec::new();
    let mut prev_bg = BG;
    for (index, crumb) in crumbs.iter().enumerate() {
        let top = index + 1 == crumbs.len();
        let bg = if top { PL_E } else { CRUMB };
        let fg = if top { Color::Black } else { Color::White };
        push_powerline_segment_rtl(
            &mut spans,
            format!(" {} ", compact_text(crumb, 20)),
            fg,
            bg,
            prev_bg,
        );
        prev_bg = bg;
    }
    spans.push(Span::styled(
        format!(" {} ", Local::now().format("%H:%M:%S")),
        Style::default().fg(MUTED).bg(BG),
    ));
    Line::from(spans)
}

fn render_menu(frame: &mut Frame, area: Rect, app: &App) {
    let lines = menu_lines(&app.hints(), MENU_ROWS, area.width as usize);
    frame.render_widget(
        Paragraph::new(lines).style(Style::default().bg(BG).fg(Color::White)),
        area,
    );
}

/// Lays hints out column by column, `rows` entries per column, dropping
/// whole columns that would not fit in `width`.
fn menu_lines(hints: &[Hint], rows: usize, width: usize) -> Vec<Line<'static>> {
    let rows = rows.max(1);
    let mut lines = vec![Vec::<Span<'static>>::new(); rows];
    let mut used = 0usize;
    for column in hints.chunks(rows) {
        let key_width = column
            .iter()
            .map(|hint| hint.mnemonic.width() + 2)
            .max()
            .unwrap_or(0);
        let column_width = column
            .iter()
            .map(|hint| key_width + hint.description.width())
            .max()
            .unwrap_or(0)
            + 2;
        if used + column_width > width {
            break;
        }
        for (row, hint) in column.iter().enumerate() {
            let key = format!("<{}>", hint.mnemonic);
            let pad = key_width.saturating_sub(key.width()) + 1;
            let text = format!("{}{}", " ".repeat(pad), hint.description);
            let fill = column_width.saturating_sub(key.width() + text.width());
            lines[row].push(Span::styled(
                key,
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ));
            lines[row].push(Span::styled(text, Style::default().fg(MUTED)));
            lines[row].push(Span::raw(" ".repeat(fill)));
        }
        for line in lines.iter_mut().skip(column.len()) {
            line.push(Span::raw(" ".repeat(column_width)));
        }
        used += column_width;
    }
    lines.into_iter().map(Line::from).collect()
}

fn render_body(frame: &mut Frame, area: Rect, app: &mut App) {
    app.set_page_size(table_rows_visible(area));

    match app.top() {
        Some(Page::Resource(view)) => render_table(frame, area, view),
        Some(Page::Detail(view)) => render_detail(frame, area, view),
        None => frame.render_widget(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(MUTED))
                .style(Style::default().bg(PANEL)),
            area,
        ),
    }
}

fn render_table(frame: &mut Frame, area: Rect, view: &ResourceView) {
    let table = view.table();
    let styles = table.styles();
    let rendered = table.rendered();

    let header_row = Row::new(rendered.header.iter().enumerate().map(|(index, header)| {
        Cell::from(header_line(header, index == rendered.sort_index, styles))
    }))
    .height(1)
    .style(Style::default().fg(styles.header_fg).bg(styles.header_bg));

    let rows = rendered.rows.iter().map(|row| {
        let mut style = Style::default().fg(row.color);
        if row.marked {
            style = style.fg(styles.mark).add_modifier(Modifier::BOLD);
        }
        if row.deleting {
            style = style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
        }
        Row::new(row.cells.iter().map(|cell| {
            let line = Line::from(cell.text.clone());
            if cell.right_align {
                Cell::from(line.alignment(Alignment::Right))
            } else {
                Cell::from(line)
            }
        }))
        .style(style)
    });

    let constraints = if rendered.widths.is_empty() {
        vec![Constraint::Percentage(100)]
    } else {
        rendered
            .widths
            .iter()
            .map(|width| Constraint::Length(*width))
            .collect::<Vec<_>>()
    };

    let block = Block::default()
        .title(Line::from(title_spans(&table.title(), styles)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(styles.highlight))
        .style(Style::default().bg(styles.bg).fg(styles.fg));

    let widget = Table::new(rows, constraints)
        .header(header_row)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .fg(styles.cursor_fg)
                .bg(styles.cursor_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(table.selected_index().checked_sub(1));
    frame.render_stateful_widget(widget, area, &mut state);
}

fn header_line(text: &str, sorted: bool, styles: &Styles) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let indicator = ["↑", "↓"]
        .into_iter()
        .find(|glyph| sorted && text.ends_with(glyph));
    match indicator {
        Some(glyph) => Line::from(vec![
            Span::styled(text[..text.len() - glyph.len()].to_string(), bold),
            Span::styled(glyph, bold.fg(styles.sorter)),
        ]),
        None => Line::from(Span::styled(text.to_string(), bold)),
    }
}

/// Splits a table title such as `Pods(default)[3] </web>` into the name,
/// the row counter and the filter suffix so each gets its own colour.
fn title_spans(title: &str, styles: &Styles) -> Vec<Span<'static>> {
    let name_style = Style::default().fg(styles.title).add_modifier(Modifier::BOLD);
    let Some(open) = title.find('[') else {
        return vec![Span::styled(format!(" {title} "), name_style)];
    };
    let close = title[open..]
        .find(']')
        .map(|offset| open + offset + 1)
        .unwrap_or(title.len());

    let mut spans = vec![
        Span::styled(format!(" {}", &title[..open]), name_style),
        Span::styled(
            title[open..close].to_string(),
            Style::default().fg(styles.counter).add_modifier(Modifier::BOLD),
        ),
    ];
    let rest = &title[close..];
    if !rest.is_empty() {
        spans.push(Span::styled(rest.to_string(), Style::default().fg(styles.filter)));
    }
    spans.push(Span::raw(" "));
    spans
}

fn render_detail(frame: &mut Frame, area: Rect, view: &DetailView) {
    let block = Block::default()
        .title(format!(" {} ", view.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));
    let paragraph = Paragraph::new(highlight_yaml_text(view.text()))
        .block(block)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .scroll((view.scroll(), 0));

    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();

    if let Some(prompt) = app.pending_confirmation_prompt() {
        push_powerline_segment(&mut spans, " confirm ", Color::Black, WARN, PL_B);
        push_powerline_segment(
            &mut spans,
            format!(" {}? [y/n] ", compact_text(prompt, area.width as usize)),
            Color::White,
            PL_B,
            BG,
        );
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let prompt = app.prompt();
    if prompt.active
        && let Some(kind) = prompt.kind
    {
        let (label, bg) = match kind.prompt() {
            '/' => (" flt ", WARN),
            _ => (" cmd ", ACCENT),
        };
        push_powerline_segment(&mut spans, label, Color::Black, bg, PL_B);
        push_powerline_segment(
            &mut spans,
            format!(" {}{}█ ", kind.prompt(), prompt.text),
            Color::White,
            PL_B,
            BG,
        );
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let (mode, mode_bg) = if app.read_only() {
        (" ro ", WARN)
    } else {
        (" rw ", PL_A)
    };
    let (status_text, status_fg, status_bg) = match app.status() {
        Some(flash) => {
            let (fg, bg) = match flash.level {
                FlashLevel::Info => (Color::White, PL_B),
                FlashLevel::Warn => (Color::Black, WARN),
                FlashLevel::Error => (Color::Black, ERROR),
            };
            (flash.message.clone(), fg, bg)
        }
        None => ("? help  : command  / filter".to_string(), MUTED, PANEL),
    };
    push_powerline_segment(&mut spans, mode, Color::Black, mode_bg, status_bg);
    let width = (area.width as usize).saturating_sub(spans_width(&spans) + 3);
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(&status_text, width.max(8))),
        status_fg,
        status_bg,
        BG,
    );
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn highlight_yaml_text(input: &str) -> Text<'static> {
    let lines = input
        .lines()
        .map(highlight_yaml_line)
        .collect::<Vec<Line<'static>>>();
    Text::from(lines)
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let indent_len = line
        .as_bytes()
        .iter()
        .take_while(|byte| **byte == b' ' || **byte == b'\t')
        .count();
    let indent = &line[..indent_len];
    let trimmed = &line[indent_len..];

    let mut spans = vec![Span::raw(indent.to_string())];
    if trimmed.is_empty() {
        return Line::from(spans);
    }

    if let Some(comment) = trimmed.strip_prefix('#') {
        spans.push(Span::styled(
            format!("#{comment}"),
            Style::default().fg(MUTED),
        ));
        return Line::from(spans);
    }

    if let Some(rest) = trimmed.strip_prefix("- ") {
        spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
        spans.extend(highlight_yaml_content(rest));
        return Line::from(spans);
    }

    spans.extend(highlight_yaml_content(trimmed));
    Line::from(spans)
}

fn highlight_yaml_content(content: &str) -> Vec<Span<'static>> {
    let Some((key, value)) = split_yaml_key_value(content) else {
        return vec![Span::styled(
            content.to_string(),
            Style::default().fg(Color::White),
        )];
    };

    let mut spans = vec![
        Span::styled(
            key.to_string(),
            Style::default().fg(Color::Rgb(103, 232, 249)),
        ),
        Span::styled(":", Style::default().fg(MUTED)),
    ];
    if value.trim().is_empty() {
        return spans;
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        value.trim_start().to_string(),
        Style::default().fg(yaml_value_color(value.trim())),
    ));
    spans
}

fn split_yaml_key_value(content: &str) -> Option<(&str, &str)> {
    let (key, value) = content.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty() || key.contains(' ') {
        return None;
    }
    Some((key, value))
}

fn yaml_value_color(value: &str) -> Color {
    if value.starts_with('"') || value.starts_with('\'') {
        Color::Rgb(125, 211, 252)
    } else if matches!(value, "true" | "false" | "null" | "~") {
        WARN
    } else if value.parse::<f64>().is_ok() {
        Color::Rgb(251, 146, 60)
    } else if value.starts_with('{') || value.starts_with('[') {
        MUTED
    } else {
        Color::Rgb(147, 197, 253)
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.width()).sum()
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "kubedeck help  context:{}  scope:{}",
            app.context(),
            app.selection()
        )),
        Line::from(""),
        Line::from(Span::styled(
            "View",
            Style::default().fg(WARN).add_modifier(Modifier::BOLD),
        )),
    ];
    lines.extend(help_lines(&app.hints()));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "General",
        Style::default().fg(WARN).add_modifier(Modifier::BOLD),
    )));
    lines.extend(help_lines(&app.global_hints()));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        ":<alias> [namespace|all]  open a resource view   :q  quit",
        Style::default().fg(MUTED),
    )));

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(modal, area);
}

fn help_lines(hints: &[Hint]) -> Vec<Line<'static>> {
    hints
        .iter()
        .map(|hint| {
            Line::from(vec![
                Span::styled(
                    format!("  {:<14}", hint.mnemonic),
                    Style::default().fg(ACCENT),
                ),
                Span::raw(hint.description.clone()),
            ])
        })
        .collect()
}

/// Rows left for table data once borders and the header row are drawn.
fn table_rows_visible(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_cluster_endpoint(cluster: &str) -> String {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
