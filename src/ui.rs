//! TUI rendering.
//!
//! One screen: a header with the address and summary, six snapshot cards, a
//! tab bar for the detail views, the selected view, and a footer carrying the
//! field tooltip and key help.

use crate::app::{App, ViewMode};
use crate::display::{self, Row, Tone};
use crate::location::LocationRecord;
use ratatui::{prelude::*, widgets::*};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Renders one frame of the TUI based on current application state.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Header
            Constraint::Length(3), // Snapshot cards
            Constraint::Length(1), // Tabs
            Constraint::Min(0),
            Constraint::Length(2), // Footer
        ])
        .split(f.size());

    render_header(f, app, chunks[0]);
    render_snapshots(f, app, chunks[1]);
    render_tabs(f, app, chunks[2]);
    match app.view_mode {
        ViewMode::Raw => render_raw_view(f, app, chunks[3]),
        _ => render_rows_view(f, app, chunks[3]),
    }
    render_footer(f, app, chunks[4]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            display::hero_kicker(&app.client),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            app.displayed_ip(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(app.summary()),
    ];
    let header = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(" What's My IP ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(header, area);
}

fn render_snapshots(f: &mut Frame, app: &App, area: Rect) {
    let empty = LocationRecord::default();
    let cards = display::snapshot_cards(app.record().unwrap_or(&empty), &app.client);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, cards.len() as u32); cards.len()])
        .split(area);

    for (card, column) in cards.iter().zip(columns.iter()) {
        let p = Paragraph::new(Span::styled(card.value.as_str(), tone_style(card)))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title(format!(" {} ", card.key))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(p, *column);
    }
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = ViewMode::ALL
        .iter()
        .enumerate()
        .map(|(i, v)| Line::from(format!("{} {}", i + 1, v.title())))
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.view_mode.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider("│");
    f.render_widget(tabs, area);
}

fn render_rows_view(f: &mut Frame, app: &App, area: Rect) {
    let rows = app.rows();
    let key_width = rows.iter().map(|r| r.key.len()).max().unwrap_or(0);

    let items: Vec<ListItem> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let line = Line::from(vec![
                Span::styled(
                    format!(" {:<width$}  ", row.key, width = key_width),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(row.value.clone(), tone_style(row)),
            ]);
            let item = ListItem::new(line);
            if i == app.selected_row {
                item.style(
                    Style::default()
                        .fg(Color::Cyan)
                        .bg(Color::Rgb(30, 30, 60))
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                item
            }
        })
        .collect();

    let mut title = format!(" {} │ {} FIELDS ", app.view_mode.title(), rows.len());
    if app.view_mode == ViewMode::Speed && app.speed_running {
        title.push_str(&format!("{} ", SPINNER[app.tick_count % SPINNER.len()]));
    }

    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    let mut state = ListState::default().with_selected(Some(app.selected_row));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_raw_view(f: &mut Frame, app: &App, area: Rect) {
    let json = app.raw_json();
    let p = Paragraph::new(json)
        .scroll((app.selected_row.min(u16::MAX as usize) as u16, 0))
        .block(
            Block::default()
                .title(" RAW JSON ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
    f.render_widget(p, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let tooltip = app.selected_tooltip().unwrap_or_default();

    let mut help = vec![Span::styled(
        " 1-6/Tab views   j/k select   t speed test   e export   q quit",
        Style::default().fg(Color::DarkGray),
    )];
    if let Some(ref msg) = app.status_message {
        help.push(Span::raw("  │  "));
        help.push(Span::styled(msg.as_str(), Style::default().fg(Color::Green)));
    }

    let footer = Paragraph::new(vec![
        Line::from(Span::styled(
            format!(" {tooltip}"),
            Style::default().fg(Color::Yellow),
        )),
        Line::from(help),
    ]);
    f.render_widget(footer, area);
}

fn tone_style(row: &Row) -> Style {
    match row.tone() {
        Tone::Normal => Style::default(),
        Tone::Empty => Style::default().fg(Color::DarkGray),
        Tone::Accent => Style::default().fg(Color::Green),
        Tone::Warn => Style::default().fg(Color::Red),
    }
}
