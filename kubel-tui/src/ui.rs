use std::path::PathBuf;

use kubel_core::model::{DuplicateReport, ImportSummary, SourceKind, WasteTag};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, FormField, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new("kubel – address registry import")
        .block(Block::default().borders(Borders::ALL).title("Kubel"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::Summary => draw_summary(frame, app, *content_area),
        Screen::InvalidRows => draw_invalid_rows(frame, app, *content_area),
        Screen::EditRow => draw_edit_row(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::Summary => "r run import · ↑/↓ duplicates · Tab/→ invalid rows · q/Ctrl-C quit",
        Screen::InvalidRows => "↑/↓ move · Enter edit and add · Esc/← back · q/Ctrl-C quit",
        Screen::EditRow => "Type to edit · Tab/↓ next field · Enter add address · Esc cancel",
    };

    let status_text = if app.is_loading {
        format!("Working… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else if let Some(msg) = &app.info_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else if app.info_message.is_some() {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_summary(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10), // counts
            Constraint::Min(0),    // duplicates
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [counts_area, duplicates_area] = chunks else {
        return;
    };

    let mut lines = vec![
        Line::from(format!("Commercial file:  {}", path_label(app.commercial_path.as_ref()))),
        Line::from(format!("Residential file: {}", path_label(app.residential_path.as_ref()))),
        Line::from(format!("Address store:    {}", app.store_label)),
    ];
    lines.extend(summary_lines(app.summary.as_ref()));

    let counts = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Last import"))
        .wrap(Wrap { trim: true });
    frame.render_widget(counts, *counts_area);

    let reports = app
        .summary
        .as_ref()
        .map_or(&[][..], |summary| summary.duplicates.as_slice());
    let items = if reports.is_empty() {
        vec![ListItem::new("No shared locations.")]
    } else {
        reports.iter().map(duplicate_item).collect()
    };

    let title = match app.summary.as_ref() {
        Some(summary) if summary.duplicates_total > summary.duplicates.len() => format!(
            "Possible duplicates (first {} of {})",
            summary.duplicates.len(),
            summary.duplicates_total
        ),
        _ => "Possible duplicates".to_owned(),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !reports.is_empty() {
        state.select(Some(app.duplicate_list_index));
    }
    frame.render_stateful_widget(list, *duplicates_area, &mut state);
}

fn summary_lines(summary: Option<&ImportSummary>) -> Vec<Line<'static>> {
    let Some(summary) = summary else {
        return vec![Line::from(""), Line::from("No import run yet. Press r to start.")];
    };
    vec![
        Line::from(""),
        Line::from(format!("Rows seen:        {}", summary.total_rows_seen)),
        Line::from(format!("Unique entries:   {}", summary.unique_entries)),
        Line::from(format!("Created:          {}", summary.created)),
        Line::from(format!("Already present:  {}", summary.skipped_existing)),
        Line::from(format!("Invalid rows:     {}", summary.invalid_rows.len())),
    ]
}

fn duplicate_item(report: &DuplicateReport) -> ListItem<'_> {
    let contexts = report
        .details
        .iter()
        .map(|detail| match detail.source_kind {
            SourceKind::Commercial => format!("{} ×{}", detail.owners.join(" / "), detail.occurrences),
            SourceKind::Residential => format!("residential ×{}", detail.occurrences),
        })
        .collect::<Vec<_>>()
        .join("; ");
    ListItem::new(format!(
        "{} ({} rows): {contexts}",
        report.display_label, report.total_occurrences
    ))
}

fn draw_invalid_rows(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let title = format!(
        "Invalid rows awaiting correction ({})",
        app.queued_rows.len()
    );

    if app.queued_rows.is_empty() {
        let paragraph = Paragraph::new("Nothing to correct.")
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let rows = app.queued_rows.iter().enumerate().map(|(idx, queued)| {
        let style = if idx == app.row_list_index {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(queued.id.to_string()),
            Cell::from(queued.row.source_kind.to_string()),
            Cell::from(queued.row.line.to_string()),
            Cell::from(queued.row.reason.to_string()),
            Cell::from(queued.row.raw_text.clone()),
        ])
        .style(style)
    });

    let column_widths = [
        Constraint::Length(6),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Length(16),
        Constraint::Min(20),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Id", "Source", "Line", "Reason", "Row"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_edit_row(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(row) = app.editing_row() else {
        let paragraph = Paragraph::new("Row is no longer queued.")
            .block(Block::default().borders(Borders::ALL).title("Edit and add"));
        frame.render_widget(paragraph, area);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // salvaged context
            Constraint::Min(0),    // form
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [context_area, form_area] = chunks else {
        return;
    };

    let containers = row
        .declared_containers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let context = Paragraph::new(vec![
        Line::from(format!("Line {} ({}): {}", row.line, row.reason, row.raw_text)),
        Line::from(format!("Owner: {}", row.owner_label.as_deref().unwrap_or("-"))),
        Line::from(format!(
            "Containers: {} · Waste: {}",
            if containers.is_empty() { "-" } else { containers.as_str() },
            waste_label(row.waste_types.iter().copied())
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Salvaged data"))
    .wrap(Wrap { trim: true });
    frame.render_widget(context, *context_area);

    let lines = FormField::ALL
        .iter()
        .map(|field| {
            let focused = *field == app.form.focused();
            let marker = if focused { "> " } else { "  " };
            let style = if focused {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::styled(
                format!("{marker}{:<12} {}", field.label(), app.form.value(*field)),
                style,
            )
        })
        .collect::<Vec<_>>();

    let form = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Edit and add"))
        .wrap(Wrap { trim: false });
    frame.render_widget(form, *form_area);
}

fn path_label(path: Option<&PathBuf>) -> String {
    path.map_or_else(|| "<not configured>".to_owned(), |path| path.display().to_string())
}

fn waste_label(tags: impl Iterator<Item = WasteTag>) -> String {
    let labels = tags.map(|tag| tag.to_string()).collect::<Vec<_>>();
    if labels.is_empty() {
        "-".to_owned()
    } else {
        labels.join(", ")
    }
}
