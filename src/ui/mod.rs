use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use unicode_width::UnicodeWidthChar;

use crate::app::{App, AppState, InputMode, Screen};
use crate::chat::ChatEntry;

pub fn draw(f: &mut Frame<'_>, app: &App) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Main content
            Constraint::Length(3), // Input area
        ])
        .split(size);

    draw_title_bar(f, app, chunks[0]);

    match app.screen {
        Screen::UsernameEntry => draw_username_form(f, app, chunks[1]),
        Screen::Chat => {
            let main_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(70), // Chat area
                    Constraint::Percentage(30), // Status panel
                ])
                .split(chunks[1]);

            draw_chat_area(f, app, main_chunks[0]);
            draw_status_panel(f, app, main_chunks[1]);
        }
    }

    draw_input_area(f, app, chunks[2]);
}

fn state_style(state: &AppState) -> Style {
    match state {
        AppState::Connected(_) => Style::default().fg(Color::Green),
        AppState::Connecting(_) => Style::default().fg(Color::Yellow),
        AppState::Idle => Style::default().fg(Color::Gray),
        AppState::Disconnected | AppState::Error(_) => Style::default().fg(Color::Red),
    }
}

fn state_label(state: &AppState) -> &str {
    match state {
        AppState::Idle => "not connected",
        AppState::Connecting(_) => "connecting...",
        AppState::Connected(_) => "connected",
        AppState::Disconnected => "disconnected",
        AppState::Error(_) => "connection failed",
    }
}

fn draw_title_bar(f: &mut Frame, app: &App, area: Rect) {
    let title = format!(
        " LLMChatroom | {} | {} ",
        app.username.as_deref().unwrap_or("no username"),
        state_label(&app.state),
    );

    let title_block = Block::default()
        .borders(Borders::ALL)
        .style(state_style(&app.state))
        .title(" LLMChatroom ");

    let title_paragraph = Paragraph::new(title)
        .block(title_block)
        .alignment(Alignment::Center);

    f.render_widget(title_paragraph, area);
}

fn draw_username_form(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Join Chat ")
        .style(Style::default().fg(Color::Cyan));

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Enter your username:",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Type it below and press Enter to join. Esc quits.",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )),
    ];

    if let Some(hint) = &app.username_hint {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            hint.as_str(),
            Style::default().fg(Color::Red),
        )));
    }

    let form = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(form, area);
}

fn draw_chat_area(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Chat ")
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let height = inner.height as usize;
    let width = inner.width as usize;

    // Each entry takes at least one row, so `height` entries always fill the pane.
    let mut rows: Vec<Line> = app
        .get_visible_messages(height)
        .iter()
        .flat_map(|entry| entry_rows(entry, width))
        .collect();

    // Keep the newest rows in view.
    let overflow = rows.len().saturating_sub(height);
    rows.drain(..overflow);

    if rows.is_empty() {
        rows.push(Line::from(Span::styled(
            "No messages yet. Type a message and press Enter to send.",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));
    }

    f.render_widget(Paragraph::new(rows), inner);
}

/// Rows for one entry, hard-wrapped to `width` columns.
///
/// The `[time] sender:` prefix goes on the first line of the content only.
fn entry_rows(entry: &ChatEntry, width: usize) -> Vec<Line<'static>> {
    let (sender_color, content_style) = if entry.is_own() {
        (Color::Green, Style::default().fg(Color::White))
    } else if entry.is_pending() {
        (
            Color::Cyan,
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )
    } else if entry.is_ai() {
        (Color::Cyan, Style::default().fg(Color::White))
    } else {
        (Color::Magenta, Style::default().fg(Color::White))
    };

    let mut lines = entry.content.lines();
    let first = lines.next().unwrap_or("");

    let mut rows = wrap_segments(
        vec![
            (
                format!("[{}] ", entry.received_at.format("%H:%M:%S")),
                Style::default().fg(Color::Gray),
            ),
            (format!("{}: ", entry.sender), Style::default().fg(sender_color)),
            (first.to_string(), content_style),
        ],
        width,
    );
    for line in lines {
        rows.extend(wrap_segments(vec![(line.to_string(), content_style)], width));
    }
    rows
}

fn wrap_segments(segments: Vec<(String, Style)>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut col = 0;

    for (text, style) in segments {
        let mut chunk = String::new();
        for c in text.chars() {
            let w = c.width().unwrap_or(0);
            if col + w > width && col > 0 {
                if !chunk.is_empty() {
                    row.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                rows.push(Line::from(std::mem::take(&mut row)));
                col = 0;
            }
            chunk.push(c);
            col += w;
        }
        if !chunk.is_empty() {
            row.push(Span::styled(chunk, style));
        }
    }

    rows.push(Line::from(row));
    rows
}

fn draw_status_panel(f: &mut Frame<'_>, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Connection info
            Constraint::Min(0),    // Status log
        ])
        .split(area);

    let connection_block = Block::default()
        .borders(Borders::ALL)
        .title(" Connection ")
        .style(Style::default().fg(Color::Blue));

    let server = match &app.state {
        AppState::Connecting(url) | AppState::Connected(url) => url.as_str(),
        _ => "-",
    };

    let connection_text = vec![
        Line::from(vec![
            Span::raw("Status: "),
            Span::styled(state_label(&app.state), state_style(&app.state)),
        ]),
        Line::from(vec![
            Span::raw("Server: "),
            Span::styled(server, Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("Awaiting AI: "),
            Span::styled(
                app.chat_log.pending_replies().to_string(),
                Style::default().fg(Color::Yellow),
            ),
        ]),
    ];

    let connection_paragraph = Paragraph::new(connection_text).block(connection_block);
    f.render_widget(connection_paragraph, chunks[0]);

    let status_block = Block::default()
        .borders(Borders::ALL)
        .title(" Status ")
        .style(Style::default().fg(Color::Blue));

    let inner = status_block.inner(chunks[1]);
    let height = inner.height as usize;
    let mut status_rows: Vec<Line> = app
        .get_visible_status_messages(height)
        .iter()
        .flat_map(|s| {
            wrap_segments(vec![(s.clone(), Style::default().fg(Color::Gray))], inner.width as usize)
        })
        .collect();
    let overflow = status_rows.len().saturating_sub(height);
    status_rows.drain(..overflow);

    f.render_widget(status_block, chunks[1]);
    f.render_widget(Paragraph::new(status_rows), inner);
}

fn draw_input_area(f: &mut Frame, app: &App, area: Rect) {
    let editing = app.screen == Screen::UsernameEntry || app.input_mode == InputMode::Editing;

    let input_style = if editing {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::White)
    };

    let mode_indicator = match (&app.screen, &app.input_mode) {
        (Screen::UsernameEntry, _) => " Username ",
        (Screen::Chat, InputMode::Normal) => "[NORMAL] Press 'i' to enter input mode",
        (Screen::Chat, InputMode::Editing) => "[INPUT] ESC=normal, ENTER=send",
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .title(mode_indicator)
        .style(input_style);

    let visible = area.width.saturating_sub(2) as usize;
    let (input_text, cursor_col) = if editing {
        input_view(&app.input, app.cursor_position, visible)
    } else {
        ("", 0)
    };

    let input_paragraph = Paragraph::new(input_text).block(input_block);
    f.render_widget(input_paragraph, area);

    if editing {
        f.set_cursor(area.x + 1 + cursor_col as u16, area.y + 1);
    }
}

/// Tail of `input` that keeps the cursor inside `visible` columns, and the
/// cursor's display column within it.
fn input_view(input: &str, cursor: usize, visible: usize) -> (&str, usize) {
    let visible = visible.max(1);
    let cursor_col: usize = input
        .chars()
        .take(cursor)
        .map(|c| c.width().unwrap_or(0))
        .sum();

    let mut skipped = 0;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if cursor_col.saturating_sub(skipped) < visible {
            break;
        }
        skipped += c.width().unwrap_or(0);
        start = i + c.len_utf8();
    }

    (&input[start..], cursor_col.saturating_sub(skipped))
}
