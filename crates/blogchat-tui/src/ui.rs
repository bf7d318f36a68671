use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use blogchat_core::session::CLEAR_CONFIRM_PROMPT;
use blogchat_core::{format_message, ChatRole, Entry, Segment, ToastLevel};
use crate::app::App;

/// Convert formatted segments into styled lines. Code blocks get lines of their own.
fn segments_to_lines(segments: &[Segment]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for segment in segments {
        match segment {
            Segment::Text(t) => current.push(Span::raw(t.clone())),
            Segment::Strong(t) => current.push(Span::styled(
                t.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Segment::Emphasis(t) => current.push(Span::styled(
                t.clone(),
                Style::default().add_modifier(Modifier::ITALIC),
            )),
            Segment::Code(t) => current.push(Span::styled(
                t.clone(),
                Style::default().fg(Color::Green),
            )),
            Segment::CodeBlock(t) => {
                if !current.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current)));
                }
                for code_line in t.lines() {
                    lines.push(Line::from(Span::styled(
                        format!("  {}", code_line),
                        Style::default().fg(Color::Green),
                    )));
                }
            }
            Segment::LineBreak => lines.push(Line::from(std::mem::take(&mut current))),
        }
    }

    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

/// Project one transcript entry onto display lines.
fn entry_lines(entry: &Entry, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    if entry.loading {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("正在思考{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::default());
        return lines;
    }

    let body = segments_to_lines(&format_message(&entry.message.content));
    match entry.message.role {
        ChatRole::System => {
            lines.extend(body.into_iter().map(|l| l.style(Style::default().fg(Color::DarkGray))));
        }
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "你:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.extend(body);
        }
        ChatRole::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.extend(body);
        }
    }
    lines.push(Line::default());
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let input_lines = app.input.split('\n').count().clamp(1, 5) as u16;

    // Main layout: header, messages, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_lines + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_messages(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.session.is_confirming_clear() {
        render_clear_confirmation(frame, area);
    }
    render_toast(app, frame, area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let feed_status = if app.feed_loading() {
        " [加载文章中...]".to_string()
    } else {
        format!(" [{} 篇文章]", app.session.posts().len())
    };

    let title = Line::from(vec![
        Span::styled(" JasmineRain's blog · AI 助手 ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(feed_status, Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let settings = app.session.config().settings();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", settings.model));

    let lines: Vec<Line> = app
        .session
        .transcript()
        .entries()
        .iter()
        .flat_map(|entry| entry_lines(entry, app.animation_frame))
        .collect();

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });

    // Keep the newest message in view unless the user scrolled away.
    // Rows are counted with the same word wrapping the paragraph renders with.
    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);
    let total_rows = u16::try_from(chat.line_count(inner_width)).unwrap_or(u16::MAX);
    app.chat_height = inner_height;
    app.max_scroll = total_rows.saturating_sub(inner_height);
    if app.follow_bottom {
        app.scroll = app.max_scroll;
    } else {
        app.scroll = app.scroll.min(app.max_scroll);
    }

    let chat = chat.block(block).scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let sending = app.session.is_sending();
    let border_color = if sending { Color::DarkGray } else { Color::Yellow };
    let title = if sending { " 等待回复中... " } else { " 输入问题 (Enter 发送, Shift+Enter 换行) " };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Only the line holding the cursor is scrolled horizontally
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let before_cursor: String = app.input.chars().take(app.cursor).collect();
    let cursor_row = before_cursor.matches('\n').count();
    let cursor_col_text = before_cursor.rsplit('\n').next().unwrap_or("");
    let cursor_col = Line::from(cursor_col_text).width();

    let row_offset = (cursor_row + 1).saturating_sub(inner_height.max(1));
    let col_offset = if inner_width == 0 {
        0
    } else {
        (cursor_col + 1).saturating_sub(inner_width)
    };

    let visible: Vec<Line> = app
        .input
        .split('\n')
        .skip(row_offset)
        .take(inner_height.max(1))
        .enumerate()
        .map(|(i, line)| {
            if i + row_offset == cursor_row {
                Line::from(skip_columns(line, col_offset))
            } else {
                Line::from(line.to_string())
            }
        })
        .collect();

    let style = if sending {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let input = Paragraph::new(Text::from(visible)).style(style).block(block);
    frame.render_widget(input, area);

    if !sending && !app.session.is_confirming_clear() {
        let x = (cursor_col - col_offset) as u16;
        let y = (cursor_row - row_offset) as u16;
        frame.set_cursor_position((area.x + x + 1, area.y + y + 1));
    }
}

/// Drop leading characters until `columns` display columns are skipped.
fn skip_columns(line: &str, columns: usize) -> String {
    let mut skipped = 0;
    let mut out = String::new();
    for c in line.chars() {
        if skipped < columns {
            skipped += Line::from(c.to_string()).width();
            continue;
        }
        out.push(c);
    }
    out
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.session.is_sending() {
        (" SENDING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" READY ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" /find ", key_style),
        Span::styled(" search posts ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl+L ", key_style),
        Span::styled(" clear ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_clear_confirmation(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(40, 5, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" 清空对话 ");

    let text = Text::from(vec![
        Line::from(CLEAR_CONFIRM_PROMPT),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" 确定   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" 取消"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), popup);
}

fn render_toast(app: &App, frame: &mut Frame, area: Rect) {
    let Some(toast) = app.session.toast() else {
        return;
    };

    let bg = match toast.level {
        ToastLevel::Success => Color::Green,
        ToastLevel::Error => Color::Red,
        ToastLevel::Info => Color::Blue,
    };

    let width = (Line::from(toast.text.as_str()).width() as u16 + 4).min(area.width);
    let rect = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + 1,
        width,
        height: 3.min(area.height),
    };

    frame.render_widget(Clear, rect);
    let paragraph = Paragraph::new(toast.text.as_str())
        .style(Style::default().bg(bg).fg(Color::White))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().bg(bg).fg(Color::White)));
    frame.render_widget(paragraph, rect);
}
