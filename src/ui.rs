use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::App;
use crate::markdown::render_markdown;
use crate::state::{Message, Origin};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Text::from(vec![
        Line::from(vec![
            Span::styled(
                format!(" I am Your Python Tutor {} ", app.tutor_name),
                Style::default().fg(Color::White).bold(),
            ),
            Span::styled(
                format!("v{}", env!("CARGO_PKG_VERSION")),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(Span::styled(" By skoolofcode", Style::default().fg(Color::Gray))),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Blue));
    frame.render_widget(header, area);
}

fn label(origin: Origin) -> Line<'static> {
    match origin {
        Origin::User => Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Origin::Assistant => Line::from(Span::styled(
            "Tutor:",
            Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
        )),
    }
}

/// Render one committed message. User text is markdown too, but code in it
/// is not highlighted.
fn message_lines(message: &Message, code_theme: &str) -> Vec<Line<'static>> {
    let theme = match message.origin() {
        Origin::User => None,
        Origin::Assistant => Some(code_theme),
    };
    let mut lines = vec![label(message.origin())];
    lines.extend(render_markdown(message.text(), theme).lines);
    lines.push(Line::default());
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.orchestrator.endpoint()));
    let inner_width = area.width.saturating_sub(2);
    app.chat_height = area.height.saturating_sub(2);

    // Messages never change once committed, so only new ones get rendered.
    let committed = app.conversation.messages();
    while app.rendered.len() < committed.len() {
        let next = &committed[app.rendered.len()];
        app.rendered.push(message_lines(next, &app.code_theme));
    }

    let mut lines: Vec<Line> = app.rendered.iter().flatten().cloned().collect();

    if app.reveal.is_revealing() {
        lines.push(label(Origin::Assistant));
        let mut typing = render_markdown(app.reveal.buffer(), None).lines;
        match typing.last_mut() {
            Some(last) => last.spans.push(Span::styled("▌", Style::default().fg(Color::Gray))),
            None => typing.push(Line::from("▌")),
        }
        lines.extend(typing);
    } else if app.is_waiting() {
        lines.push(label(Origin::Assistant));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    if lines.is_empty() {
        let placeholder = Paragraph::new(Span::styled(
            "Ask your Python tutor anything...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(chat_block);
        frame.render_widget(placeholder, area);
        app.max_scroll = 0;
        app.chat_scroll = 0;
        return;
    }

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    app.max_scroll = chat
        .line_count(inner_width)
        .saturating_sub(app.chat_height as usize)
        .min(u16::MAX as usize) as u16;
    if app.follow_latest {
        app.chat_scroll = app.max_scroll;
    } else {
        app.chat_scroll = app.chat_scroll.min(app.max_scroll);
    }

    let chat = chat.block(chat_block).scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);

    if app.max_scroll > 0 {
        let mut scrollbar_state = ScrollbarState::new(app.max_scroll as usize)
            .position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Type a message... ")
        .title_bottom(Line::from(" Enter: Send ").right_aligned());

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .conversation
        .pending_input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let content = match &app.notice {
        Some(notice) => Line::from(Span::styled(
            format!(" {} ", notice),
            Style::default().bg(Color::Red).fg(Color::White),
        )),
        None => Line::from(vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" ↑/↓ PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ]),
    };

    let footer = Paragraph::new(content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
