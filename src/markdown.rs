//! Markdown to ratatui text.
//!
//! Both sides of the conversation go through here. Fenced code blocks with a
//! language tag are syntax highlighted when a code theme is supplied; the
//! in-progress reveal renders without one. Raw HTML is shown literally and
//! control characters are dropped so reply text can never drive the terminal.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::highlight;

const RULE_WIDTH: usize = 24;

fn code_style() -> Style {
    Style::default().fg(Color::LightYellow)
}

fn quote_style() -> Style {
    Style::default().fg(Color::Green)
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED)
}

pub fn render_markdown(input: &str, code_theme: Option<&str>) -> Text<'static> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(input, options);
    let mut w = Writer::new(parser, code_theme);
    w.run();
    Text::from(w.lines)
}

/// Drop control characters, keeping newlines; tabs become spaces
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => out.push_str("    "),
            '\n' => out.push('\n'),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

struct CodeBlock {
    lang: Option<String>,
    content: String,
}

struct Writer<'a, 't, I>
where
    I: Iterator<Item = Event<'a>>,
{
    iter: I,
    code_theme: Option<&'t str>,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    inline_styles: Vec<Style>,
    quote_depth: usize,
    list_indices: Vec<Option<u64>>,
    item_indents: Vec<String>,
    pending_marker: Option<String>,
    code_block: Option<CodeBlock>,
    link: Option<(String, String)>,
    needs_blank: bool,
}

impl<'a, 't, I> Writer<'a, 't, I>
where
    I: Iterator<Item = Event<'a>>,
{
    fn new(iter: I, code_theme: Option<&'t str>) -> Self {
        Self {
            iter,
            code_theme,
            lines: Vec::new(),
            current: Vec::new(),
            inline_styles: Vec::new(),
            quote_depth: 0,
            list_indices: Vec::new(),
            item_indents: Vec::new(),
            pending_marker: None,
            code_block: None,
            link: None,
            needs_blank: false,
        }
    }

    fn run(&mut self) {
        while let Some(ev) = self.iter.next() {
            self.handle_event(ev);
        }
        self.flush_line();
    }

    fn handle_event(&mut self, event: Event<'a>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(text),
            Event::Code(code) => {
                let style = self.style().patch(code_style());
                self.current.push(Span::styled(sanitize(&code), style));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(html),
            Event::SoftBreak => {
                let style = self.style();
                self.current.push(Span::styled(" ", style));
            }
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.block_gap();
                self.push_line(vec![Span::styled(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(Color::DarkGray),
                )]);
                self.needs_blank = true;
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.current.push(Span::raw(marker));
            }
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'a>) {
        match tag {
            Tag::Paragraph => self.block_gap(),
            Tag::Heading { level, .. } => {
                self.block_gap();
                let style = heading_style(level);
                self.inline_styles.push(style);
                let hashes = "#".repeat(heading_depth(level));
                self.current.push(Span::styled(format!("{hashes} "), style));
            }
            Tag::BlockQuote => {
                self.flush_line();
                self.block_gap();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                self.block_gap();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        highlight::language_from_info(&info).map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code_block = Some(CodeBlock {
                    lang,
                    content: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush_line();
                if self.list_indices.is_empty() {
                    self.block_gap();
                }
                self.list_indices.push(start);
            }
            Tag::Item => {
                self.flush_line();
                self.needs_blank = false;
                let depth = self.list_indices.len().max(1);
                let base = "  ".repeat(depth - 1);
                let bullet = match self.list_indices.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "- ".to_string(),
                };
                let marker = format!("{base}{bullet}");
                self.item_indents.push(" ".repeat(marker.chars().count()));
                self.pending_marker = Some(marker);
            }
            Tag::Emphasis => self.push_inline(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_inline(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_inline(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.push_inline(link_style());
                self.link = Some((dest_url.to_string(), String::new()));
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                self.needs_blank = true;
            }
            TagEnd::Heading(_) => {
                self.inline_styles.pop();
                self.flush_line();
                self.needs_blank = true;
            }
            TagEnd::BlockQuote => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.needs_blank = true;
            }
            TagEnd::CodeBlock => {
                if let Some(block) = self.code_block.take() {
                    self.emit_code_block(block);
                }
                self.needs_blank = true;
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.list_indices.pop();
                self.needs_blank = self.list_indices.is_empty();
            }
            TagEnd::Item => {
                self.flush_line();
                self.item_indents.pop();
                self.pending_marker = None;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.inline_styles.pop();
            }
            TagEnd::Link => {
                self.inline_styles.pop();
                if let Some((dest, shown)) = self.link.take() {
                    if !dest.is_empty() && dest != shown {
                        self.current.push(Span::styled(
                            format!(" ({dest})"),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: CowStr<'a>) {
        let text = sanitize(&text);

        if let Some(block) = self.code_block.as_mut() {
            block.content.push_str(&text);
            return;
        }
        if let Some((_, shown)) = self.link.as_mut() {
            shown.push_str(&text);
        }

        let style = self.style();
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush_line();
            }
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn emit_code_block(&mut self, block: CodeBlock) {
        let content = block.content.strip_suffix('\n').unwrap_or(&block.content);

        let highlighted = match (self.code_theme, block.lang.as_deref()) {
            (Some(theme), Some(lang)) => highlight::highlight_code_block(content, lang, theme),
            _ => None,
        };

        match highlighted {
            Some(lines) => {
                for line in lines {
                    self.push_line(line.spans);
                }
            }
            None => {
                for line in content.split('\n') {
                    self.push_line(vec![Span::styled(line.to_string(), code_style())]);
                }
            }
        }
    }

    fn push_inline(&mut self, style: Style) {
        let merged = self.style().patch(style);
        self.inline_styles.push(merged);
    }

    fn style(&self) -> Style {
        self.inline_styles.last().copied().unwrap_or_default()
    }

    fn block_gap(&mut self) {
        if self.needs_blank && !self.lines.is_empty() {
            self.push_line(Vec::new());
        }
        self.needs_blank = false;
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.current);
        self.push_line(spans);
    }

    fn push_line(&mut self, spans: Vec<Span<'static>>) {
        let mut full = Vec::with_capacity(spans.len() + 2);
        if self.quote_depth > 0 {
            full.push(Span::styled("> ".repeat(self.quote_depth), quote_style()));
        }
        if let Some(marker) = self.pending_marker.take() {
            full.push(Span::raw(marker));
        } else if let Some(indent) = self.item_indents.last() {
            full.push(Span::raw(indent.clone()));
        }
        let style = if self.quote_depth > 0 {
            quote_style()
        } else {
            Style::default()
        };
        full.extend(spans.into_iter().map(|s| {
            let patched = style.patch(s.style);
            Span::styled(s.content, patched)
        }));
        self.lines.push(Line::from(full));
    }
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn heading_style(level: HeadingLevel) -> Style {
    let style = Style::default().add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.fg(Color::Magenta).add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => style.fg(Color::Magenta),
        _ => style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::DEFAULT_CODE_THEME;
    use pretty_assertions::assert_eq;

    fn plain_lines(text: &Text) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_paragraphs_are_separated_by_blank_line() {
        let text = render_markdown("first para\nstill first\n\nsecond", None);
        assert_eq!(plain_lines(&text), vec!["first para still first", "", "second"]);
    }

    #[test]
    fn test_bold_and_inline_code_are_styled() {
        let text = render_markdown("use **print** with `x`", None);
        let spans = &text.lines[0].spans;

        let bold = spans.iter().find(|s| s.content == "print").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let code = spans.iter().find(|s| s.content == "x").unwrap();
        assert_eq!(code.style.fg, Some(Color::LightYellow));
    }

    #[test]
    fn test_lists_get_markers() {
        let text = render_markdown("- one\n- two\n  1. nested\n\n3. three\n4. four", None);
        assert_eq!(
            plain_lines(&text),
            vec!["- one", "- two", "  1. nested", "", "3. three", "4. four"]
        );
    }

    #[test]
    fn test_heading_and_quote() {
        let text = render_markdown("## Loops\n\n> for x in xs", None);
        assert_eq!(plain_lines(&text), vec!["## Loops", "", "> for x in xs"]);
    }

    #[test]
    fn test_fenced_code_with_language_is_highlighted() {
        let md = "Here:\n\n```python\nprint(1)\n```";
        let text = render_markdown(md, Some(DEFAULT_CODE_THEME));

        assert_eq!(plain_lines(&text), vec!["Here:", "", "print(1)"]);
        let code_line = &text.lines[2];
        assert!(code_line
            .spans
            .iter()
            .any(|s| matches!(s.style.fg, Some(Color::Rgb(..)))));
    }

    #[test]
    fn test_code_without_theme_or_language_is_plain() {
        for (md, theme) in [
            ("```python\nprint(1)\n```", None),
            ("```\nprint(1)\n```", Some(DEFAULT_CODE_THEME)),
        ] {
            let text = render_markdown(md, theme);
            assert_eq!(plain_lines(&text), vec!["print(1)"]);
            assert_eq!(text.lines[0].spans[0].style.fg, Some(Color::LightYellow));
        }
    }

    #[test]
    fn test_empty_fence_renders_same_with_or_without_highlighting() {
        let md = "```python\n```";
        let highlighted = render_markdown(md, Some(DEFAULT_CODE_THEME));
        let plain = render_markdown(md, None);

        assert_eq!(plain_lines(&highlighted), vec![""]);
        assert_eq!(plain_lines(&highlighted), plain_lines(&plain));
    }

    #[test]
    fn test_unclosed_fence_during_reveal_renders() {
        let text = render_markdown("Look:\n\n```pyth", None);
        assert_eq!(plain_lines(&text), vec!["Look:", "", ""]);
    }

    #[test]
    fn test_html_and_control_characters_are_inert() {
        let text = render_markdown("<b>hi</b> \u{1b}[31mred", None);
        assert_eq!(plain_lines(&text), vec!["<b>hi</b> [31mred"]);
    }

    #[test]
    fn test_link_shows_destination() {
        let text = render_markdown("[docs](https://docs.python.org)", None);
        assert_eq!(plain_lines(&text), vec!["docs (https://docs.python.org)"]);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a\tb\u{7}c\r\nd"), "a    bc\nd");
    }
}
