use once_cell::sync::{Lazy, OnceCell};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;

use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

pub const DEFAULT_CODE_THEME: &str = "base16-ocean.dark";

static PS: OnceCell<SyntaxSet> = OnceCell::new();
static THEMES: OnceCell<ThemeSet> = OnceCell::new();

// First word of the fence info string names the language.
static LANG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)").unwrap());

fn syntax_set() -> &'static SyntaxSet {
    PS.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn themes() -> &'static ThemeSet {
    THEMES.get_or_init(ThemeSet::load_defaults)
}

fn theme(name: &str) -> Option<&'static Theme> {
    let ts = themes();
    ts.themes
        .get(name)
        .or_else(|| ts.themes.get(DEFAULT_CODE_THEME))
        .or_else(|| ts.themes.values().next())
}

pub fn theme_exists(name: &str) -> bool {
    themes().themes.contains_key(name)
}

pub fn available_themes() -> Vec<&'static str> {
    themes().themes.keys().map(String::as_str).collect()
}

/// Language tag of a fenced code block, if it has one
pub fn language_from_info(info: &str) -> Option<&str> {
    LANG_RE
        .captures(info)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn syntax_for_lang<'a>(ps: &'a SyntaxSet, lang: &str) -> Option<&'a SyntaxReference> {
    let lower = lang.to_ascii_lowercase();
    let lang = match lower.as_str() {
        "py" | "python3" => "python",
        "js" | "jsx" => "javascript",
        "sh" | "shell" | "zsh" => "bash",
        other => other,
    };
    ps.find_syntax_by_token(lang)
        .or_else(|| ps.find_syntax_by_extension(lang))
        .or_else(|| ps.find_syntax_by_name(lang))
}

fn span_from_syn((style, text): (SynStyle, &str)) -> Span<'static> {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    let content = text.strip_suffix('\n').unwrap_or(text);
    Span::styled(content.replace('\t', "    "), out)
}

/// Highlight a fenced code block into ratatui lines.
///
/// Returns `None` when the language is unknown to syntect so the caller can
/// fall back to its plain code style.
pub fn highlight_code_block(code: &str, lang: &str, theme_name: &str) -> Option<Vec<Line<'static>>> {
    let ps = syntax_set();
    let syntax = syntax_for_lang(ps, lang)?;
    let mut highlighter = HighlightLines::new(syntax, theme(theme_name)?);

    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        match highlighter.highlight_line(line, ps) {
            Ok(ranges) => {
                let spans: Vec<Span<'static>> = ranges.into_iter().map(span_from_syn).collect();
                lines.push(Line::from(spans));
            }
            Err(e) => {
                tracing::debug!(error = %e, lang, "syntax highlighting failed");
                return None;
            }
        }
    }
    // An empty block still takes up one line, same as the plain style.
    if lines.is_empty() {
        lines.push(Line::default());
    }
    Some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_language_from_info() {
        assert_eq!(language_from_info("python"), Some("python"));
        assert_eq!(language_from_info("rust ignore"), Some("rust"));
        assert_eq!(language_from_info("  js"), Some("js"));
        assert_eq!(language_from_info(""), None);
        assert_eq!(language_from_info("{.python}"), None);
    }

    #[test]
    fn test_highlight_preserves_text() {
        let code = "def greet(name):\n    return f\"hi {name}\"\n";
        let lines = highlight_code_block(code, "python", DEFAULT_CODE_THEME).unwrap();

        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["def greet(name):", "    return f\"hi {name}\""]);
        assert!(lines[0].spans.iter().any(|s| s.style.fg.is_some()));
    }

    #[test]
    fn test_language_aliases() {
        assert!(highlight_code_block("x = 1\n", "py", DEFAULT_CODE_THEME).is_some());
        assert!(highlight_code_block("echo hi\n", "shell", DEFAULT_CODE_THEME).is_some());
    }

    #[test]
    fn test_empty_block_is_one_blank_line() {
        let lines = highlight_code_block("", "python", DEFAULT_CODE_THEME).unwrap();
        assert_eq!(lines.iter().map(line_text).collect::<Vec<_>>(), vec![""]);
    }

    #[test]
    fn test_unknown_language_falls_back() {
        assert!(highlight_code_block("???\n", "notalanguage", DEFAULT_CODE_THEME).is_none());
    }

    #[test]
    fn test_unknown_theme_uses_default() {
        assert!(!theme_exists("no such theme"));
        assert!(highlight_code_block("x = 1\n", "python", "no such theme").is_some());
        assert!(available_themes().contains(&DEFAULT_CODE_THEME));
    }
}
