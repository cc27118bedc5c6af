//! Console rendering of step outputs

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::UnicodeWidthStr;

pub const FALLBACK_WIDTH: usize = 100;
pub const MIN_WIDTH: usize = 40;
pub const INDENT: &str = "  ";

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph pattern"));

/// Current terminal width, at least [`MIN_WIDTH`]
pub fn terminal_width() -> usize {
    let columns = crossterm::terminal::size()
        .map(|(columns, _)| columns as usize)
        .ok()
        .filter(|&columns| columns > 0)
        .unwrap_or(FALLBACK_WIDTH);
    columns.max(MIN_WIDTH)
}

/// Fill each paragraph to `width` columns with `indent` on every line
///
/// Paragraphs are separated by blank lines and joined back with one blank line.
/// Whitespace inside a paragraph collapses to single spaces. Words wider than the
/// line stay whole on a line of their own. Empty input gives an empty string.
pub fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let raw = text.trim();
    if raw.is_empty() {
        return String::new();
    }

    PARAGRAPH_BREAK
        .split(raw)
        .filter(|p| !p.trim().is_empty())
        .map(|p| fill_paragraph(p, width, indent))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn fill_paragraph(paragraph: &str, width: usize, indent: &str) -> String {
    let mut lines = Vec::new();
    let mut line = String::from(indent);
    let mut line_has_words = false;

    for word in paragraph.split_whitespace() {
        if line_has_words && line.width() + 1 + word.width() > width {
            lines.push(std::mem::replace(&mut line, String::from(indent)));
            line_has_words = false;
        }
        if line_has_words {
            line.push(' ');
        }
        line.push_str(word);
        line_has_words = true;
    }
    if line_has_words {
        lines.push(line);
    }

    lines.join("\n")
}
