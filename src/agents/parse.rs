//! Free-form text to reviewer input
//!
//! Messages arriving over A2A carry a single text blob. The reviewer needs a topic
//! and a draft, so the text is split by the first rule below that accepts it:
//!
//! 1. `Topic: ... Draft: ...` labels (case-insensitive, topic label first, both
//!    fields non-empty)
//! 2. first line is the topic, the remaining lines are the draft
//! 3. the whole text is both topic and draft

/// Which rule produced a [`ReviewInput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewInputForm {
    Labeled,
    FirstLineTopic,
    WholeText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub topic: String,
    pub draft: String,
    pub form: ReviewInputForm,
}

type Rule = fn(&str) -> Option<ReviewInput>;

const RULES: [Rule; 3] = [labeled, first_line_topic, whole_text];

const TOPIC_LABEL: &str = "topic:";
const DRAFT_LABEL: &str = "draft:";

/// Split reviewer text into topic and draft
pub fn parse_review_input(text: &str) -> ReviewInput {
    let raw = text.trim();
    RULES
        .iter()
        .find_map(|rule| rule(raw))
        .unwrap_or_else(|| ReviewInput {
            topic: raw.to_string(),
            draft: raw.to_string(),
            form: ReviewInputForm::WholeText,
        })
}

fn labeled(raw: &str) -> Option<ReviewInput> {
    // ASCII lowering keeps byte offsets aligned with `raw`
    let lower = raw.to_ascii_lowercase();
    let topic_idx = lower.find(TOPIC_LABEL)?;
    let draft_idx = lower.find(DRAFT_LABEL)?;
    if topic_idx >= draft_idx {
        return None;
    }

    let topic_start = topic_idx + TOPIC_LABEL.len();
    if topic_start > draft_idx {
        return None;
    }

    let topic = raw[topic_start..draft_idx].trim();
    let draft = raw[draft_idx + DRAFT_LABEL.len()..].trim();
    if topic.is_empty() || draft.is_empty() {
        return None;
    }

    Some(ReviewInput {
        topic: topic.to_string(),
        draft: draft.to_string(),
        form: ReviewInputForm::Labeled,
    })
}

fn first_line_topic(raw: &str) -> Option<ReviewInput> {
    let mut lines = split_lines(raw).into_iter();
    let first = lines.next()?;
    let rest: Vec<&str> = lines.collect();
    if rest.is_empty() {
        return None;
    }

    let topic = first.trim();
    let draft = rest.join("\n");
    let draft = draft.trim();

    Some(ReviewInput {
        topic: non_empty_or(topic, raw),
        draft: non_empty_or(draft, raw),
        form: ReviewInputForm::FirstLineTopic,
    })
}

/// Split on every line boundary, including bare `\r` and the Unicode
/// separators; a trailing boundary does not add an empty line
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let is_break = matches!(
            c,
            '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}'
                | '\u{2028}' | '\u{2029}'
        );
        if !is_break {
            continue;
        }
        lines.push(&text[start..idx]);
        start = idx + c.len_utf8();
        if c == '\r' {
            if let Some(&(next_idx, '\n')) = chars.peek() {
                chars.next();
                start = next_idx + 1;
            }
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn whole_text(raw: &str) -> Option<ReviewInput> {
    Some(ReviewInput {
        topic: raw.to_string(),
        draft: raw.to_string(),
        form: ReviewInputForm::WholeText,
    })
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
