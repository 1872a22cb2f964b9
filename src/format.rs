//! Critique formatting: score extraction and prose-to-markup rendering.
//!
//! DESIGN
//! ======
//! Model output is loose prose with a few recognizable markers: category
//! headers (`Originality:`), `N/10` score mentions, and stray markdown
//! emphasis. Instead of rewriting the raw string, the text is parsed into
//! typed [`Block`]s and rendered through pulldown-cmark's HTML writer.
//! Every span of model text becomes an escaped text event, so markup inside
//! the model output is displayed literally and never injected.
//!
//! Sentence splitting is heuristic and may break after abbreviations.

use std::sync::OnceLock;

use pulldown_cmark::{Event, HeadingLevel, Tag, TagEnd, html};
use regex::Regex;

use crate::net::types::{Critique, ScoreCategory, Scores};

/// Section titles rendered as headings when they open a line.
const SECTION_HEADERS: [&str; 5] = ["Originality", "Scalability", "Feasibility", "Brief Score", "Summary Criticism"];

const SECTION_HEADING_LEVEL: u8 = 3;

// =============================================================================
// BLOCKS
// =============================================================================

/// Inline span inside a paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
}

/// A rendered unit of the review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(Vec<Inline>),
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Full formatting pass: scores from the raw text plus rendered review markup.
#[must_use]
pub fn format_critique(raw: &str) -> Critique {
    Critique { review: format_review(raw), scores: extract_scores(raw) }
}

/// Render raw model text as review markup without touching scores.
#[must_use]
pub fn format_review(raw: &str) -> String {
    render_html(&parse_blocks(raw))
}

/// Lightweight rendering for partial stream content.
///
/// Paragraphs are split on blank lines only; a paragraph that already
/// carries `#` heading markup becomes a heading, everything else is
/// wrapped as a paragraph. Sentence splitting and score emphasis are left
/// for the final pass.
#[must_use]
pub fn format_stream_preview(accumulated: &str) -> String {
    let blocks = paragraphs(&accumulated.replace("\r\n", "\n"))
        .into_iter()
        .map(|lines| {
            let joined = lines.join(" ");
            match markdown_heading(&joined) {
                Some((level, text)) => Block::Heading { level, text: text.to_string() },
                None => Block::Paragraph(vec![Inline::Text(joined)]),
            }
        })
        .collect::<Vec<_>>();
    render_html(&blocks)
}

// =============================================================================
// SCORES
// =============================================================================

fn score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(originality|scalability|feasibility)\b[*_\s]*:?[*_\s]*(\d{1,3})\s*/\s*10\b")
            .expect("score pattern is a valid regex")
    })
}

fn score_mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{1,3}\s*/\s*10\b").expect("score mention pattern is a valid regex"))
}

/// Extract `category: N/10` scores scaled to 0–100.
///
/// The first mention of each category wins. Categories without a parseable
/// mention keep the default of 50.
#[must_use]
pub fn extract_scores(raw: &str) -> Scores {
    let mut scores = Scores::default();
    let mut seen = Vec::with_capacity(ScoreCategory::ALL.len());

    for caps in score_pattern().captures_iter(raw) {
        let Some(category) = caps.get(1).and_then(|m| ScoreCategory::from_label(m.as_str())) else {
            continue;
        };
        if seen.contains(&category) {
            continue;
        }
        let Some(value) = caps.get(2).and_then(|m| m.as_str().parse::<u16>().ok()) else {
            continue;
        };
        seen.push(category);
        scores.set(category, scale_score(value));
    }
    scores
}

fn scale_score(out_of_ten: u16) -> u8 {
    u8::try_from(out_of_ten.saturating_mul(10).min(100)).unwrap_or(100)
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse raw model text into headings and sentence-sized paragraphs.
///
/// Always returns at least one block.
#[must_use]
pub fn parse_blocks(raw: &str) -> Vec<Block> {
    let normalized = raw.replace("\r\n", "\n");
    let mut blocks = Vec::new();

    for lines in paragraphs(&normalized) {
        let mut prose = String::new();
        for line in lines {
            if let Some((level, title, rest)) = section_header(line) {
                push_prose(&mut prose, &mut blocks);
                blocks.push(Block::Heading { level, text: title.to_string() });
                prose.push_str(rest);
            } else {
                if !prose.is_empty() {
                    prose.push(' ');
                }
                prose.push_str(line);
            }
        }
        push_prose(&mut prose, &mut blocks);
    }

    if blocks.is_empty() {
        blocks.push(Block::Paragraph(Vec::new()));
    }
    blocks
}

/// Group trimmed non-blank lines into paragraphs separated by blank lines.
fn paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Recognize a header line. Returns `(level, title, trailing text)`.
fn section_header(line: &str) -> Option<(u8, &str, &str)> {
    if let Some((level, text)) = markdown_heading(line) {
        return Some((level, text, ""));
    }

    let body = strip_emphasis(strip_list_number(line));
    for label in SECTION_HEADERS {
        let Some(prefix) = body.get(..label.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(label) {
            continue;
        }
        let remainder = strip_emphasis(&body[label.len()..]);
        if remainder.is_empty() {
            return Some((SECTION_HEADING_LEVEL, prefix, ""));
        }
        if let Some(rest) = remainder.strip_prefix(':') {
            return Some((SECTION_HEADING_LEVEL, prefix, strip_emphasis(rest)));
        }
    }
    None
}

/// `## Title` → `(2, "Title")`.
fn markdown_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let text = strip_emphasis(&line[hashes..]);
    if text.is_empty() {
        return None;
    }
    Some((u8::try_from(hashes).unwrap_or(6), text))
}

fn strip_list_number(line: &str) -> &str {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match line[digits..].strip_prefix(['.', ')']) {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

fn strip_emphasis(text: &str) -> &str {
    text.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
}

/// Split accumulated prose into sentence paragraphs and append them.
fn push_prose(prose: &mut String, blocks: &mut Vec<Block>) {
    let text = std::mem::take(prose);
    for sentence in split_sentences(&text) {
        let spans = inline_spans(sentence);
        if !spans.is_empty() {
            blocks.push(Block::Paragraph(spans));
        }
    }
}

/// Break after `.`, `!` or `?` when whitespace and an uppercase letter follow.
fn split_sentences(text: &str) -> Vec<&str> {
    let chars = text.char_indices().collect::<Vec<_>>();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (idx, ch) = chars[i];
        if matches!(ch, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].1.is_uppercase() {
                out.push(text[start..idx + ch.len_utf8()].trim());
                start = chars[j].0;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    out.push(text[start..].trim());
    out.retain(|sentence| !sentence.is_empty());
    out
}

/// Drop markdown emphasis markers and lift `N/10` mentions into strong spans.
fn inline_spans(sentence: &str) -> Vec<Inline> {
    let cleaned = sentence.replace("**", "").replace("__", "");
    let cleaned = cleaned.trim();
    let mut spans = Vec::new();
    let mut cursor = 0;

    for mention in score_mention_pattern().find_iter(cleaned) {
        if mention.start() > cursor {
            spans.push(Inline::Text(cleaned[cursor..mention.start()].to_string()));
        }
        spans.push(Inline::Strong(mention.as_str().split_whitespace().collect()));
        cursor = mention.end();
    }
    if cursor < cleaned.len() {
        spans.push(Inline::Text(cleaned[cursor..].to_string()));
    }
    spans
}

// =============================================================================
// RENDERING
// =============================================================================

/// Render blocks to HTML. Text is always emitted as escaped text events.
#[must_use]
pub fn render_html(blocks: &[Block]) -> String {
    let mut events = Vec::new();
    for block in blocks {
        match block {
            Block::Heading { level, text } => {
                let level = heading_level(*level);
                events.push(Event::Start(Tag::Heading { level, id: None, classes: Vec::new(), attrs: Vec::new() }));
                events.push(Event::Text(text.clone().into()));
                events.push(Event::End(TagEnd::Heading(level)));
            }
            Block::Paragraph(spans) => {
                events.push(Event::Start(Tag::Paragraph));
                for span in spans {
                    match span {
                        Inline::Text(text) => events.push(Event::Text(text.clone().into())),
                        Inline::Strong(text) => {
                            events.push(Event::Start(Tag::Strong));
                            events.push(Event::Text(text.clone().into()));
                            events.push(Event::End(TagEnd::Strong));
                        }
                    }
                }
                events.push(Event::End(TagEnd::Paragraph));
            }
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}

fn heading_level(level: u8) -> HeadingLevel {
    match level {
        0 | 1 => HeadingLevel::H1,
        2 => HeadingLevel::H2,
        3 => HeadingLevel::H3,
        4 => HeadingLevel::H4,
        5 => HeadingLevel::H5,
        _ => HeadingLevel::H6,
    }
}

#[cfg(test)]
#[path = "format_test.rs"]
mod tests;
