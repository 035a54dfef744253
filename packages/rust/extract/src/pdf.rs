//! PDF text extraction and introduction detection.

use std::sync::LazyLock;

use lopdf::Document;
use regex::Regex;

use papertrail_shared::{PaperTrailError, Result};

/// Longest introduction body we return, in characters.
const MAX_INTRODUCTION_CHARS: usize = 20_000;

/// Extract plain text from every page of a PDF.
///
/// CPU-bound: async callers should run this on a blocking thread.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| PaperTrailError::parse(format!("failed to load PDF: {e}")))?;

    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(PaperTrailError::parse("PDF has no pages"));
    }

    doc.extract_text(&pages)
        .map_err(|e| PaperTrailError::parse(format!("failed to extract PDF text: {e}")))
}

/// Locate the introduction in extracted PDF text.
///
/// The result starts with the heading line, followed by a blank line and the
/// body up to the next section heading.
pub fn find_introduction(text: &str) -> Option<String> {
    static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?mi)^[ \t]*((?:\d+\.?|[IVX]+\.)[ \t]*)?introduction[ \t]*:?[ \t]*$")
            .expect("valid regex")
    });

    let text = dehyphenate(text);
    let heading = HEADING_RE.find(&text)?;
    let heading_text = text[heading.start()..heading.end()].trim();

    let rest = &text[heading.end()..];
    let end = next_section_start(rest).unwrap_or(rest.len());

    let body = truncate_chars(rest[..end].trim(), MAX_INTRODUCTION_CHARS);
    if body.is_empty() {
        return None;
    }

    Some(format!("{heading_text}\n\n{body}"))
}

/// Byte offset of the first line in `rest` that opens the section after the introduction.
fn next_section_start(rest: &str) -> Option<usize> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if is_next_section_heading(line.trim()) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

fn is_next_section_heading(line: &str) -> bool {
    static NAMED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^(?:(?:\d+|[IVX]+)\.?[ \t]+)?(?:related work|background|methods?|preliminaries)$",
        )
        .expect("valid regex")
    });
    static NUMBERED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:2|II)\.?[ \t]+(.+)$").expect("valid regex"));

    if NAMED_RE.is_match(line) {
        return true;
    }
    NUMBERED_RE
        .captures(line)
        .is_some_and(|caps| looks_like_title(&caps[1]))
}

/// Words that may stay lower-case in a title-case heading.
const CONNECTIVES: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "of", "on", "or", "the", "to", "via",
    "with",
];

/// Longest section title we accept after the section number, in words.
const MAX_HEADING_WORDS: usize = 8;

/// Whether `title` reads like a section title rather than a wrapped body line
/// that happens to start with the next section's number.
///
/// The first word must be capitalized and there must be no sentence
/// punctuation. Titles of more than three words must be mostly title case,
/// and none may end on a connective.
fn looks_like_title(title: &str) -> bool {
    let words: Vec<&str> = title.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_HEADING_WORDS {
        return false;
    }
    if title.contains(['.', ';', '!', '?']) {
        return false;
    }

    if !capitalized(words[0]) || words.last().is_some_and(|w| is_connective(w)) {
        return false;
    }
    if words.len() <= 3 {
        return true;
    }

    let content: Vec<&str> = words.into_iter().filter(|w| !is_connective(w)).collect();
    let title_case = content.iter().filter(|w| capitalized(w)).count();
    title_case * 2 > content.len()
}

fn capitalized(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

fn is_connective(word: &str) -> bool {
    CONNECTIVES.contains(&word)
}

/// Re-join words split across lines (`repre-\nsentation`).
fn dehyphenate(text: &str) -> String {
    static HYPHEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\w)-[ \t]*\r?\n[ \t]*(\p{Ll})").expect("valid regex"));
    HYPHEN_RE.replace_all(text, "$1$2").into_owned()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end(),
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Build a one-page PDF with one text line per entry.
    pub(crate) fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let y = 750 - (i as i64) * 14;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            operations.push(Operation::new("Td", vec![50.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extracts_text_from_generated_pdf() {
        let bytes = pdf_with_lines(&["Attention Is All You Need", "1 Introduction", "Body."]);
        let text = extract_pdf_text(&bytes).expect("extract");
        assert!(text.contains("Attention Is All You Need"));
        assert!(text.contains("1 Introduction"));
    }

    #[test]
    fn garbage_bytes_are_parse_error() {
        let err = extract_pdf_text(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, PaperTrailError::Parse { .. }));
    }

    #[test]
    fn finds_numbered_introduction() {
        let text = "Title\nAbstract\nWe do things.\n1 Introduction\nDeep models are big.\nThey are slow.\n2 Related Work\nOthers did it.";
        let intro = find_introduction(text).unwrap();
        assert_eq!(
            intro,
            "1 Introduction\n\nDeep models are big.\nThey are slow."
        );
    }

    #[test]
    fn finds_roman_and_uppercase_headings() {
        let text = "I. INTRODUCTION\nGraphs are everywhere.\nII. METHOD\nWe propose.";
        let intro = find_introduction(text).unwrap();
        assert!(intro.starts_with("I. INTRODUCTION\n\n"));
        assert!(intro.ends_with("Graphs are everywhere."));
    }

    #[test]
    fn stops_at_named_section() {
        let text = "Introduction\nShort intro.\nBackground\nLong background.";
        assert_eq!(
            find_introduction(text).as_deref(),
            Some("Introduction\n\nShort intro.")
        );
    }

    #[test]
    fn ignores_introduction_inside_sentences() {
        let text = "This introduction is informal.\nNo headings here.";
        assert!(find_introduction(text).is_none());
    }

    #[test]
    fn rejoins_hyphenated_words() {
        let text = "1 Introduction\nWe learn repre-\nsentations of tables.\n2 Method\n";
        let intro = find_introduction(text).unwrap();
        assert!(intro.contains("representations of tables."));
    }

    #[test]
    fn caps_body_length() {
        let long = "word ".repeat(10_000);
        let text = format!("1 Introduction\n{long}");
        let intro = find_introduction(&text).unwrap();
        let body = intro.strip_prefix("1 Introduction\n\n").unwrap();
        assert!(body.chars().count() <= MAX_INTRODUCTION_CHARS);
    }

    #[test]
    fn wrapped_line_starting_with_two_does_not_end_introduction() {
        let text = "1 Introduction\nResearch output grows fast; roughly\n2 million papers appear every year and\nreviewers cannot keep up.\n2 Related Work\nOthers did it.";
        let intro = find_introduction(text).unwrap();
        assert!(intro.contains("2 million papers appear every year and"));
        assert!(intro.ends_with("reviewers cannot keep up."));
    }

    #[test]
    fn capitalized_sentence_after_two_is_body_text() {
        let text = "1 Introduction\nWe count\n2 Million papers appear every year\nin total.\nII. Background and Motivation\nEarlier work.";
        let intro = find_introduction(text).unwrap();
        assert!(intro.contains("2 Million papers appear every year"));
        assert!(intro.ends_with("in total."));
    }

    #[test]
    fn title_shapes() {
        assert!(looks_like_title("Related Work"));
        assert!(looks_like_title("RELATED WORK"));
        assert!(looks_like_title("Problem setup"));
        assert!(looks_like_title("Graph Neural Networks for Tabular Data"));
        assert!(!looks_like_title("million papers appear every year and"));
        assert!(!looks_like_title("Million papers appear every year"));
        assert!(!looks_like_title("Results show gains."));
        assert!(!looks_like_title("Tables and"));
    }

    #[test]
    fn heading_without_body_is_absent() {
        assert!(find_introduction("1 Introduction\n2 Method\nText").is_none());
    }
}
