//! HTML section parsing.
//!
//! Two layouts are recognized: LaTeXML renderings (the arXiv HTML format),
//! where each top-level section is a `section.ltx_section` element, and plain
//! article pages, where sections are delimited by sibling `<h2>` headings.

use std::sync::LazyLock;

use papertrail_shared::SectionMap;
use scraper::{ElementRef, Html, Selector};

static LTX_SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section.ltx_section").expect("valid selector"));
static H2: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").expect("valid selector"));
static ANY_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));
static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));

/// Parse an HTML document into its top-level sections, in document order.
///
/// Returns an empty map when no recognizable heading exists.
pub fn parse_sections(html: &str) -> SectionMap {
    let doc = Html::parse_document(html);

    let sections = parse_latexml(&doc);
    if !sections.is_empty() {
        return sections;
    }

    parse_h2_siblings(&doc)
}

// ---------------------------------------------------------------------------
// LaTeXML
// ---------------------------------------------------------------------------

fn parse_latexml(doc: &Html) -> SectionMap {
    let mut map = SectionMap::new();

    for section in doc.select(&LTX_SECTION) {
        let Some(heading_el) = section
            .select(&H2)
            .next()
            .or_else(|| section.select(&ANY_HEADING).next())
        else {
            continue;
        };

        let heading = element_text(heading_el);
        if heading.is_empty() {
            continue;
        }

        let paragraphs: Vec<String> = section
            .select(&PARAGRAPH)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect();

        let body = if paragraphs.is_empty() {
            // No <p> markup: fall back to the section text minus its heading.
            let full = element_text(section);
            full.strip_prefix(heading.as_str())
                .unwrap_or(&full)
                .trim()
                .to_string()
        } else {
            paragraphs.join("\n\n")
        };

        map.insert(heading, body);
    }

    map
}

// ---------------------------------------------------------------------------
// Generic <h2> layout
// ---------------------------------------------------------------------------

fn parse_h2_siblings(doc: &Html) -> SectionMap {
    let mut map = SectionMap::new();

    for h2 in doc.select(&H2) {
        let heading = element_text(h2);
        if heading.is_empty() {
            continue;
        }

        let mut parts = Vec::new();
        for node in h2.next_siblings() {
            if let Some(el) = ElementRef::wrap(node) {
                if el.value().name() == "h2" {
                    break;
                }
                let text = element_text(el);
                if !text.is_empty() {
                    parts.push(text);
                }
            } else if let Some(text) = node.value().as_text() {
                let text = collapse_whitespace(text);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }

        map.insert(heading, parts.join("\n\n"));
    }

    map
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Collapse runs of whitespace (including newlines) into single spaces.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
