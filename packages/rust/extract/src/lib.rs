//! Content extraction for PaperTrail.
//!
//! - [`parse_sections`] splits an HTML rendering into a [`SectionMap`](papertrail_shared::SectionMap)
//! - [`extract_pdf_text`] / [`find_introduction`] read introductions out of PDFs
//! - [`SourceResolver`] classifies a paper reference and runs the extraction strategies

pub mod pdf;
pub mod resolver;
pub mod sections;

pub use pdf::{extract_pdf_text, find_introduction};
pub use resolver::{
    ExtractionStrategy, HtmlRenderStrategy, IntroductionOutcome, PaperReference, PdfTextStrategy,
    SourceResolver, StrategyAttempt,
};
pub use sections::parse_sections;
