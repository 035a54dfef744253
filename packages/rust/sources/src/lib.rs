//! External metadata sources: arXiv search and the Semantic Scholar citation graph.
//!
//! Both clients route every request through a shared [`Fetcher`](papertrail_fetch::Fetcher),
//! so timeouts and per-host rate limits apply uniformly.

pub mod arxiv;
pub mod semantic_scholar;

pub use arxiv::{SearchClient, identifier_from_entry_id, parse_feed};
pub use semantic_scholar::CitationClient;
