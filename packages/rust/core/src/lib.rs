//! Acquisition pipeline for PaperTrail.
//!
//! This crate ties the search client, citation client and source resolver to
//! the paper profile store: pulling search results into the store, and
//! acquiring batches of references with bounded concurrency and a
//! per-candidate report.

pub mod pipeline;
pub mod report;

pub use pipeline::{
    Acquirer, BatchProgress, SharedStore, SilentProgress, group_by_published_date, shared,
};
pub use report::{BatchReport, CandidateReport, CandidateStatus};
