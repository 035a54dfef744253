//! Shared types, error model, and configuration for PaperTrail.
//!
//! This crate is the foundation depended on by all other PaperTrail crates.
//! It provides:
//! - [`PaperTrailError`]: the unified error type
//! - Domain types ([`PaperProfile`], [`SearchResult`], [`ReferenceRecord`], [`SectionMap`])
//! - Configuration ([`AppConfig`], runtime configs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AcquireConfig, AppConfig, CitationConfig, CitationSection, DefaultsConfig, FetchConfig,
    FetchSection, HostsSection, ResolverConfig, SearchConfig, SearchSection, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{PaperTrailError, Result};
pub use types::{
    PaperProfile, ReferenceRecord, SearchResult, Section, SectionMap, generate_pk,
};
