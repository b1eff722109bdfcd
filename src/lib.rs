//! Shiori - manga content-source runners.
//!
//! This library provides:
//! - A content source interface and registry
//! - The Atsumaru source, including its dual-strategy search engine
//! - Title normalization shared by search and ranking

pub mod config;
pub mod console;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod sources;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use error::{ConfigError, SourceError};
pub use fetch::{HttpFetcher, TextFetcher};
pub use normalize::normalize;
pub use sources::{
    AtsumaruSource, Chapter, ChapterData, ChapterPage, Content, DirectoryRequest, Highlight,
    PageSection, PagedResult, Source, SourceRegistry,
};
