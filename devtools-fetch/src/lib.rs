//! Dependency fetching for built plugins.
//!
//! Names from `depend` and `softdepend` are looked up in a
//! [`PluginRepository`]; a unique match is downloaded into the plugins
//! directory as `<name>.phar`. Nothing here is fatal to a build.

pub mod fetcher;
pub mod http;
pub mod repository;

pub use fetcher::{DependencyFetcher, FetchReport};
pub use http::HttpRepository;
pub use repository::{parse_search_response, Candidate, PluginRepository};
