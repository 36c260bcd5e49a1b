//! Remote document sources

pub mod m3u;
pub mod traits;

pub use m3u::HttpM3uFetcher;
pub use traits::DocumentFetcher;
