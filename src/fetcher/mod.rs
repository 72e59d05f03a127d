//! Asset Fetcher
//!
//! Retrieves the assets of a site from the scanning service as a stream of
//! decoded records plus a stream of errors. The page source is a trait so the
//! walk logic can run against the REST client or any other paginated source.

mod http;
mod page;
mod stream;

pub use http::{HttpAssetSource, ScannerSettings};
pub use page::{AssetPage, AssetPageSource, PageInfo};
pub use stream::{
    collect_streams, AssetFetcher, AssetStreams, ScanAssetFetcher, DEFAULT_PAGE_SIZE,
};
