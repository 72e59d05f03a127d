//! Domain Types
//!
//! Asset records as fetched from the scanning service, the canonical event
//! emitted for each valid asset, and the error taxonomy shared by the fetch,
//! validate and deliver stages.

pub mod asset;
pub mod error;

pub use asset::{
    is_zero_time, zero_time, Asset, AssetEvent, AssetHistoryEntry, HistoryEventType,
};
pub use error::{AssetError, ScanTimeError, TransportError};
