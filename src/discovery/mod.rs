//! Discovery module: what parsers report and how its identity is computed
//!
//! # Components
//!
//! - `DiscoveryRecord`: immutable description of a resource found while parsing
//! - `DiscoveryListener`: the channel parsers report records through
//! - `canonicalize`: order-insensitive identity used for deduplication

mod canonical;
mod listener;
mod record;

pub use canonical::{body_is_significant, canonicalize, CanonicalKey};
pub use listener::{DiscoveryBatch, DiscoveryListener};
pub use record::{DiscoveryRecord, DiscoveryRecordBuilder, HeaderField, DEFAULT_METHOD};
