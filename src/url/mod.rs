//! URL helpers for host-based policies
//!
//! URI normalization is the parsers' job; the dispatch core only needs to
//! know which host a resource lives on and whether a host is in scope.

mod host;

pub use host::{extract_host, matches_host_pattern};
