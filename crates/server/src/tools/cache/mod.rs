//! Cache store inspection tools.

pub mod list;

pub use list::{CacheListParams, list_impl};
