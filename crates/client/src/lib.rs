//! Network side of sw-cache.
//!
//! Provides the reqwest-backed [`HttpFetcher`] the worker uses for live
//! fetches, plus URL resolution against the controlled origin.

pub mod fetch;

pub use fetch::{FetchConfig, HttpFetcher, UrlError, resolve};
