//! Core of sw-cache: an offline cache-strategy engine.
//!
//! This crate provides:
//! - Named, versioned cache stores on a SQLite backend
//! - Request classification into network-first, cache-first and
//!   stale-while-revalidate strategies
//! - The service worker object driving install, activate, fetch and
//!   background sync
//! - Unified error types and layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod routes;
pub mod worker;

pub use cache::{CacheDb, CachedEntry, ParkedRequest};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Fetcher, Headers, Request, Response};
pub use routes::{Matcher, Route, RouteTable, Rule, Strategy};
pub use worker::{
    ActivationReport, FetchOutcome, InstallReport, LifecycleEvent, LifecycleState, ResponseSource, Revalidation,
    ServiceWorker, SyncReport,
};
