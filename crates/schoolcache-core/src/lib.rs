//! Core library for schoolcache.
//!
//! A REST client for the school-management backend that keeps GET responses
//! in a durable key-value store and serves them when the backend cannot be
//! reached.
//!
//! - `api`: the cached request client and typed endpoints
//! - `cache`: cache entries, TTL and invalidation
//! - `store`: the durable key-value store
//! - `connectivity`: observable online/offline state
//! - `models`: student, score, attendance and event types

pub mod api;
pub mod cache;
pub mod chat;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod models;
pub mod prefetch;
pub mod store;
pub mod tasks;

pub use api::{ApiClient, ApiError, Method, RequestConfig};
pub use cache::{CacheEntry, CacheManager};
pub use config::Config;
pub use connectivity::{Connectivity, ConnectivityState};
pub use store::{FileStore, KvStore, MemoryStore, StoreError};
