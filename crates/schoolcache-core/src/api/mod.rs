//! REST API client module for the school-management backend.
//!
//! This module provides the `ApiClient`, which sends requests to the
//! backend and keeps GET responses in the response cache. When a GET fails
//! and a valid cached body exists, the cached body is returned instead.
//!
//! Every call also updates the client's connectivity state.

pub mod client;
pub mod error;
pub mod request;

pub use client::ApiClient;
pub use error::ApiError;
pub use request::{Method, RequestConfig};
