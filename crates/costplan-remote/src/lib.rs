//! costplan remote: access to the cluster planning service.
//!
//! [`ClusterApi`] is the raw capability ([`HttpClusterApi`] in production,
//! scripted mocks in tests). [`RemoteClient`] wraps it with the rate ceiling,
//! the retry policy and blueprint normalization.

pub mod api;
pub mod client;
pub mod convert;
pub mod dto;
pub mod error;
pub mod http;
pub mod limiter;
pub mod retry;

pub use api::ClusterApi;
pub use client::{FetchedGroup, RemoteClient, ACTIVE_STATUS};
pub use dto::{BlueprintDocument, GroupListing};
pub use error::RemoteError;
pub use http::HttpClusterApi;
pub use limiter::RateLimiter;
pub use retry::RetryPolicy;
