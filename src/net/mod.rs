//! Outbound network layer.
//!
//! # Data Flow
//! ```text
//! ClientOptions (timeout, certificate policy, proxy)
//!     → client.rs (reqwest::Client)
//!     → proxy.rs (model or global proxy applied, or none)
//!     → auth transport / certificate download / model handles
//! ```
//!
//! # Design Decisions
//! - No connection reuse for the auth client; every token request opens a fresh connection
//! - Proxies are never picked up from the environment, only from config

pub mod client;
pub mod proxy;

pub use client::{build_client, ClientOptions};
