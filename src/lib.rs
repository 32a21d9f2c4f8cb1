//! netdiag - a network diagnostics engine
//!
//! Issues HTTP requests, resolves and caches DNS records, probes host
//! reachability via the platform ping utility, and scans TCP ports with
//! bounded concurrency. Every operation answers through the same
//! [`ActionResult`] envelope so a hosting dispatcher can treat all
//! capabilities uniformly.

pub mod config;
pub mod dispatcher;
pub mod dns;
pub mod error;
pub mod http;
pub mod ping;
pub mod result;
pub mod scanner;
pub mod services;

// Re-export commonly used types
pub use config::EngineConfig;
pub use dispatcher::NetworkEngine;
pub use dns::{DnsCache, DnsResolver};
pub use error::DiagError;
pub use http::{HttpExecutor, RequestOptions};
pub use ping::PingProber;
pub use result::ActionResult;
pub use scanner::PortScanner;

pub type Result<T> = std::result::Result<T, DiagError>;
