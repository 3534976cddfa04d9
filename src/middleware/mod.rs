//! HTTP middleware stack.
//!
//! # Layer order (outermost first)
//!
//! 1. `TraceLayer` (request tracing)
//! 2. CORS
//! 3. Security headers
//! 4. Rate limiting (governor), `/api` wide plus a stricter limiter on login
//!
//! Request bodies that carry user text go through [`ValidJson`], which
//! sanitizes strings before deserializing and validating them.

pub mod rate_limit;
pub mod sanitize;
pub mod security_headers;

pub use rate_limit::{api_rate_limiter, auth_rate_limiter, ProxyIpKeyExtractor, RateLimiterLayer};
pub use sanitize::{sanitize_text, sanitize_value, ValidJson};
pub use security_headers::security_headers_middleware;
