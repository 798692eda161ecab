//! Proxy service implementation.
//!
//! Handles request inspection, upstream peer selection and the responses
//! the proxy writes on its own.

pub mod response;
pub mod service;

pub use service::{RequestCtx, WafProxy};
