//! Core system components.
//!
//! Contains the reverse proxy that hosts the WAF engine.

pub mod proxy;
