//! Optional integrations.

pub mod webhook;
