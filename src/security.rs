//! Security enforcement modules.

pub mod waf;
