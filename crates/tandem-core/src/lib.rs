//! # tandem-core
//!
//! Core types, traits, and abstractions for the tandem notification engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other tandem crates depend on: the event log model, notification
//! and timeline records, repository traits, and the mention/reference
//! parsers shared by processors.

pub mod content;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod realtime;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use content::{
    format_app_mention, format_member_mention, new_app_mentions, new_member_mentions,
    parse_mentions, parse_references, Mentions,
};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
