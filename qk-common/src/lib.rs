//! # quotekeeper Common Library
//!
//! Shared code for the quotekeeper crates including:
//! - Error type
//! - Configuration loading (CLI / env / TOML / defaults)
//! - Atomic document persistence
//! - Event types (HarvestEvent) and EventBus
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod persist;
pub mod time;

pub use error::{Error, Result};
