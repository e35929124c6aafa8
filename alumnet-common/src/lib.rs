//! # Alumnet Common Library
//!
//! Shared code for the homepage audience crates including:
//! - Audience value types shared by every widget on the page
//! - Page event types (PageEvent enum) and the EventBus
//! - Configuration loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{AudienceType, ResolutionSource};
