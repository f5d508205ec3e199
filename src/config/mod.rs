//! Configuration management for Glimmr
//!
//! - **settings**: the persisted [`Configuration`] shape and its defaults
//! - **store**: [`ConfigStore`], the write-through owner used by the scheduler

pub mod settings;
pub mod store;

// Re-export commonly used types
pub use settings::{Configuration, PositionMode};
pub use store::ConfigStore;
