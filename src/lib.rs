//! Slack file bot: guarded dispatch of uploaded files to type-specific processors.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod processors;
pub mod slack;
