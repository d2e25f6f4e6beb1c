//! Common types shared across Switchboard components.

#![warn(clippy::pedantic)]

/// Module for common identifier types
pub mod types;
