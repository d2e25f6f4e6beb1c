//! Signaling wire protocol for Switchboard.
//!
//! This crate defines the JSON frames exchanged between call clients and the
//! room controller: commands flowing in (`command`) and events flowing out
//! (`event`). It is transport-agnostic; framing and socket handling belong to
//! the service crate.

#![warn(clippy::pedantic)]

pub mod command;
pub mod event;
