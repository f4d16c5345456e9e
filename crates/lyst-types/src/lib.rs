//! Foundation types for lyst.
//!
//! This crate provides the entry capability traits, structural change events,
//! and error taxonomy used throughout the lyst system. Every other lyst crate
//! depends on `lyst-types`.
//!
//! # Key Types
//!
//! - [`Entry`] -- Opaque list element: identity key, content equality, change payload
//! - [`EventSource`] -- Optional container capability for observable entries
//! - [`GroupObserver`] -- Receiver of structural change events
//! - [`SourceId`] -- Unique identifier of an event-emitting group
//! - [`GroupEvent`] -- Structural change event (insert/remove/move/change)
//! - [`GroupError`] -- Registration and bounds errors

pub mod entry;
pub mod error;
pub mod event;

pub use entry::{entries_equal, same_identity, Entry, EventSource, GroupObserver, SourceId};
pub use error::{GroupError, GroupResult};
pub use event::{GroupEvent, Payload};
