//! Observable ordered groups.
//!
//! An [`OrderedGroup`] is a mutable, ordered collection of heterogeneous
//! entries that notifies registered observers of every structural change with
//! fine-grained positional events. Bulk updates are diffed so observers see
//! the minimal edit script, and groups nest by relaying child events at an
//! offset.
//!
//! # Key Types
//!
//! - [`OrderedGroup`] -- The positional container and event source
//! - [`NotificationChannel`] -- Observer registry with reverse-order fan-out

pub mod channel;
pub mod group;

pub use channel::NotificationChannel;
pub use group::OrderedGroup;
