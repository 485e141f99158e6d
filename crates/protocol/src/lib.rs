//! Wire types for the content capture service.
//!
//! This crate contains the serde-serializable types exchanged between the
//! capture coordinator and the remote capture service. These types are the
//! "protocol layer": the shapes of data as they cross the transport.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization and small accessors
//! * Transport-agnostic: framing is the transport's concern
//! * Stable: Changes only when the remote contract changes
//!
//! Session lifecycle and call coordination are built on top of these types in `capture-rs`.

pub mod flags;
pub mod messages;
pub mod removal;
pub mod types;

pub use flags::*;
pub use messages::*;
pub use removal::*;
pub use types::*;
