//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - Producers push serialized records into a named collection of the store
//! - The pump drains the whole collection atomically on every purge tick
//! - Every configured sink receives its own filtered view of the drained batch

mod blueprint;
mod error;
mod filter;
mod record;
mod sink;
mod store;

pub use blueprint::*;
pub use error::*;
pub use filter::*;
pub use record::*;
pub use sink::*;
pub use store::*;
