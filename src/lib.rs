//! A pure-Rust, thread-safe Last-Writer-Wins Element Set.
//!
//! [Conflict-free Replicated Data Types][crdt] (CRDTs) are data
//! structures which can be replicated across multiple networked nodes,
//! and whose properties allow for deterministic, local resolution of
//! the inconsistencies that concurrent mutation would otherwise cause.
//!
//! The set in this crate resolves conflicts with stamps: the latest
//! add and the latest remove of each member are kept, the newer of the
//! two decides membership, and a tie goes to the add. Replicas
//! exchange [`Op`]s and apply them in whatever order they arrive;
//! every order converges to the same set. The structure can also be
//! shared between threads directly, with writers synchronizing per
//! member rather than behind one set-wide lock.
//!
//! # Examples
//!
//! ```
//! use lwwset::LWWSet;
//!
//! let set = LWWSet::new();
//! assert!(set.add("tripod", 10).is_ok());
//! assert!(set.remove("tripod", 20).is_ok());
//! assert!(set.add("tripod", 25).is_ok());
//! assert_eq!(set.values(), vec!["tripod"]);
//! ```
//!
//! [crdt]: https://en.wikipedia.org/wiki/Conflict-free_replicated_data_type
#![crate_type = "lib"]
#![deny(missing_docs)]

mod error;
pub use crate::error::{Error, Result};

/// This module contains the striped stamp map the set is built from.
pub mod stamps;

/// This module contains the Last-Writer-Wins Element Set.
pub mod lwwset;

// Top-level re-exports for the set and its supporting types.
pub use crate::{
    lwwset::{LWWSet, Op},
    stamps::{Member, StampMap, Timestamp},
};
