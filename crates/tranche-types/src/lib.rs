//! Core type definitions for the Tranche Gate.
//!
//! This crate provides the shared value types. No business logic, just types.
//! Every Tranche Gate crate depends on this crate.

pub mod error;
pub mod hash;
pub mod identity;
pub mod kind;
pub mod period;
pub mod temporal;

mod bytes32;

// Re-export primary types at crate root for ergonomic use.
pub use error::TypeError;
pub use hash::SourceHash;
pub use identity::Identity;
pub use kind::AttestationKind;
pub use period::PeriodKey;
pub use temporal::{Amount, Timestamp};
