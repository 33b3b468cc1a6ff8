//! hostbridge core: the engine value model, its wire codec, query events and
//! data-filter plans.
//!
//! This crate is the contract between the native policy engine and a host
//! runtime. It carries no runtime dependencies so it can be reused by any host
//! binding or test harness.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every malformed
//! message surfaces as `BridgeError` so a bad engine payload aborts one query
//! instead of the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod value;

/// Shared result type.
pub use error::{BridgeError, ErrorKind, InvalidCallReason, Result};
pub use value::{
    Call, Dictionary, ExternalInstance, InstanceLiteral, Numeric, Operation, Operator, Partial,
    Pattern, Symbol, Term, Value,
};
